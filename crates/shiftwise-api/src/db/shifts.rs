//! Shift persistence operations.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use shiftwise_core::{EmployeeId, ShiftId, Timestamp};
use shiftwise_state::ShiftStatus;

use super::unknown_value;
use crate::state::ShiftRecord;

pub async fn insert(pool: &PgPool, record: &ShiftRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO shifts (id, employee_id, date, start_time, end_time, location, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(record.id.0)
    .bind(record.employee_id.0)
    .bind(record.date)
    .bind(record.start_time)
    .bind(record.end_time)
    .bind(&record.location)
    .bind(record.status.as_str())
    .bind(*record.created_at.as_datetime())
    .bind(*record.updated_at.as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

/// Write a status change made from `from`. Returns `false` if the row is
/// missing or no longer has status `from`.
pub async fn update_status(
    pool: &PgPool,
    record: &ShiftRecord,
    from: ShiftStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE shifts SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
    )
    .bind(record.status.as_str())
    .bind(*record.updated_at.as_datetime())
    .bind(record.id.0)
    .bind(from.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get(pool: &PgPool, id: ShiftId) -> Result<Option<ShiftRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, ShiftRow>(
        "SELECT id, employee_id, date, start_time, end_time, location, status, created_at, updated_at
         FROM shifts WHERE id = $1",
    )
    .bind(id.0)
    .fetch_optional(pool)
    .await?;

    row.map(ShiftRow::into_record).transpose()
}

/// Exchange the employees of shifts `a` and `b`, but only if `a` still
/// belongs to `owner_a` and `b` to `owner_b`. Returns whether both rows
/// changed; a partial match changes one row and the caller must roll back.
pub async fn exchange(
    conn: &mut PgConnection,
    a: ShiftId,
    b: ShiftId,
    owner_a: EmployeeId,
    owner_b: EmployeeId,
    at: Timestamp,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE shifts
         SET employee_id = CASE WHEN id = $1 THEN $4 ELSE $3 END, updated_at = $5
         WHERE (id = $1 AND employee_id = $3) OR (id = $2 AND employee_id = $4)",
    )
    .bind(a.0)
    .bind(b.0)
    .bind(owner_a.0)
    .bind(owner_b.0)
    .bind(*at.as_datetime())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 2)
}

/// Load all shifts on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ShiftRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ShiftRow>(
        "SELECT id, employee_id, date, start_time, end_time, location, status, created_at, updated_at
         FROM shifts ORDER BY date, start_time",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ShiftRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct ShiftRow {
    id: Uuid,
    employee_id: Uuid,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    location: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShiftRow {
    fn into_record(self) -> Result<ShiftRecord, sqlx::Error> {
        let status = ShiftStatus::parse(&self.status)
            .ok_or_else(|| unknown_value("shifts.status", &self.status))?;
        Ok(ShiftRecord {
            id: ShiftId(self.id),
            employee_id: EmployeeId(self.employee_id),
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location,
            status,
            created_at: Timestamp::from_utc(self.created_at),
            updated_at: Timestamp::from_utc(self.updated_at),
        })
    }
}
