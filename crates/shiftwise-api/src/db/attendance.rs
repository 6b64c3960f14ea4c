//! Attendance persistence operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use shiftwise_core::{AttendanceId, EmployeeId, ShiftId, Timestamp};

use crate::state::AttendanceRecord;

pub async fn insert(pool: &PgPool, record: &AttendanceRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO attendance (id, shift_id, employee_id, clock_in_at, clock_out_at,
             clock_in_location, clock_out_location, worked_minutes, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(record.id.0)
    .bind(record.shift_id.0)
    .bind(record.employee_id.0)
    .bind(*record.clock_in_at.as_datetime())
    .bind(record.clock_out_at.map(|t| *t.as_datetime()))
    .bind(record.clock_in_location.as_deref())
    .bind(record.clock_out_location.as_deref())
    .bind(record.worked_minutes)
    .bind(*record.created_at.as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

/// Record the clock-out. Only an open record is updated.
pub async fn update_clock_out(pool: &PgPool, record: &AttendanceRecord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attendance SET clock_out_at = $1, clock_out_location = $2, worked_minutes = $3
         WHERE id = $4 AND clock_out_at IS NULL",
    )
    .bind(record.clock_out_at.map(|t| *t.as_datetime()))
    .bind(record.clock_out_location.as_deref())
    .bind(record.worked_minutes)
    .bind(record.id.0)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get(pool: &PgPool, id: AttendanceId) -> Result<Option<AttendanceRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, AttendanceRow>(
        "SELECT id, shift_id, employee_id, clock_in_at, clock_out_at,
                clock_in_location, clock_out_location, worked_minutes, created_at
         FROM attendance WHERE id = $1",
    )
    .bind(id.0)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(AttendanceRow::into_record))
}

/// Load all attendance records on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AttendanceRow>(
        "SELECT id, shift_id, employee_id, clock_in_at, clock_out_at,
                clock_in_location, clock_out_location, worked_minutes, created_at
         FROM attendance ORDER BY clock_in_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AttendanceRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct AttendanceRow {
    id: Uuid,
    shift_id: Uuid,
    employee_id: Uuid,
    clock_in_at: DateTime<Utc>,
    clock_out_at: Option<DateTime<Utc>>,
    clock_in_location: Option<String>,
    clock_out_location: Option<String>,
    worked_minutes: Option<i64>,
    created_at: DateTime<Utc>,
}

impl AttendanceRow {
    fn into_record(self) -> AttendanceRecord {
        AttendanceRecord {
            id: AttendanceId(self.id),
            shift_id: ShiftId(self.shift_id),
            employee_id: EmployeeId(self.employee_id),
            clock_in_at: Timestamp::from_utc(self.clock_in_at),
            clock_out_at: self.clock_out_at.map(Timestamp::from_utc),
            clock_in_location: self.clock_in_location,
            clock_out_location: self.clock_out_location,
            worked_minutes: self.worked_minutes,
            created_at: Timestamp::from_utc(self.created_at),
        }
    }
}
