//! Cover-up persistence. Postgres is authoritative for this table.
//!
//! `claim` and `cancel` take a connection inside the ledger's transaction so
//! that `SET LOCAL lock_timeout` bounds their row-lock wait.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use shiftwise_core::{CoverUpId, EmployeeId, ShiftId, Timestamp};
use shiftwise_state::{CoverUp, CoverUpParts, CoverUpState};

use super::{corrupt, unknown_value, Conditional};

const COLUMNS: &str = "id, shift_id, posted_by, status, claimed_by, created_at, updated_at";

pub async fn insert(pool: &PgPool, unit: &CoverUp) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO cover_ups (id, shift_id, posted_by, status, claimed_by, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(unit.id().0)
    .bind(unit.shift_id().0)
    .bind(unit.posted_by().0)
    .bind(unit.state().as_str())
    .bind(unit.claimed_by().map(|e| e.0))
    .bind(*unit.created_at().as_datetime())
    .bind(*unit.updated_at().as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get(pool: &PgPool, id: CoverUpId) -> Result<Option<CoverUp>, sqlx::Error> {
    let row = sqlx::query_as::<_, CoverUpRow>(&format!(
        "SELECT {COLUMNS} FROM cover_ups WHERE id = $1"
    ))
    .bind(id.0)
    .fetch_optional(pool)
    .await?;

    row.map(CoverUpRow::into_record).transpose()
}

/// Open postings, oldest first.
pub async fn list_open(pool: &PgPool) -> Result<Vec<CoverUp>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CoverUpRow>(&format!(
        "SELECT {COLUMNS} FROM cover_ups WHERE status = 'open' ORDER BY created_at, id"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(CoverUpRow::into_record).collect()
}

/// All postings, newest first.
pub async fn list_all(pool: &PgPool) -> Result<Vec<CoverUp>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CoverUpRow>(&format!(
        "SELECT {COLUMNS} FROM cover_ups ORDER BY created_at DESC, id"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(CoverUpRow::into_record).collect()
}

/// `open → claimed`, only if the row is still open.
pub async fn claim(
    conn: &mut PgConnection,
    id: CoverUpId,
    claimant: EmployeeId,
) -> Result<Conditional<CoverUp, CoverUpState>, sqlx::Error> {
    let row = sqlx::query_as::<_, CoverUpRow>(&format!(
        "UPDATE cover_ups SET status = 'claimed', claimed_by = $2, updated_at = $3
         WHERE id = $1 AND status = 'open'
         RETURNING {COLUMNS}"
    ))
    .bind(id.0)
    .bind(claimant.0)
    .bind(*Timestamp::now().as_datetime())
    .fetch_optional(&mut *conn)
    .await?;

    settle(conn, id, row).await
}

/// `open → cancelled`, only if the row is still open.
pub async fn cancel(
    conn: &mut PgConnection,
    id: CoverUpId,
) -> Result<Conditional<CoverUp, CoverUpState>, sqlx::Error> {
    let row = sqlx::query_as::<_, CoverUpRow>(&format!(
        "UPDATE cover_ups SET status = 'cancelled', updated_at = $2
         WHERE id = $1 AND status = 'open'
         RETURNING {COLUMNS}"
    ))
    .bind(id.0)
    .bind(*Timestamp::now().as_datetime())
    .fetch_optional(&mut *conn)
    .await?;

    settle(conn, id, row).await
}

async fn settle(
    conn: &mut PgConnection,
    id: CoverUpId,
    updated: Option<CoverUpRow>,
) -> Result<Conditional<CoverUp, CoverUpState>, sqlx::Error> {
    if let Some(row) = updated {
        return Ok(Conditional::Applied(row.into_record()?));
    }
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM cover_ups WHERE id = $1")
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?;
    match status {
        None => Ok(Conditional::Missing),
        Some(s) => CoverUpState::parse(&s)
            .map(Conditional::Refused)
            .ok_or_else(|| unknown_value("cover_ups.status", &s)),
    }
}

#[derive(sqlx::FromRow)]
struct CoverUpRow {
    id: Uuid,
    shift_id: Uuid,
    posted_by: Uuid,
    status: String,
    claimed_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CoverUpRow {
    fn into_record(self) -> Result<CoverUp, sqlx::Error> {
        let state = CoverUpState::parse(&self.status)
            .ok_or_else(|| unknown_value("cover_ups.status", &self.status))?;
        CoverUp::from_parts(CoverUpParts {
            id: CoverUpId(self.id),
            shift_id: ShiftId(self.shift_id),
            posted_by: EmployeeId(self.posted_by),
            state,
            claimed_by: self.claimed_by.map(EmployeeId),
            created_at: Timestamp::from_utc(self.created_at),
            updated_at: Timestamp::from_utc(self.updated_at),
        })
        .map_err(corrupt)
    }
}
