//! Leave request persistence operations.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use shiftwise_core::{EmployeeId, LeaveId, Timestamp};
use shiftwise_state::{DecisionState, LeaveParts, LeaveRequest, ShiftPeriod};

use super::{corrupt, unknown_value};

/// Insert a new request. Fails with a unique violation on a duplicate slot.
pub async fn insert(pool: &PgPool, leave: &LeaveRequest) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO leave_requests (id, employee_id, shift_date, shift_period, location,
             reason, status, decided_by, decided_at, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(leave.id().0)
    .bind(leave.employee_id().0)
    .bind(leave.shift_date())
    .bind(leave.shift_period().as_str())
    .bind(leave.location())
    .bind(leave.reason())
    .bind(leave.state().as_str())
    .bind(leave.ruling().decided_by().map(|e| e.0))
    .bind(leave.ruling().decided_at().map(|t| *t.as_datetime()))
    .bind(*leave.created_at().as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist a decision. Only a pending row is updated, so a second writer
/// cannot overwrite the first decision.
pub async fn update_decision(pool: &PgPool, leave: &LeaveRequest) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE leave_requests SET status = $1, decided_by = $2, decided_at = $3
         WHERE id = $4 AND status = 'pending'",
    )
    .bind(leave.state().as_str())
    .bind(leave.ruling().decided_by().map(|e| e.0))
    .bind(leave.ruling().decided_at().map(|t| *t.as_datetime()))
    .bind(leave.id().0)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load one leave request.
pub async fn get(pool: &PgPool, id: LeaveId) -> Result<Option<LeaveRequest>, sqlx::Error> {
    sqlx::query_as::<_, LeaveRow>(
        "SELECT id, employee_id, shift_date, shift_period, location, reason,
                status, decided_by, decided_at, created_at
         FROM leave_requests WHERE id = $1",
    )
    .bind(id.0)
    .fetch_optional(pool)
    .await?
    .map(LeaveRow::into_record)
    .transpose()
}

/// Load all leave requests on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<LeaveRequest>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LeaveRow>(
        "SELECT id, employee_id, shift_date, shift_period, location, reason,
                status, decided_by, decided_at, created_at
         FROM leave_requests ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(LeaveRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct LeaveRow {
    id: Uuid,
    employee_id: Uuid,
    shift_date: NaiveDate,
    shift_period: String,
    location: Option<String>,
    reason: String,
    status: String,
    decided_by: Option<Uuid>,
    decided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl LeaveRow {
    fn into_record(self) -> Result<LeaveRequest, sqlx::Error> {
        let shift_period = ShiftPeriod::parse(&self.shift_period)
            .ok_or_else(|| unknown_value("leave_requests.shift_period", &self.shift_period))?;
        let state = DecisionState::parse(&self.status)
            .ok_or_else(|| unknown_value("leave_requests.status", &self.status))?;
        LeaveRequest::from_parts(LeaveParts {
            id: LeaveId(self.id),
            employee_id: EmployeeId(self.employee_id),
            shift_date: self.shift_date,
            shift_period,
            location: self.location,
            reason: self.reason,
            state,
            decided_by: self.decided_by.map(EmployeeId),
            decided_at: self.decided_at.map(Timestamp::from_utc),
            created_at: Timestamp::from_utc(self.created_at),
        })
        .map_err(corrupt)
    }
}
