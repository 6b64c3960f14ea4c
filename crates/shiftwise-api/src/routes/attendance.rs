//! # Attendance API
//!
//! Clock-in against an assigned shift and the matching clock-out. An
//! employee holds at most one open record per shift; closing it fixes the
//! whole minutes worked, which payroll later sums.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use shiftwise_core::{AttendanceId, ShiftId, Timestamp};
use shiftwise_state::ShiftStatus;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{check_optional_text, extract_validated_json, Validate};
use crate::state::{AppState, AttendanceRecord};

const MAX_LOCATION_LEN: usize = 255;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Start work on a shift.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ClockInRequest {
    #[schema(value_type = String, format = Uuid)]
    pub shift_id: ShiftId,
    /// Defaults to the current time.
    #[schema(value_type = Option<String>, format = DateTime)]
    pub at: Option<Timestamp>,
    pub location: Option<String>,
}

impl Validate for ClockInRequest {
    fn validate(&self) -> Result<(), String> {
        check_optional_text("location", self.location.as_deref(), MAX_LOCATION_LEN)
    }
}

/// Finish work on an open attendance record.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ClockOutRequest {
    /// Defaults to the current time.
    #[schema(value_type = Option<String>, format = DateTime)]
    pub at: Option<Timestamp>,
    pub location: Option<String>,
}

impl Validate for ClockOutRequest {
    fn validate(&self) -> Result<(), String> {
        check_optional_text("location", self.location.as_deref(), MAX_LOCATION_LEN)
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the attendance router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/attendance", get(list_attendance))
        .route("/v1/attendance/mine", get(my_attendance))
        .route("/v1/attendance/active", get(active_attendance))
        .route("/v1/attendance/clock-in", post(clock_in))
        .route("/v1/attendance/{id}/clock-out", post(clock_out))
}

fn newest_first(mut records: Vec<AttendanceRecord>) -> Vec<AttendanceRecord> {
    records.sort_by(|a, b| b.clock_in_at.cmp(&a.clock_in_at));
    records
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /v1/attendance/clock-in — Clock in to one of the caller's shifts.
#[utoipa::path(
    post,
    path = "/v1/attendance/clock-in",
    request_body = ClockInRequest,
    responses(
        (status = 201, description = "Clocked in", body = AttendanceRecord),
        (status = 403, description = "Shift assigned to someone else", body = crate::error::ErrorBody),
        (status = 404, description = "Shift not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already clocked in, or shift cancelled", body = crate::error::ErrorBody),
    ),
    tag = "attendance"
)]
pub(crate) async fn clock_in(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ClockInRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AttendanceRecord>), AppError> {
    let me = caller.require_employee()?;
    let req = extract_validated_json(body)?;

    let shift = state
        .schedule
        .get(req.shift_id)
        .ok_or_else(|| AppError::NotFound(format!("{} not found", req.shift_id)))?;
    if shift.employee_id != me {
        return Err(AppError::Forbidden(format!(
            "{} is not assigned to the caller",
            shift.id
        )));
    }
    if shift.status == ShiftStatus::Cancelled {
        return Err(AppError::Conflict(format!("{} is cancelled", shift.id)));
    }

    let now = Timestamp::now();
    let record = AttendanceRecord {
        id: AttendanceId::new(),
        shift_id: shift.id,
        employee_id: me,
        clock_in_at: req.at.unwrap_or(now),
        clock_out_at: None,
        clock_in_location: req.location.map(|l| l.trim().to_string()),
        clock_out_location: None,
        worked_minutes: None,
        created_at: now,
    };

    let inserted = state.attendance.insert_unless(record.id, record.clone(), |r| {
        r.is_open() && r.shift_id == shift.id && r.employee_id == me
    });
    if !inserted {
        return Err(AppError::Conflict(format!(
            "already clocked in to {}",
            shift.id
        )));
    }

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::attendance::insert(pool, &record).await {
            state.attendance.remove(&record.id);
            if e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                return Err(AppError::Conflict(format!(
                    "already clocked in to {}",
                    shift.id
                )));
            }
            tracing::error!(attendance_id = %record.id, error = %e, "failed to persist clock-in");
            return Err(AppError::Internal("database write failed".to_string()));
        }
    }

    tracing::info!(attendance_id = %record.id, shift_id = %shift.id, employee_id = %me, "clocked in");
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /v1/attendance/{id}/clock-out — Close an open attendance record.
#[utoipa::path(
    post,
    path = "/v1/attendance/{id}/clock-out",
    params(("id" = Uuid, Path, description = "Attendance record ID")),
    request_body = ClockOutRequest,
    responses(
        (status = 200, description = "Clocked out", body = AttendanceRecord),
        (status = 403, description = "Another employee's record", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already clocked out", body = crate::error::ErrorBody),
        (status = 422, description = "Clock-out not after clock-in", body = crate::error::ErrorBody),
    ),
    tag = "attendance"
)]
pub(crate) async fn clock_out(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ClockOutRequest>, JsonRejection>,
) -> Result<Json<AttendanceRecord>, AppError> {
    let me = caller.require_employee()?;
    let req = extract_validated_json(body)?;
    let id = AttendanceId(id);
    let at = req.at.unwrap_or_else(Timestamp::now);
    let location = req.location.map(|l| l.trim().to_string());

    let (before, closed) = state
        .attendance
        .try_update_within(&id, state.config.lock_timeout, |record| {
            let before = record.clone();
            if record.employee_id != me {
                return Err(AppError::Forbidden(format!(
                    "{id} belongs to another employee"
                )));
            }
            if !record.is_open() {
                return Err(AppError::Conflict(format!("{id} is already clocked out")));
            }
            let minutes = at.minutes_since(&record.clock_in_at).ok_or_else(|| {
                AppError::Validation("clock-out must be after clock-in".to_string())
            })?;
            record.clock_out_at = Some(at);
            record.clock_out_location = location;
            record.worked_minutes = Some(minutes);
            Ok((before, record.clone()))
        })
        .map_err(|_| AppError::Busy(format!("{id} is locked, retry")))?
        .ok_or_else(|| AppError::NotFound(format!("{id} not found")))??;

    if let Some(pool) = &state.db_pool {
        match crate::db::attendance::update_clock_out(pool, &closed).await {
            Ok(true) => {}
            Ok(false) => {
                state.attendance.restore(&id, &closed, before);
                return Err(adopt_stored_clock_out(&state, pool, id).await);
            }
            Err(e) => {
                state.attendance.restore(&id, &closed, before);
                tracing::error!(attendance_id = %id, error = %e, "failed to persist clock-out");
                return Err(AppError::Internal("database write failed".to_string()));
            }
        }
    }

    tracing::info!(
        attendance_id = %id,
        worked_minutes = closed.worked_minutes.unwrap_or_default(),
        "clocked out"
    );
    Ok(Json(closed))
}

/// Another writer closed the row first: take the stored record.
async fn adopt_stored_clock_out(state: &AppState, pool: &PgPool, id: AttendanceId) -> AppError {
    match crate::db::attendance::get(pool, id).await {
        Ok(Some(stored)) if !stored.is_open() => {
            tracing::debug!(attendance_id = %id, "clock-out recorded by another writer");
            state.attendance.insert(id, stored);
            AppError::Conflict(format!("{id} is already clocked out"))
        }
        Ok(Some(_)) => {
            tracing::error!(attendance_id = %id, "open attendance row refused the clock-out");
            AppError::Internal("attendance record out of sync".to_string())
        }
        Ok(None) => {
            state.attendance.remove(&id);
            AppError::NotFound(format!("{id} not found"))
        }
        Err(e) => {
            tracing::error!(attendance_id = %id, error = %e, "failed to reload attendance record");
            AppError::Internal("database read failed".to_string())
        }
    }
}

/// GET /v1/attendance — All attendance records, newest first.
#[utoipa::path(
    get,
    path = "/v1/attendance",
    responses(
        (status = 200, description = "All records", body = Vec<AttendanceRecord>),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
    ),
    tag = "attendance"
)]
pub(crate) async fn list_attendance(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    require_role(&caller, Role::Admin)?;
    Ok(Json(newest_first(state.attendance.list())))
}

/// GET /v1/attendance/mine — The caller's attendance, newest first.
#[utoipa::path(
    get,
    path = "/v1/attendance/mine",
    responses(
        (status = 200, description = "Caller's records", body = Vec<AttendanceRecord>),
    ),
    tag = "attendance"
)]
pub(crate) async fn my_attendance(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    let me = caller.require_employee()?;
    Ok(Json(newest_first(
        state.attendance.filter(|r| r.employee_id == me),
    )))
}

/// GET /v1/attendance/active — The caller's open record, if any.
#[utoipa::path(
    get,
    path = "/v1/attendance/active",
    responses(
        (status = 200, description = "Most recent open record", body = AttendanceRecord),
        (status = 404, description = "Not clocked in", body = crate::error::ErrorBody),
    ),
    tag = "attendance"
)]
pub(crate) async fn active_attendance(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<AttendanceRecord>, AppError> {
    let me = caller.require_employee()?;
    state
        .attendance
        .filter(|r| r.employee_id == me && r.is_open())
        .into_iter()
        .max_by_key(|r| r.clock_in_at)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no open attendance record".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_in_time_is_optional() {
        let req: ClockInRequest =
            serde_json::from_value(serde_json::json!({ "shift_id": Uuid::new_v4() })).unwrap();
        assert!(req.at.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn blank_location_is_rejected() {
        let req = ClockOutRequest {
            at: None,
            location: Some("  ".to_string()),
        };
        assert!(req.validate().is_err());
        assert!(ClockOutRequest::default().validate().is_ok());
    }

    #[test]
    fn router_builds() {
        let _router = router();
    }
}
