//! # Shift API
//!
//! Scheduling. Administrators create shifts and finalize their status; the
//! assigned employee acknowledges a pending shift.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use shiftwise_core::{EmployeeId, ShiftId, Timestamp, ValidationError};
use shiftwise_state::ShiftStatus;

use crate::auth::{require_access, require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::state::{AppState, ShiftRecord};

const MAX_LOCATION_LEN: usize = 100;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Schedule a shift for an employee.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateShiftRequest {
    #[schema(value_type = String, format = Uuid)]
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    /// Earlier than `start_time` for an overnight shift.
    #[schema(value_type = String, example = "17:00:00")]
    pub end_time: NaiveTime,
    pub location: String,
}

impl Validate for CreateShiftRequest {
    fn validate(&self) -> Result<(), String> {
        if self.end_time == self.start_time {
            return Err("end_time must differ from start_time".to_string());
        }
        ValidationError::check_text("location", &self.location, MAX_LOCATION_LEN)
            .map_err(|e| e.to_string())
    }
}

/// Finalize a shift.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetShiftStatusRequest {
    /// `"confirmed"` or `"cancelled"`.
    #[schema(value_type = String, example = "confirmed")]
    pub status: ShiftStatus,
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the shifts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/shifts", get(list_shifts).post(create_shift))
        .route("/v1/shifts/mine", get(my_shifts))
        .route("/v1/shifts/{id}", get(get_shift))
        .route("/v1/shifts/{id}/confirm", post(confirm_shift))
        .route("/v1/shifts/{id}/status", put(set_shift_status))
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /v1/shifts — Schedule a shift.
#[utoipa::path(
    post,
    path = "/v1/shifts",
    request_body = CreateShiftRequest,
    responses(
        (status = 201, description = "Shift created", body = ShiftRecord),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
        (status = 422, description = "Unknown employee or invalid times", body = crate::error::ErrorBody),
    ),
    tag = "shifts"
)]
pub(crate) async fn create_shift(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateShiftRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ShiftRecord>), AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_validated_json(body)?;
    if !state.employees.contains(&req.employee_id) {
        return Err(AppError::Validation(format!(
            "employee {} does not exist",
            req.employee_id
        )));
    }

    let now = Timestamp::now();
    let record = ShiftRecord {
        id: ShiftId::new(),
        employee_id: req.employee_id,
        date: req.date,
        start_time: req.start_time,
        end_time: req.end_time,
        location: req.location.trim().to_string(),
        status: ShiftStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    let created = state.schedule.create(record).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /v1/shifts — All shifts, by date.
#[utoipa::path(
    get,
    path = "/v1/shifts",
    responses(
        (status = 200, description = "All shifts", body = Vec<ShiftRecord>),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
    ),
    tag = "shifts"
)]
pub(crate) async fn list_shifts(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<ShiftRecord>>, AppError> {
    require_role(&caller, Role::Admin)?;
    Ok(Json(state.schedule.list()))
}

/// GET /v1/shifts/mine — The caller's shifts, by date.
#[utoipa::path(
    get,
    path = "/v1/shifts/mine",
    responses(
        (status = 200, description = "Caller's shifts", body = Vec<ShiftRecord>),
    ),
    tag = "shifts"
)]
pub(crate) async fn my_shifts(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<ShiftRecord>>, AppError> {
    let me = caller.require_employee()?;
    Ok(Json(state.schedule.for_employee(me)))
}

/// GET /v1/shifts/{id} — One shift; admins or its employee.
#[utoipa::path(
    get,
    path = "/v1/shifts/{id}",
    params(("id" = Uuid, Path, description = "Shift ID")),
    responses(
        (status = 200, description = "Shift found", body = ShiftRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "shifts"
)]
pub(crate) async fn get_shift(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<ShiftRecord>, AppError> {
    let id = ShiftId(id);
    let shift = state
        .schedule
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("{id} not found")))?;
    require_access(&caller, shift.employee_id, "this shift")?;
    Ok(Json(shift))
}

/// POST /v1/shifts/{id}/confirm — The assigned employee acknowledges a pending shift.
#[utoipa::path(
    post,
    path = "/v1/shifts/{id}/confirm",
    params(("id" = Uuid, Path, description = "Shift ID")),
    responses(
        (status = 200, description = "Acknowledged", body = ShiftRecord),
        (status = 403, description = "Not the assigned employee", body = crate::error::ErrorBody),
        (status = 409, description = "Shift is not pending", body = crate::error::ErrorBody),
    ),
    tag = "shifts"
)]
pub(crate) async fn confirm_shift(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<ShiftRecord>, AppError> {
    let me = caller.require_employee()?;
    let shift = state.schedule.confirm_by_employee(ShiftId(id), me).await?;
    Ok(Json(shift))
}

/// PUT /v1/shifts/{id}/status — Confirm or cancel a shift.
#[utoipa::path(
    put,
    path = "/v1/shifts/{id}/status",
    params(("id" = Uuid, Path, description = "Shift ID")),
    request_body = SetShiftStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ShiftRecord),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
        (status = 409, description = "Shift already final, or target not allowed", body = crate::error::ErrorBody),
    ),
    tag = "shifts"
)]
pub(crate) async fn set_shift_status(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<SetShiftStatusRequest>, JsonRejection>,
) -> Result<Json<ShiftRecord>, AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_json(body)?;
    let shift = state.schedule.set_status(ShiftId(id), req.status).await?;
    Ok(Json(shift))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(start: (u32, u32), end: (u32, u32), location: &str) -> CreateShiftRequest {
        CreateShiftRequest {
            employee_id: EmployeeId::new(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            location: location.to_string(),
        }
    }

    #[test]
    fn overnight_shift_is_valid() {
        assert!(request((22, 0), (6, 0), "Ward B").validate().is_ok());
    }

    #[test]
    fn zero_length_shift_is_rejected() {
        let err = request((9, 0), (9, 0), "Ward B").validate().unwrap_err();
        assert!(err.contains("end_time"), "got: {err}");
    }

    #[test]
    fn blank_location_is_rejected() {
        assert!(request((9, 0), (17, 0), "   ").validate().is_err());
    }

    #[test]
    fn status_request_parses_snake_case() {
        let req: SetShiftStatusRequest =
            serde_json::from_str(r#"{"status":"cancelled"}"#).unwrap();
        assert_eq!(req.status, ShiftStatus::Cancelled);
    }

    #[test]
    fn router_builds() {
        let _router = router();
    }
}
