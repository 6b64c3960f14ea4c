//! # Leave API
//!
//! Employees request leave for a shift slot; an administrator decides each
//! request exactly once, with the same sealing rules as swap proposals.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use shiftwise_core::{EmployeeId, LeaveId, Timestamp};
use shiftwise_state::{DecisionState, LeaveRequest, ShiftPeriod};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::routes::DecisionRequest;
use crate::state::{AppState, NotificationKind};

// ── Request/Response DTOs ───────────────────────────────────────────

/// Request leave for one shift slot.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLeaveRequest {
    pub shift_date: NaiveDate,
    /// `"morning"`, `"afternoon"` or `"night"`.
    #[schema(value_type = String, example = "morning")]
    pub shift_period: ShiftPeriod,
    pub location: Option<String>,
    pub reason: String,
}

/// A leave request as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeaveView {
    #[schema(value_type = String, format = Uuid)]
    pub id: LeaveId,
    #[schema(value_type = String, format = Uuid)]
    pub employee_id: EmployeeId,
    pub shift_date: NaiveDate,
    #[schema(value_type = String, example = "morning")]
    pub shift_period: ShiftPeriod,
    pub location: Option<String>,
    pub reason: String,
    #[schema(value_type = String, example = "pending")]
    pub state: DecisionState,
    #[schema(value_type = Option<String>, format = Uuid)]
    pub decided_by: Option<EmployeeId>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub decided_at: Option<Timestamp>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
}

impl From<LeaveRequest> for LeaveView {
    fn from(leave: LeaveRequest) -> Self {
        Self {
            id: leave.id(),
            employee_id: leave.employee_id(),
            shift_date: leave.shift_date(),
            shift_period: leave.shift_period(),
            location: leave.location().map(str::to_string),
            reason: leave.reason().to_string(),
            state: leave.state(),
            decided_by: leave.ruling().decided_by(),
            decided_at: leave.ruling().decided_at(),
            created_at: leave.created_at(),
        }
    }
}

fn newest_first(mut leaves: Vec<LeaveRequest>) -> Vec<LeaveView> {
    leaves.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    leaves.into_iter().map(LeaveView::from).collect()
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the leaves router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/leaves", get(list_leaves).post(create_leave))
        .route("/v1/leaves/mine", get(my_leaves))
        .route("/v1/leaves/{id}/decision", post(decide_leave))
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /v1/leaves — Request leave.
#[utoipa::path(
    post,
    path = "/v1/leaves",
    request_body = CreateLeaveRequest,
    responses(
        (status = 201, description = "Request created", body = LeaveView),
        (status = 409, description = "Same slot already requested", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "leaves"
)]
pub(crate) async fn create_leave(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateLeaveRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LeaveView>), AppError> {
    let me = caller.require_employee()?;
    let req = extract_json(body)?;
    let leave = LeaveRequest::request(
        me,
        req.shift_date,
        req.shift_period,
        req.location.map(|l| l.trim().to_string()),
        req.reason.trim().to_string(),
    )?;

    if !state
        .leaves
        .insert_unless(leave.id(), leave.clone(), |other| other.same_slot(&leave))
    {
        return Err(duplicate_slot(&leave));
    }

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::leaves::insert(pool, &leave).await {
            state.leaves.remove(&leave.id());
            if e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                return Err(duplicate_slot(&leave));
            }
            tracing::error!(leave_id = %leave.id(), error = %e, "failed to persist leave request");
            return Err(AppError::Internal("database write failed".to_string()));
        }
    }

    tracing::info!(leave_id = %leave.id(), employee_id = %me, date = %leave.shift_date(), "leave requested");
    Ok((StatusCode::CREATED, Json(leave.into())))
}

fn duplicate_slot(leave: &LeaveRequest) -> AppError {
    AppError::Conflict(format!(
        "leave for the {} shift on {} was already requested",
        leave.shift_period(),
        leave.shift_date()
    ))
}

/// GET /v1/leaves — All leave requests, newest first.
#[utoipa::path(
    get,
    path = "/v1/leaves",
    responses(
        (status = 200, description = "All requests", body = Vec<LeaveView>),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
    ),
    tag = "leaves"
)]
pub(crate) async fn list_leaves(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<LeaveView>>, AppError> {
    require_role(&caller, Role::Admin)?;
    Ok(Json(newest_first(state.leaves.list())))
}

/// GET /v1/leaves/mine — The caller's leave requests, newest first.
#[utoipa::path(
    get,
    path = "/v1/leaves/mine",
    responses(
        (status = 200, description = "Caller's requests", body = Vec<LeaveView>),
    ),
    tag = "leaves"
)]
pub(crate) async fn my_leaves(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<LeaveView>>, AppError> {
    let me = caller.require_employee()?;
    Ok(Json(newest_first(
        state.leaves.filter(|l| l.employee_id() == me),
    )))
}

/// POST /v1/leaves/{id}/decision — Approve or reject a pending request.
#[utoipa::path(
    post,
    path = "/v1/leaves/{id}/decision",
    params(("id" = Uuid, Path, description = "Leave request ID")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Decision recorded", body = LeaveView),
        (status = 403, description = "Not an admin, or deciding own request", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already decided", body = crate::error::ErrorBody),
        (status = 503, description = "Record busy, retry", body = crate::error::ErrorBody),
    ),
    tag = "leaves"
)]
pub(crate) async fn decide_leave(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<Json<LeaveView>, AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_json(body)?;
    let id = LeaveId(id);
    let approver = caller.actor();

    let (before, decided) = state
        .leaves
        .try_update_within(&id, state.config.lock_timeout, |leave| {
            let before = leave.clone();
            leave.decide(req.decision, approver)?;
            Ok::<_, AppError>((before, leave.clone()))
        })
        .map_err(|_| AppError::Busy(format!("{id} is locked, retry")))?
        .ok_or_else(|| AppError::NotFound(format!("{id} not found")))??;

    if let Some(pool) = &state.db_pool {
        match crate::db::leaves::update_decision(pool, &decided).await {
            Ok(true) => {}
            Ok(false) => {
                state.leaves.restore(&id, &decided, before);
                return Err(adopt_stored_decision(&state, pool, id).await);
            }
            Err(e) => {
                state.leaves.restore(&id, &decided, before);
                tracing::error!(leave_id = %id, error = %e, "failed to persist leave decision");
                return Err(AppError::Internal("database write failed".to_string()));
            }
        }
    }

    tracing::info!(leave_id = %id, state = %decided.state(), %approver, "leave decided");
    state.notifier.emit(
        decided.employee_id(),
        NotificationKind::Leave,
        format!(
            "Your leave request for the {} shift on {} was {}",
            decided.shift_period(),
            decided.shift_date(),
            decided.state()
        ),
    );
    Ok(Json(decided.into()))
}

/// Another writer decided the row first: take its decision as ours.
async fn adopt_stored_decision(state: &AppState, pool: &PgPool, id: LeaveId) -> AppError {
    match crate::db::leaves::get(pool, id).await {
        Ok(Some(stored)) if stored.state().is_terminal() => {
            let current = stored.state();
            tracing::debug!(leave_id = %id, %current, "leave decided by another writer");
            state.leaves.insert(id, stored);
            AppError::AlreadyDecided {
                message: format!("{id} was already {current}"),
                current,
            }
        }
        Ok(Some(_)) => {
            tracing::error!(leave_id = %id, "pending leave row refused the decision");
            AppError::Internal("leave request out of sync".to_string())
        }
        Ok(None) => {
            state.leaves.remove(&id);
            AppError::NotFound(format!("{id} not found"))
        }
        Err(e) => {
            tracing::error!(leave_id = %id, error = %e, "failed to reload leave request");
            AppError::Internal("database read failed".to_string())
        }
    }
}
