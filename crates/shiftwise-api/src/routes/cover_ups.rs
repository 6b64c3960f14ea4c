//! # Cover-Up API
//!
//! The claim ledger over HTTP. Any employee may list and claim open
//! cover-ups; posting and cancelling are administrative.
//!
//! A losing claimant receives 409 `NOT_CLAIMABLE` with the state it
//! observed in `details.current`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use shiftwise_core::{CoverUpId, EmployeeId, ShiftId, Timestamp};
use shiftwise_state::{CoverUp, CoverUpState};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Post a shift for cover.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenCoverUpRequest {
    #[schema(value_type = String, format = Uuid)]
    pub shift_id: ShiftId,
}

impl Validate for OpenCoverUpRequest {
    fn validate(&self) -> Result<(), String> {
        if self.shift_id.0.is_nil() {
            return Err("shift_id must not be nil".to_string());
        }
        Ok(())
    }
}

/// A cover-up posting as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CoverUpView {
    #[schema(value_type = String, format = Uuid)]
    pub id: CoverUpId,
    #[schema(value_type = String, format = Uuid)]
    pub shift_id: ShiftId,
    #[schema(value_type = String, format = Uuid)]
    pub posted_by: EmployeeId,
    /// `"open"`, `"claimed"` or `"cancelled"`.
    #[schema(value_type = String, example = "open")]
    pub state: CoverUpState,
    /// Set exactly when `state` is `"claimed"`.
    #[schema(value_type = Option<String>, format = Uuid)]
    pub claimed_by: Option<EmployeeId>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: Timestamp,
}

impl From<CoverUp> for CoverUpView {
    fn from(unit: CoverUp) -> Self {
        Self {
            id: unit.id(),
            shift_id: unit.shift_id(),
            posted_by: unit.posted_by(),
            state: unit.state(),
            claimed_by: unit.claimed_by(),
            created_at: unit.created_at(),
            updated_at: unit.updated_at(),
        }
    }
}

fn views(units: Vec<CoverUp>) -> Vec<CoverUpView> {
    units.into_iter().map(CoverUpView::from).collect()
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the cover-ups router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/cover-ups", get(list_open).post(open_cover_up))
        .route("/v1/cover-ups/all", get(list_all))
        .route("/v1/cover-ups/{id}", get(get_cover_up))
        .route("/v1/cover-ups/{id}/claim", post(claim_cover_up))
        .route("/v1/cover-ups/{id}/cancel", post(cancel_cover_up))
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /v1/cover-ups — Open cover-ups, oldest first.
#[utoipa::path(
    get,
    path = "/v1/cover-ups",
    responses(
        (status = 200, description = "Open cover-ups", body = Vec<CoverUpView>),
    ),
    tag = "cover-ups"
)]
pub(crate) async fn list_open(
    State(state): State<AppState>,
    _caller: CallerIdentity,
) -> Result<Json<Vec<CoverUpView>>, AppError> {
    Ok(Json(views(state.ledger.list_open().await?)))
}

/// GET /v1/cover-ups/all — Every cover-up, newest first.
#[utoipa::path(
    get,
    path = "/v1/cover-ups/all",
    responses(
        (status = 200, description = "All cover-ups", body = Vec<CoverUpView>),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
    ),
    tag = "cover-ups"
)]
pub(crate) async fn list_all(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<CoverUpView>>, AppError> {
    require_role(&caller, Role::Admin)?;
    Ok(Json(views(state.ledger.list_all().await?)))
}

/// POST /v1/cover-ups — Post a shift for cover.
#[utoipa::path(
    post,
    path = "/v1/cover-ups",
    request_body = OpenCoverUpRequest,
    responses(
        (status = 201, description = "Cover-up opened", body = CoverUpView),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
        (status = 422, description = "Unknown shift", body = crate::error::ErrorBody),
    ),
    tag = "cover-ups"
)]
pub(crate) async fn open_cover_up(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<OpenCoverUpRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CoverUpView>), AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_validated_json(body)?;
    let unit = state.ledger.open(req.shift_id, caller.actor()).await?;
    Ok((StatusCode::CREATED, Json(unit.into())))
}

/// GET /v1/cover-ups/{id} — Get one cover-up.
#[utoipa::path(
    get,
    path = "/v1/cover-ups/{id}",
    params(("id" = Uuid, Path, description = "Cover-up ID")),
    responses(
        (status = 200, description = "Cover-up found", body = CoverUpView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "cover-ups"
)]
pub(crate) async fn get_cover_up(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<CoverUpView>, AppError> {
    Ok(Json(state.ledger.get(CoverUpId(id)).await?.into()))
}

/// POST /v1/cover-ups/{id}/claim — Claim an open cover-up.
///
/// Of any number of concurrent claims exactly one succeeds; the rest get 409.
#[utoipa::path(
    post,
    path = "/v1/cover-ups/{id}/claim",
    params(("id" = Uuid, Path, description = "Cover-up ID")),
    responses(
        (status = 200, description = "Claimed by the caller", body = CoverUpView),
        (status = 409, description = "No longer available", body = crate::error::ErrorBody),
        (status = 503, description = "Record busy, retry", body = crate::error::ErrorBody),
    ),
    tag = "cover-ups"
)]
pub(crate) async fn claim_cover_up(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<CoverUpView>, AppError> {
    let claimant = caller.require_employee()?;
    let unit = state.ledger.claim(CoverUpId(id), claimant).await?;
    Ok(Json(unit.into()))
}

/// POST /v1/cover-ups/{id}/cancel — Withdraw an open cover-up.
#[utoipa::path(
    post,
    path = "/v1/cover-ups/{id}/cancel",
    params(("id" = Uuid, Path, description = "Cover-up ID")),
    responses(
        (status = 200, description = "Cancelled", body = CoverUpView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Not open", body = crate::error::ErrorBody),
    ),
    tag = "cover-ups"
)]
pub(crate) async fn cancel_cover_up(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<CoverUpView>, AppError> {
    require_role(&caller, Role::Admin)?;
    let unit = state.ledger.cancel(CoverUpId(id), caller.actor()).await?;
    Ok(Json(unit.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_request_rejects_nil_shift() {
        let req = OpenCoverUpRequest {
            shift_id: ShiftId(Uuid::nil()),
        };
        assert!(req.validate().is_err());
        let req = OpenCoverUpRequest {
            shift_id: ShiftId::new(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn view_serializes_lowercase_state() {
        let view = CoverUpView::from(CoverUp::open(ShiftId::new(), EmployeeId::new()));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["state"], "open");
        assert!(json["claimed_by"].is_null());
    }

    #[test]
    fn router_builds() {
        let _router = router();
    }
}
