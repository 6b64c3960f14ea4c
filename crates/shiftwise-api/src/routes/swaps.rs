//! # Shift Swap API
//!
//! The swap arbitrator over HTTP. Employees propose swaps of their own
//! shifts; an administrator who is not a party decides each proposal once.
//! Approval moves both shifts in the same step as the decision.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use shiftwise_core::{EmployeeId, ShiftId, SwapId, Timestamp};
use shiftwise_state::{DecisionState, SwapProposal};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::routes::DecisionRequest;
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Propose swapping one of the caller's shifts with a colleague's.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProposeSwapRequest {
    #[schema(value_type = String, format = Uuid)]
    pub partner_id: EmployeeId,
    #[schema(value_type = String, format = Uuid)]
    pub requester_shift_id: ShiftId,
    #[schema(value_type = String, format = Uuid)]
    pub partner_shift_id: ShiftId,
    #[serde(default)]
    pub reason: String,
}

impl Validate for ProposeSwapRequest {
    fn validate(&self) -> Result<(), String> {
        if self.requester_shift_id == self.partner_shift_id {
            return Err("requester_shift_id and partner_shift_id must differ".to_string());
        }
        if self.reason.chars().count() > shiftwise_state::swap::MAX_REASON_LEN {
            return Err(format!(
                "reason must not exceed {} characters",
                shiftwise_state::swap::MAX_REASON_LEN
            ));
        }
        Ok(())
    }
}

/// A swap proposal as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SwapView {
    #[schema(value_type = String, format = Uuid)]
    pub id: SwapId,
    #[schema(value_type = String, format = Uuid)]
    pub requester: EmployeeId,
    #[schema(value_type = String, format = Uuid)]
    pub partner: EmployeeId,
    #[schema(value_type = String, format = Uuid)]
    pub requester_shift: ShiftId,
    #[schema(value_type = String, format = Uuid)]
    pub partner_shift: ShiftId,
    pub reason: String,
    /// `"pending"`, `"approved"` or `"rejected"`.
    #[schema(value_type = String, example = "pending")]
    pub state: DecisionState,
    #[schema(value_type = Option<String>, format = Uuid)]
    pub decided_by: Option<EmployeeId>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub decided_at: Option<Timestamp>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
}

impl From<SwapProposal> for SwapView {
    fn from(p: SwapProposal) -> Self {
        Self {
            id: p.id(),
            requester: p.requester(),
            partner: p.partner(),
            requester_shift: p.requester_shift(),
            partner_shift: p.partner_shift(),
            reason: p.reason().to_string(),
            state: p.state(),
            decided_by: p.ruling().decided_by(),
            decided_at: p.ruling().decided_at(),
            created_at: p.created_at(),
        }
    }
}

fn views(proposals: Vec<SwapProposal>) -> Vec<SwapView> {
    proposals.into_iter().map(SwapView::from).collect()
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the swaps router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/swaps", get(list_swaps).post(propose_swap))
        .route("/v1/swaps/mine", get(my_swaps))
        .route("/v1/swaps/{id}", get(get_swap))
        .route("/v1/swaps/{id}/decision", post(decide_swap))
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /v1/swaps — Propose a swap.
#[utoipa::path(
    post,
    path = "/v1/swaps",
    request_body = ProposeSwapRequest,
    responses(
        (status = 201, description = "Proposal created", body = SwapView),
        (status = 422, description = "Invalid proposal", body = crate::error::ErrorBody),
    ),
    tag = "swaps"
)]
pub(crate) async fn propose_swap(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ProposeSwapRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SwapView>), AppError> {
    let requester = caller.require_employee()?;
    let req = extract_validated_json(body)?;
    let proposal = state
        .arbitrator
        .propose(
            requester,
            req.partner_id,
            req.requester_shift_id,
            req.partner_shift_id,
            req.reason,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(proposal.into())))
}

/// GET /v1/swaps — All proposals, newest first.
#[utoipa::path(
    get,
    path = "/v1/swaps",
    responses(
        (status = 200, description = "All proposals", body = Vec<SwapView>),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
    ),
    tag = "swaps"
)]
pub(crate) async fn list_swaps(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<SwapView>>, AppError> {
    require_role(&caller, Role::Admin)?;
    Ok(Json(views(state.arbitrator.list().await?)))
}

/// GET /v1/swaps/mine — Proposals the caller is party to, newest first.
#[utoipa::path(
    get,
    path = "/v1/swaps/mine",
    responses(
        (status = 200, description = "Caller's proposals", body = Vec<SwapView>),
    ),
    tag = "swaps"
)]
pub(crate) async fn my_swaps(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<SwapView>>, AppError> {
    let me = caller.require_employee()?;
    Ok(Json(views(state.arbitrator.list_for(me).await?)))
}

/// GET /v1/swaps/{id} — One proposal, visible to its parties and admins.
#[utoipa::path(
    get,
    path = "/v1/swaps/{id}",
    params(("id" = Uuid, Path, description = "Swap proposal ID")),
    responses(
        (status = 200, description = "Proposal found", body = SwapView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "swaps"
)]
pub(crate) async fn get_swap(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<SwapView>, AppError> {
    let proposal = state.arbitrator.get(SwapId(id)).await?;
    let visible = caller.is_admin()
        || caller
            .employee_id
            .is_some_and(|me| proposal.involves(me));
    if !visible {
        return Err(AppError::Forbidden(format!(
            "{} belongs to other employees",
            proposal.id()
        )));
    }
    Ok(Json(proposal.into()))
}

/// POST /v1/swaps/{id}/decision — Approve or reject a pending proposal.
#[utoipa::path(
    post,
    path = "/v1/swaps/{id}/decision",
    params(("id" = Uuid, Path, description = "Swap proposal ID")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Decision recorded", body = SwapView),
        (status = 403, description = "Not an admin, or a party to the swap", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already decided, or shifts changed hands", body = crate::error::ErrorBody),
        (status = 503, description = "Record busy, retry", body = crate::error::ErrorBody),
    ),
    tag = "swaps"
)]
pub(crate) async fn decide_swap(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<Json<SwapView>, AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_json(body)?;
    let proposal = state
        .arbitrator
        .decide(SwapId(id), req.decision, caller.actor())
        .await?;
    Ok(Json(proposal.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propose_request_rejects_same_shift() {
        let shift = ShiftId::new();
        let req = ProposeSwapRequest {
            partner_id: EmployeeId::new(),
            requester_shift_id: shift,
            partner_shift_id: shift,
            reason: String::new(),
        };
        assert!(req.validate().unwrap_err().contains("must differ"));
    }

    #[test]
    fn propose_request_reason_is_optional() {
        let req: ProposeSwapRequest = serde_json::from_value(serde_json::json!({
            "partner_id": Uuid::new_v4(),
            "requester_shift_id": Uuid::new_v4(),
            "partner_shift_id": Uuid::new_v4(),
        }))
        .unwrap();
        assert!(req.reason.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn decision_request_accepts_lowercase_verbs() {
        let req: DecisionRequest =
            serde_json::from_str(r#"{"decision":"reject"}"#).unwrap();
        assert_eq!(req.decision, shiftwise_state::Decision::Reject);
        assert!(serde_json::from_str::<DecisionRequest>(r#"{"decision":"maybe"}"#).is_err());
    }
}
