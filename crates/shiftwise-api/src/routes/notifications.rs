//! # Notification API
//!
//! The caller's in-app inbox.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use shiftwise_core::NotificationId;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::{AppState, NotificationRecord};

// ── Router ──────────────────────────────────────────────────────────

/// Build the notifications router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/notifications", get(my_notifications))
        .route("/v1/notifications/{id}/read", post(mark_read))
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /v1/notifications — The caller's notifications, newest first.
#[utoipa::path(
    get,
    path = "/v1/notifications",
    responses(
        (status = 200, description = "Caller's notifications", body = Vec<NotificationRecord>),
    ),
    tag = "notifications"
)]
pub(crate) async fn my_notifications(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<NotificationRecord>>, AppError> {
    let me = caller.require_employee()?;
    Ok(Json(state.notifier.for_recipient(me)))
}

/// POST /v1/notifications/{id}/read — Mark one of the caller's notifications read.
#[utoipa::path(
    post,
    path = "/v1/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Marked read", body = NotificationRecord),
        (status = 403, description = "Another employee's notification", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "notifications"
)]
pub(crate) async fn mark_read(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationRecord>, AppError> {
    let me = caller.require_employee()?;
    let id = NotificationId(id);
    let existing = state
        .notifier
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("{id} not found")))?;
    if existing.recipient != me {
        return Err(AppError::Forbidden(format!(
            "{id} belongs to another employee"
        )));
    }
    if existing.is_read {
        return Ok(Json(existing));
    }
    state
        .notifier
        .mark_read(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("{id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_builds() {
        let _router = router();
    }
}
