//! # Announcement API
//!
//! Administrators post announcements to every employee or to a chosen set.
//! Employees see broadcasts and the announcements addressed to them, newest
//! first. Posting notifies each addressee.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use shiftwise_core::{AnnouncementId, EmployeeId, Timestamp, ValidationError};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::{AnnouncementRecord, AppState, NotificationKind};

const MAX_TOPIC_LEN: usize = 255;
const MAX_MESSAGE_LEN: usize = 10_000;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Post or replace an announcement.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AnnouncementRequest {
    pub topic: String,
    pub message: String,
    /// Addressees. Omitted or empty means everyone.
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub recipients: Vec<EmployeeId>,
}

impl Validate for AnnouncementRequest {
    fn validate(&self) -> Result<(), String> {
        ValidationError::check_text("topic", &self.topic, MAX_TOPIC_LEN)
            .map_err(|e| e.to_string())?;
        ValidationError::check_text("message", &self.message, MAX_MESSAGE_LEN)
            .map_err(|e| e.to_string())
    }
}

/// An announcement with its addressees' emails resolved.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnnouncementView {
    #[schema(value_type = String, format = Uuid)]
    pub id: AnnouncementId,
    pub topic: String,
    pub message: String,
    #[schema(value_type = Vec<String>)]
    pub recipients: Vec<EmployeeId>,
    pub recipient_emails: Vec<String>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
}

impl AnnouncementView {
    fn build(state: &AppState, record: AnnouncementRecord) -> Self {
        let recipient_emails = record
            .recipients
            .iter()
            .filter_map(|id| state.employees.get(id).map(|e| e.email))
            .collect();
        Self {
            id: record.id,
            topic: record.topic,
            message: record.message,
            recipients: record.recipients,
            recipient_emails,
            created_at: record.created_at,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the announcements router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/announcements",
            get(list_announcements).post(create_announcement),
        )
        .route(
            "/v1/announcements/{id}",
            get(get_announcement)
                .put(update_announcement)
                .delete(delete_announcement),
        )
}

/// Trimmed fields and deduplicated recipients, each of which must exist.
fn normalize(
    state: &AppState,
    req: AnnouncementRequest,
) -> Result<(String, String, Vec<EmployeeId>), AppError> {
    let mut recipients = req.recipients;
    recipients.sort();
    recipients.dedup();
    if let Some(unknown) = recipients.iter().find(|id| !state.employees.contains(id)) {
        return Err(AppError::Validation(format!(
            "recipient {unknown} does not exist"
        )));
    }
    Ok((
        req.topic.trim().to_string(),
        req.message.trim().to_string(),
        recipients,
    ))
}

fn newest_first(mut records: Vec<AnnouncementRecord>) -> Vec<AnnouncementRecord> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /v1/announcements — Announcements visible to the caller, newest first.
#[utoipa::path(
    get,
    path = "/v1/announcements",
    responses(
        (status = 200, description = "Visible announcements", body = Vec<AnnouncementView>),
    ),
    tag = "announcements"
)]
pub(crate) async fn list_announcements(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<AnnouncementView>>, AppError> {
    let visible = if caller.is_admin() {
        state.announcements.list()
    } else {
        let me = caller.require_employee()?;
        state.announcements.filter(|a| a.is_visible_to(me))
    };
    Ok(Json(
        newest_first(visible)
            .into_iter()
            .map(|a| AnnouncementView::build(&state, a))
            .collect(),
    ))
}

/// POST /v1/announcements — Post an announcement.
#[utoipa::path(
    post,
    path = "/v1/announcements",
    request_body = AnnouncementRequest,
    responses(
        (status = 201, description = "Announcement posted", body = AnnouncementView),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error or unknown recipient", body = crate::error::ErrorBody),
    ),
    tag = "announcements"
)]
pub(crate) async fn create_announcement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<AnnouncementRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AnnouncementView>), AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_validated_json(body)?;
    let (topic, message, recipients) = normalize(&state, req)?;

    let record = AnnouncementRecord {
        id: AnnouncementId::new(),
        topic,
        message,
        recipients,
        created_at: Timestamp::now(),
    };
    state.announcements.insert(record.id, record.clone());

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::announcements::insert(pool, &record).await {
            state.announcements.remove(&record.id);
            tracing::error!(announcement_id = %record.id, error = %e, "failed to persist announcement");
            return Err(AppError::Internal("database write failed".to_string()));
        }
    }

    let addressees = if record.is_broadcast() {
        state
            .employees
            .filter(|e| e.role == Role::Employee)
            .into_iter()
            .map(|e| e.id)
            .collect()
    } else {
        record.recipients.clone()
    };
    for employee in addressees {
        state.notifier.emit(
            employee,
            NotificationKind::Announcement,
            format!("New announcement: {}", record.topic),
        );
    }

    tracing::info!(
        announcement_id = %record.id,
        recipients = record.recipients.len(),
        "announcement posted"
    );
    Ok((StatusCode::CREATED, Json(AnnouncementView::build(&state, record))))
}

/// GET /v1/announcements/{id} — One announcement, if visible to the caller.
#[utoipa::path(
    get,
    path = "/v1/announcements/{id}",
    params(("id" = Uuid, Path, description = "Announcement ID")),
    responses(
        (status = 200, description = "Announcement found", body = AnnouncementView),
        (status = 403, description = "Addressed to other employees", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "announcements"
)]
pub(crate) async fn get_announcement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<AnnouncementView>, AppError> {
    let id = AnnouncementId(id);
    let record = state
        .announcements
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("{id} not found")))?;
    if !caller.is_admin() && !record.is_visible_to(caller.require_employee()?) {
        return Err(AppError::Forbidden(format!(
            "{id} is addressed to other employees"
        )));
    }
    Ok(Json(AnnouncementView::build(&state, record)))
}

/// PUT /v1/announcements/{id} — Replace topic, message and recipients.
#[utoipa::path(
    put,
    path = "/v1/announcements/{id}",
    params(("id" = Uuid, Path, description = "Announcement ID")),
    request_body = AnnouncementRequest,
    responses(
        (status = 200, description = "Announcement updated", body = AnnouncementView),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error or unknown recipient", body = crate::error::ErrorBody),
        (status = 503, description = "Record busy, retry", body = crate::error::ErrorBody),
    ),
    tag = "announcements"
)]
pub(crate) async fn update_announcement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<AnnouncementRequest>, JsonRejection>,
) -> Result<Json<AnnouncementView>, AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_validated_json(body)?;
    let id = AnnouncementId(id);
    let (topic, message, recipients) = normalize(&state, req)?;

    let (before, updated) = state
        .announcements
        .try_update_within(&id, state.config.lock_timeout, |record| {
            let before = record.clone();
            record.topic = topic;
            record.message = message;
            record.recipients = recipients;
            Ok::<_, AppError>((before, record.clone()))
        })
        .map_err(|_| AppError::Busy(format!("{id} is locked, retry")))?
        .ok_or_else(|| AppError::NotFound(format!("{id} not found")))??;

    if let Some(pool) = &state.db_pool {
        match crate::db::announcements::update(pool, &updated).await {
            Ok(true) => {}
            Ok(false) => {
                state.announcements.remove(&id);
                return Err(AppError::NotFound(format!("{id} not found")));
            }
            Err(e) => {
                state.announcements.restore(&id, &updated, before);
                tracing::error!(announcement_id = %id, error = %e, "failed to persist announcement");
                return Err(AppError::Internal("database write failed".to_string()));
            }
        }
    }

    tracing::info!(announcement_id = %id, "announcement updated");
    Ok(Json(AnnouncementView::build(&state, updated)))
}

/// DELETE /v1/announcements/{id} — Remove an announcement.
#[utoipa::path(
    delete,
    path = "/v1/announcements/{id}",
    params(("id" = Uuid, Path, description = "Announcement ID")),
    responses(
        (status = 204, description = "Announcement deleted"),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "announcements"
)]
pub(crate) async fn delete_announcement(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&caller, Role::Admin)?;
    let id = AnnouncementId(id);
    if !state.announcements.contains(&id) {
        return Err(AppError::NotFound(format!("{id} not found")));
    }

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::announcements::delete(pool, id).await {
            tracing::error!(announcement_id = %id, error = %e, "failed to delete announcement");
            return Err(AppError::Internal("database write failed".to_string()));
        }
    }

    state.announcements.remove(&id);
    tracing::info!(announcement_id = %id, "announcement deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(topic: &str, message: &str) -> AnnouncementRequest {
        AnnouncementRequest {
            topic: topic.to_string(),
            message: message.to_string(),
            recipients: Vec::new(),
        }
    }

    #[test]
    fn request_validation() {
        assert!(request("Holiday hours", "Closed on Monday").validate().is_ok());
        assert!(request(" ", "Closed on Monday").validate().is_err());
        assert!(request("Holiday hours", "").validate().is_err());
        let err = request(&"x".repeat(MAX_TOPIC_LEN + 1), "body")
            .validate()
            .unwrap_err();
        assert!(err.contains("topic"), "got: {err}");
    }

    #[test]
    fn recipients_default_to_everyone() {
        let req: AnnouncementRequest =
            serde_json::from_str(r#"{"topic":"Rota","message":"Posted"}"#).unwrap();
        assert!(req.recipients.is_empty());
    }

    #[test]
    fn unknown_recipient_is_rejected() {
        let state = AppState::new();
        let mut req = request("Rota", "Posted");
        req.recipients = vec![EmployeeId::new()];
        assert!(matches!(normalize(&state, req), Err(AppError::Validation(_))));
    }

    #[test]
    fn visibility_follows_recipients() {
        let (dana, eli) = (EmployeeId::new(), EmployeeId::new());
        let mut record = AnnouncementRecord {
            id: AnnouncementId::new(),
            topic: "Rota".to_string(),
            message: "Posted".to_string(),
            recipients: Vec::new(),
            created_at: Timestamp::now(),
        };
        assert!(record.is_visible_to(dana) && record.is_visible_to(eli));
        record.recipients = vec![dana];
        assert!(record.is_visible_to(dana));
        assert!(!record.is_visible_to(eli));
    }

    #[test]
    fn router_builds() {
        let _router = router();
    }
}
