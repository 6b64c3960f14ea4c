//! # Inquiry API
//!
//! Employees ask; administrators answer. The owner is notified of each
//! answer.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use shiftwise_core::{InquiryId, Timestamp, ValidationError};

use crate::auth::{require_access, require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::{AppState, InquiryRecord, InquiryStatus, NotificationKind};

const MAX_SUBJECT_LEN: usize = 255;
const MAX_TEXT_LEN: usize = 10_000;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Ask the administrators a question.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInquiryRequest {
    pub subject: String,
    pub message: String,
}

impl Validate for CreateInquiryRequest {
    fn validate(&self) -> Result<(), String> {
        ValidationError::check_text("subject", &self.subject, MAX_SUBJECT_LEN)
            .map_err(|e| e.to_string())?;
        ValidationError::check_text("message", &self.message, MAX_TEXT_LEN)
            .map_err(|e| e.to_string())
    }
}

/// Answer an inquiry.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AnswerInquiryRequest {
    pub answer: String,
}

impl Validate for AnswerInquiryRequest {
    fn validate(&self) -> Result<(), String> {
        ValidationError::check_text("answer", &self.answer, MAX_TEXT_LEN).map_err(|e| e.to_string())
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the inquiries router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/inquiries", get(list_inquiries).post(create_inquiry))
        .route("/v1/inquiries/mine", get(my_inquiries))
        .route(
            "/v1/inquiries/{id}",
            get(get_inquiry).delete(delete_inquiry),
        )
        .route("/v1/inquiries/{id}/answer", post(answer_inquiry))
}

fn newest_first(mut records: Vec<InquiryRecord>) -> Vec<InquiryRecord> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /v1/inquiries — Ask a question as the calling employee.
#[utoipa::path(
    post,
    path = "/v1/inquiries",
    request_body = CreateInquiryRequest,
    responses(
        (status = 201, description = "Inquiry created", body = InquiryRecord),
        (status = 403, description = "Token not bound to an employee", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "inquiries"
)]
pub(crate) async fn create_inquiry(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateInquiryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<InquiryRecord>), AppError> {
    let me = caller.require_employee()?;
    let req = extract_validated_json(body)?;

    let now = Timestamp::now();
    let record = InquiryRecord {
        id: InquiryId::new(),
        employee_id: me,
        subject: req.subject.trim().to_string(),
        message: req.message.trim().to_string(),
        answer: None,
        status: InquiryStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    state.inquiries.insert(record.id, record.clone());

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::inquiries::insert(pool, &record).await {
            state.inquiries.remove(&record.id);
            tracing::error!(inquiry_id = %record.id, error = %e, "failed to persist inquiry");
            return Err(AppError::Internal("database write failed".to_string()));
        }
    }

    tracing::info!(inquiry_id = %record.id, employee_id = %me, "inquiry created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/inquiries — All inquiries, newest first.
#[utoipa::path(
    get,
    path = "/v1/inquiries",
    responses(
        (status = 200, description = "All inquiries", body = Vec<InquiryRecord>),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
    ),
    tag = "inquiries"
)]
pub(crate) async fn list_inquiries(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<InquiryRecord>>, AppError> {
    require_role(&caller, Role::Admin)?;
    Ok(Json(newest_first(state.inquiries.list())))
}

/// GET /v1/inquiries/mine — The caller's inquiries, newest first.
#[utoipa::path(
    get,
    path = "/v1/inquiries/mine",
    responses(
        (status = 200, description = "Caller's inquiries", body = Vec<InquiryRecord>),
    ),
    tag = "inquiries"
)]
pub(crate) async fn my_inquiries(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<InquiryRecord>>, AppError> {
    let me = caller.require_employee()?;
    Ok(Json(newest_first(
        state.inquiries.filter(|i| i.employee_id == me),
    )))
}

/// GET /v1/inquiries/{id} — One inquiry; admins or its author.
#[utoipa::path(
    get,
    path = "/v1/inquiries/{id}",
    params(("id" = Uuid, Path, description = "Inquiry ID")),
    responses(
        (status = 200, description = "Inquiry found", body = InquiryRecord),
        (status = 403, description = "Another employee's inquiry", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "inquiries"
)]
pub(crate) async fn get_inquiry(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<InquiryRecord>, AppError> {
    let id = InquiryId(id);
    let record = state
        .inquiries
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("{id} not found")))?;
    require_access(&caller, record.employee_id, "this inquiry")?;
    Ok(Json(record))
}

/// POST /v1/inquiries/{id}/answer — Answer, or replace the answer.
#[utoipa::path(
    post,
    path = "/v1/inquiries/{id}/answer",
    params(("id" = Uuid, Path, description = "Inquiry ID")),
    request_body = AnswerInquiryRequest,
    responses(
        (status = 200, description = "Answer recorded", body = InquiryRecord),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Blank answer", body = crate::error::ErrorBody),
        (status = 503, description = "Record busy, retry", body = crate::error::ErrorBody),
    ),
    tag = "inquiries"
)]
pub(crate) async fn answer_inquiry(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<AnswerInquiryRequest>, JsonRejection>,
) -> Result<Json<InquiryRecord>, AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_validated_json(body)?;
    let id = InquiryId(id);
    let answer = req.answer.trim().to_string();

    let (before, answered) = state
        .inquiries
        .try_update_within(&id, state.config.lock_timeout, |record| {
            let before = record.clone();
            record.answer = Some(answer);
            record.status = InquiryStatus::Answered;
            record.updated_at = Timestamp::now();
            Ok::<_, AppError>((before, record.clone()))
        })
        .map_err(|_| AppError::Busy(format!("{id} is locked, retry")))?
        .ok_or_else(|| AppError::NotFound(format!("{id} not found")))??;

    if let Some(pool) = &state.db_pool {
        match crate::db::inquiries::update_answer(pool, &answered).await {
            Ok(true) => {}
            Ok(false) => {
                state.inquiries.remove(&id);
                return Err(AppError::NotFound(format!("{id} not found")));
            }
            Err(e) => {
                state.inquiries.restore(&id, &answered, before);
                tracing::error!(inquiry_id = %id, error = %e, "failed to persist inquiry answer");
                return Err(AppError::Internal("database write failed".to_string()));
            }
        }
    }

    tracing::info!(inquiry_id = %id, "inquiry answered");
    state.notifier.emit(
        answered.employee_id,
        NotificationKind::Inquiry,
        format!("Your inquiry \"{}\" was answered", answered.subject),
    );
    Ok(Json(answered))
}

/// DELETE /v1/inquiries/{id} — Remove an inquiry.
#[utoipa::path(
    delete,
    path = "/v1/inquiries/{id}",
    params(("id" = Uuid, Path, description = "Inquiry ID")),
    responses(
        (status = 204, description = "Inquiry deleted"),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "inquiries"
)]
pub(crate) async fn delete_inquiry(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_role(&caller, Role::Admin)?;
    let id = InquiryId(id);
    if !state.inquiries.contains(&id) {
        return Err(AppError::NotFound(format!("{id} not found")));
    }

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::inquiries::delete(pool, id).await {
            tracing::error!(inquiry_id = %id, error = %e, "failed to delete inquiry");
            return Err(AppError::Internal("database write failed".to_string()));
        }
    }

    state.inquiries.remove(&id);
    tracing::info!(inquiry_id = %id, "inquiry deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_validation() {
        let ok = CreateInquiryRequest {
            subject: "Parking".to_string(),
            message: "Is the lot open on Sunday?".to_string(),
        };
        assert!(ok.validate().is_ok());
        let blank = CreateInquiryRequest {
            subject: "Parking".to_string(),
            message: "  ".to_string(),
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn blank_answer_is_rejected() {
        let err = AnswerInquiryRequest { answer: String::new() }.validate().unwrap_err();
        assert!(err.contains("answer"), "got: {err}");
    }

    #[test]
    fn status_vocabulary_round_trips() {
        for status in [InquiryStatus::Pending, InquiryStatus::Answered] {
            assert_eq!(InquiryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(InquiryStatus::parse("closed"), None);
    }

    #[test]
    fn router_builds() {
        let _router = router();
    }
}
