//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps ledger, arbitrator and domain errors to HTTP status codes with a
//! JSON body `{"error": {"code", "message", "details?"}}`. Internal error
//! details are never returned to clients.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use shiftwise_state::{CoverUpState, DecisionError, DecisionState, ShiftStatusError};

use crate::arbitrator::ArbitrationError;
use crate::ledger::ClaimError;
use crate::schedule::ScheduleError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "NOT_CLAIMABLE").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for some client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The cover-up was taken, cancelled, or never existed (409).
    #[error("no longer available: {message}")]
    NotClaimable {
        message: String,
        current: Option<CoverUpState>,
    },

    /// The request was already approved or rejected (409).
    #[error("already decided: {message}")]
    AlreadyDecided {
        message: String,
        current: DecisionState,
    },

    /// A record lock could not be acquired in time (503, retryable).
    #[error("busy: {0}")]
    Busy(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::NotClaimable { .. } => (StatusCode::CONFLICT, "NOT_CLAIMABLE"),
            Self::AlreadyDecided { .. } => (StatusCode::CONFLICT, "ALREADY_DECIDED"),
            Self::Busy(_) => (StatusCode::SERVICE_UNAVAILABLE, "BUSY"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::NotClaimable { current, .. } => Some(serde_json::json!({
                "current": current.map(|s| s.as_str()),
            })),
            Self::AlreadyDecided { current, .. } => Some(serde_json::json!({
                "current": current.as_str(),
            })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(&self, Self::Busy(_)) {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

impl From<shiftwise_core::ValidationError> for AppError {
    fn from(err: shiftwise_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<ClaimError> for AppError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::NotFound(_) => Self::NotFound(err.to_string()),
            ClaimError::NotClaimable { current, .. } => Self::NotClaimable {
                message: err.to_string(),
                current,
            },
            ClaimError::ShiftNotFound(_) => Self::Validation(err.to_string()),
            ClaimError::Busy { .. } => Self::Busy(err.to_string()),
            ClaimError::Corrupt(_) | ClaimError::Storage(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<ArbitrationError> for AppError {
    fn from(err: ArbitrationError) -> Self {
        match err {
            ArbitrationError::NotFound(_) => Self::NotFound(err.to_string()),
            ArbitrationError::AlreadyDecided { current, .. } => Self::AlreadyDecided {
                message: err.to_string(),
                current,
            },
            ArbitrationError::PartyCannotDecide { .. } => Self::Forbidden(err.to_string()),
            ArbitrationError::StaleAssignment { .. } => Self::Conflict(err.to_string()),
            ArbitrationError::Invalid(e) => Self::Validation(e.to_string()),
            ArbitrationError::Busy { .. } => Self::Busy(err.to_string()),
            ArbitrationError::Corrupt(_) | ArbitrationError::Storage(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<DecisionError> for AppError {
    fn from(err: DecisionError) -> Self {
        match err {
            DecisionError::AlreadyDecided { current, .. } => Self::AlreadyDecided {
                message: err.to_string(),
                current,
            },
            DecisionError::PartyCannotDecide { .. } => Self::Forbidden(err.to_string()),
            DecisionError::Inconsistent { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::NotFound(_) => Self::NotFound(err.to_string()),
            ScheduleError::NotAssigned { .. } => Self::Forbidden(err.to_string()),
            ScheduleError::Transition(e) => e.into(),
            ScheduleError::Busy(_) => Self::Busy(err.to_string()),
            ScheduleError::Stale(_) => Self::Conflict(err.to_string()),
            ScheduleError::Storage(e) => e.into(),
        }
    }
}

impl From<ShiftStatusError> for AppError {
    fn from(err: ShiftStatusError) -> Self {
        Self::Conflict(err.to_string())
    }
}

impl From<shiftwise_payroll::PayrollError> for AppError {
    fn from(err: shiftwise_payroll::PayrollError) -> Self {
        match err {
            shiftwise_payroll::PayrollError::Overflow => Self::Internal(err.to_string()),
            _ => Self::Validation(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if crate::concurrency::is_busy_sqlx(&err) {
            Self::Busy(format!("database busy: {err}"))
        } else {
            Self::Internal(format!("database error: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftwise_core::{CoverUpId, EmployeeId, SwapId};

    #[test]
    fn not_found_status_code() {
        let (status, code) = AppError::NotFound("missing".into()).status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn validation_status_code() {
        let (status, code) = AppError::Validation("bad field".into()).status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[test]
    fn race_losses_are_conflicts() {
        let lost = AppError::NotClaimable {
            message: "gone".into(),
            current: Some(CoverUpState::Claimed),
        };
        assert_eq!(
            lost.status_and_code(),
            (StatusCode::CONFLICT, "NOT_CLAIMABLE")
        );

        let decided = AppError::AlreadyDecided {
            message: "done".into(),
            current: DecisionState::Rejected,
        };
        assert_eq!(
            decided.status_and_code(),
            (StatusCode::CONFLICT, "ALREADY_DECIDED")
        );
    }

    #[test]
    fn busy_is_service_unavailable() {
        let (status, code) = AppError::Busy("lock".into()).status_and_code();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "BUSY");
    }

    #[test]
    fn claim_error_missing_unit_is_not_claimable() {
        let err = AppError::from(ClaimError::NotClaimable {
            id: CoverUpId::new(),
            current: None,
        });
        match err {
            AppError::NotClaimable { current, .. } => assert_eq!(current, None),
            other => panic!("expected NotClaimable, got: {other:?}"),
        }
    }

    #[test]
    fn arbitration_errors_map_to_statuses() {
        let id = SwapId::new();
        let cases = [
            (
                ArbitrationError::NotFound(id),
                StatusCode::NOT_FOUND,
            ),
            (
                ArbitrationError::AlreadyDecided {
                    id,
                    current: DecisionState::Approved,
                },
                StatusCode::CONFLICT,
            ),
            (
                ArbitrationError::PartyCannotDecide {
                    id,
                    approver: EmployeeId::new(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                ArbitrationError::Busy {
                    operation: "decide",
                    id,
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            let (status, _) = AppError::from(err).status_and_code();
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn sqlx_pool_timeout_is_busy() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, AppError::Busy(_)));
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn error_body_skips_empty_details() {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "TEST".to_string(),
                message: "test message".to_string(),
                details: None,
            },
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("TEST"));
        assert!(!json.contains("details"));
    }

    // ── into_response tests ──────────────────────────────────────

    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, Option<HeaderValue>, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let retry_after = response.headers().get(header::RETRY_AFTER).cloned();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, retry_after, body)
    }

    #[tokio::test]
    async fn into_response_not_claimable_reports_current_state() {
        let (status, _, body) = response_parts(AppError::NotClaimable {
            message: "cover-up taken".into(),
            current: Some(CoverUpState::Cancelled),
        })
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.code, "NOT_CLAIMABLE");
        assert_eq!(body.error.details.unwrap()["current"], "cancelled");
    }

    #[tokio::test]
    async fn into_response_not_claimable_missing_has_null_state() {
        let (_, _, body) = response_parts(AppError::NotClaimable {
            message: "no such cover-up".into(),
            current: None,
        })
        .await;
        assert!(body.error.details.unwrap()["current"].is_null());
    }

    #[tokio::test]
    async fn into_response_busy_sets_retry_after() {
        let (status, retry_after, body) = response_parts(AppError::Busy("lock".into())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(retry_after.unwrap(), "1");
        assert_eq!(body.error.code, "BUSY");
    }

    #[tokio::test]
    async fn into_response_internal_hides_details() {
        let (status, _, body) =
            response_parts(AppError::Internal("db connection failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(
            !body.error.message.contains("db connection"),
            "internal error details must not leak: {}",
            body.error.message
        );
        assert!(body.error.details.is_none());
    }

    #[test]
    fn validation_error_from_core() {
        let core_err = shiftwise_core::ValidationError::Empty("name");
        match AppError::from(core_err) {
            AppError::Validation(msg) => assert!(msg.contains("name"), "got: {msg}"),
            other => panic!("expected Validation, got: {other:?}"),
        }
    }

    #[test]
    fn decision_error_party_is_forbidden() {
        let err = AppError::from(DecisionError::PartyCannotDecide {
            subject: "leave:x".into(),
            approver: EmployeeId::new(),
        });
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
