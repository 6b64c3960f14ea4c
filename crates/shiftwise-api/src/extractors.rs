//! # Custom Extractors & Validation
//!
//! The [`Validate`] trait for request DTOs and helpers to extract and
//! validate JSON bodies in handlers.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Request types that check business rules beyond what serde checks.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Validate an optional free-text field: when present it must be non-blank
/// and at most `max` characters.
pub fn check_optional_text(field: &'static str, value: Option<&str>, max: usize) -> Result<(), String> {
    match value {
        Some(v) => shiftwise_core::ValidationError::check_text(field, v, max).map_err(|e| e.to_string()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(String);

    impl Validate for Named {
        fn validate(&self) -> Result<(), String> {
            shiftwise_core::ValidationError::check_text("name", &self.0, 10).map_err(|e| e.to_string())
        }
    }

    #[test]
    fn validated_json_passes_good_input() {
        let value = extract_validated_json(Ok(Json(Named("Dana".into())))).unwrap();
        assert_eq!(value.0, "Dana");
    }

    #[test]
    fn validated_json_rejects_rule_violation() {
        let err = extract_validated_json(Ok(Json(Named(" ".into())))).err().unwrap();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("name")));
    }

    #[test]
    fn optional_text_checks_only_when_present() {
        assert!(check_optional_text("location", None, 5).is_ok());
        assert!(check_optional_text("location", Some("Dock"), 5).is_ok());
        assert!(check_optional_text("location", Some("Warehouse"), 5).is_err());
        assert!(check_optional_text("location", Some(""), 5).is_err());
    }
}
