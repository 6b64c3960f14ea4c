//! # Error Types
//!
//! Errors shared across the workspace. All use `thiserror`.
//!
//! - [`ValidationError`] names the offending field so the API layer can
//!   return a precise 422 body.
//! - [`ShiftwiseError`] is the catch-all for foundational failures.

use thiserror::Error;

/// Top-level error type for foundational operations.
#[derive(Error, Debug)]
pub enum ShiftwiseError {
    /// A timestamp string could not be parsed or was not UTC.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A request field failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field was empty or whitespace.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// A text field exceeded its maximum length.
    #[error("{field} must not exceed {max} characters")]
    TooLong {
        /// Field name.
        field: &'static str,
        /// Maximum number of characters.
        max: usize,
    },

    /// A field had a value outside its allowed domain.
    #[error("{field} is invalid: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl ValidationError {
    /// Check that `value` is non-blank and at most `max` characters.
    pub fn check_text(field: &'static str, value: &str, max: usize) -> Result<(), Self> {
        if value.trim().is_empty() {
            return Err(Self::Empty(field));
        }
        if value.chars().count() > max {
            return Err(Self::TooLong { field, max });
        }
        Ok(())
    }
}
