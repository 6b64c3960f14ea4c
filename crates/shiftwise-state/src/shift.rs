//! # Shift Status Lifecycle
//!
//! ```text
//! Pending ──employee confirms──▶ EmployeeConfirmed ──admin──▶ Confirmed
//!    │                                  │
//!    └───────────admin──────────────────┴──────admin──▶ Cancelled
//! ```
//!
//! An administrator may also confirm a `Pending` shift directly. `Confirmed`
//! and `Cancelled` are terminal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of a scheduled shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Pending,
    EmployeeConfirmed,
    Confirmed,
    Cancelled,
}

/// Rejected shift status change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShiftStatusError {
    #[error("cannot move shift from {from} to {to}")]
    InvalidTransition { from: ShiftStatus, to: ShiftStatus },
}

impl ShiftStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::EmployeeConfirmed => "employee_confirmed",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "employee_confirmed" => Some(Self::EmployeeConfirmed),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// The assigned employee acknowledges the shift.
    pub fn confirm_by_employee(self) -> Result<Self, ShiftStatusError> {
        match self {
            Self::Pending => Ok(Self::EmployeeConfirmed),
            from => Err(ShiftStatusError::InvalidTransition {
                from,
                to: Self::EmployeeConfirmed,
            }),
        }
    }

    /// An administrator finalizes the shift as `Confirmed` or `Cancelled`.
    pub fn set_by_admin(self, to: Self) -> Result<Self, ShiftStatusError> {
        let allowed = !self.is_terminal() && matches!(to, Self::Confirmed | Self::Cancelled);
        if !allowed {
            return Err(ShiftStatusError::InvalidTransition { from: self, to });
        }
        Ok(to)
    }
}

impl std::fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ShiftStatus; 4] = [
        ShiftStatus::Pending,
        ShiftStatus::EmployeeConfirmed,
        ShiftStatus::Confirmed,
        ShiftStatus::Cancelled,
    ];

    #[test]
    fn test_employee_confirms_only_pending() {
        assert_eq!(
            ShiftStatus::Pending.confirm_by_employee(),
            Ok(ShiftStatus::EmployeeConfirmed)
        );
        for s in &ALL[1..] {
            assert!(s.confirm_by_employee().is_err());
        }
    }

    #[test]
    fn test_admin_finalizes_open_statuses() {
        for from in [ShiftStatus::Pending, ShiftStatus::EmployeeConfirmed] {
            assert_eq!(
                from.set_by_admin(ShiftStatus::Confirmed),
                Ok(ShiftStatus::Confirmed)
            );
            assert_eq!(
                from.set_by_admin(ShiftStatus::Cancelled),
                Ok(ShiftStatus::Cancelled)
            );
        }
    }

    #[test]
    fn test_terminal_statuses_are_final() {
        for from in [ShiftStatus::Confirmed, ShiftStatus::Cancelled] {
            for to in ALL {
                assert!(from.set_by_admin(to).is_err());
            }
        }
    }

    #[test]
    fn test_admin_cannot_set_intermediate_statuses() {
        assert_eq!(
            ShiftStatus::Pending.set_by_admin(ShiftStatus::EmployeeConfirmed),
            Err(ShiftStatusError::InvalidTransition {
                from: ShiftStatus::Pending,
                to: ShiftStatus::EmployeeConfirmed
            })
        );
    }

    #[test]
    fn test_string_forms() {
        for s in ALL {
            assert_eq!(ShiftStatus::parse(s.as_str()), Some(s));
            assert_eq!(serde_json::to_value(s).unwrap(), s.as_str());
        }
    }
}
