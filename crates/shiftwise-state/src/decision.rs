//! # Approval Decisions
//!
//! A [`Ruling`] is the decision slot embedded in swap proposals and leave
//! requests. It starts `Pending` and is sealed exactly once.
//!
//! ```text
//! Pending ──approve──▶ Approved  (terminal)
//!    │
//!    └─────reject───▶ Rejected  (terminal)
//! ```
//!
//! `decided_by` and `decided_at` are present if and only if the ruling is
//! no longer pending.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use shiftwise_core::{EmployeeId, Timestamp};

/// State of an approval decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionState {
    /// Awaiting a decision.
    Pending,
    /// Accepted (terminal).
    Approved,
    /// Declined (terminal).
    Rejected,
}

impl DecisionState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// The stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parse the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for DecisionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verdict an approver hands down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// The terminal state this decision produces.
    pub fn outcome(self) -> DecisionState {
        match self {
            Self::Approve => DecisionState::Approved,
            Self::Reject => DecisionState::Rejected,
        }
    }
}

/// Errors from deciding or loading a ruling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecisionError {
    /// The subject has already been decided.
    #[error("{subject} was already {current}")]
    AlreadyDecided {
        /// Display form of the decided record's id.
        subject: String,
        /// The sealed state.
        current: DecisionState,
    },

    /// The approver is a party to the request.
    #[error("{approver} is a party to {subject} and cannot decide it")]
    PartyCannotDecide {
        /// Display form of the record's id.
        subject: String,
        /// The would-be approver.
        approver: EmployeeId,
    },

    /// Stored fields violate the ruling invariant.
    #[error("{subject} is inconsistent: {reason}")]
    Inconsistent {
        /// Display form of the record's id.
        subject: String,
        /// Which invariant failed.
        reason: String,
    },
}

/// Seal-once decision slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ruling {
    state: DecisionState,
    decided_by: Option<EmployeeId>,
    decided_at: Option<Timestamp>,
}

impl Ruling {
    /// A fresh, undecided ruling.
    pub fn pending() -> Self {
        Self {
            state: DecisionState::Pending,
            decided_by: None,
            decided_at: None,
        }
    }

    /// Rebuild from stored fields. `subject` is used in error messages.
    pub fn from_parts(
        subject: &dyn std::fmt::Display,
        state: DecisionState,
        decided_by: Option<EmployeeId>,
        decided_at: Option<Timestamp>,
    ) -> Result<Self, DecisionError> {
        let sealed = decided_by.is_some() && decided_at.is_some();
        let unsealed = decided_by.is_none() && decided_at.is_none();
        let consistent = if state.is_terminal() { sealed } else { unsealed };
        if !consistent {
            return Err(DecisionError::Inconsistent {
                subject: subject.to_string(),
                reason: format!("{state} with decided_by/decided_at mismatch"),
            });
        }
        Ok(Self {
            state,
            decided_by,
            decided_at,
        })
    }

    /// Seal the ruling. Fails with `AlreadyDecided` if it is not pending.
    pub fn decide(
        &mut self,
        subject: &dyn std::fmt::Display,
        decision: Decision,
        approver: EmployeeId,
    ) -> Result<(), DecisionError> {
        if self.state.is_terminal() {
            return Err(DecisionError::AlreadyDecided {
                subject: subject.to_string(),
                current: self.state,
            });
        }
        self.state = decision.outcome();
        self.decided_by = Some(approver);
        self.decided_at = Some(Timestamp::now());
        Ok(())
    }

    pub fn state(&self) -> DecisionState {
        self.state
    }

    pub fn decided_by(&self) -> Option<EmployeeId> {
        self.decided_by
    }

    pub fn decided_at(&self) -> Option<Timestamp> {
        self.decided_at
    }
}
