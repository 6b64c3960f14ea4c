//! # Cover-Up Claim State Machine
//!
//! A cover-up is a shift posted for anyone to take over. Exactly one
//! employee may claim it.
//!
//! ## States
//!
//! ```text
//! Open ──claim──▶ Claimed   (terminal)
//!   │
//!   └──cancel──▶ Cancelled  (terminal)
//! ```
//!
//! ## Invariant
//!
//! `claimed_by` is `Some` if and only if the state is `Claimed`. The fields
//! are private and every constructor checks this, so no value of
//! [`CoverUp`] can violate it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use shiftwise_core::{CoverUpId, EmployeeId, ShiftId, Timestamp};

// ─── State ───────────────────────────────────────────────────────────

/// Lifecycle state of a cover-up posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverUpState {
    /// Posted and available to claim.
    Open,
    /// Taken by an employee (terminal).
    Claimed,
    /// Withdrawn by an administrator (terminal).
    Cancelled,
}

impl CoverUpState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }

    /// The stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Claimed => "claimed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "claimed" => Some(Self::Claimed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for CoverUpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from cover-up transitions and loading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoverUpError {
    /// The posting is not open; someone else claimed it or it was cancelled.
    #[error("{id} is not claimable (currently {current})")]
    NotClaimable {
        /// The posting.
        id: CoverUpId,
        /// Its state at the time of the attempt.
        current: CoverUpState,
    },

    /// Stored fields violate the claimant invariant.
    #[error("{id} is inconsistent: {reason}")]
    Inconsistent {
        /// The posting.
        id: CoverUpId,
        /// Which invariant failed.
        reason: String,
    },
}

// ─── Record ──────────────────────────────────────────────────────────

/// Raw fields of a cover-up, as stored or transmitted.
///
/// Converting into [`CoverUp`] validates the claimant invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverUpParts {
    pub id: CoverUpId,
    pub shift_id: ShiftId,
    pub posted_by: EmployeeId,
    pub state: CoverUpState,
    pub claimed_by: Option<EmployeeId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A cover-up posting in the claim ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CoverUpParts")]
pub struct CoverUp {
    id: CoverUpId,
    shift_id: ShiftId,
    posted_by: EmployeeId,
    state: CoverUpState,
    claimed_by: Option<EmployeeId>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl CoverUp {
    /// Post a shift for cover. The new posting is `Open`.
    pub fn open(shift_id: ShiftId, posted_by: EmployeeId) -> Self {
        let now = Timestamp::now();
        Self {
            id: CoverUpId::new(),
            shift_id,
            posted_by,
            state: CoverUpState::Open,
            claimed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a posting from stored fields, checking the claimant invariant.
    pub fn from_parts(parts: CoverUpParts) -> Result<Self, CoverUpError> {
        match (parts.state, parts.claimed_by) {
            (CoverUpState::Claimed, None) => Err(CoverUpError::Inconsistent {
                id: parts.id,
                reason: "claimed without a claimant".to_string(),
            }),
            (CoverUpState::Open | CoverUpState::Cancelled, Some(_)) => {
                Err(CoverUpError::Inconsistent {
                    id: parts.id,
                    reason: format!("claimant recorded while {}", parts.state),
                })
            }
            _ => Ok(Self {
                id: parts.id,
                shift_id: parts.shift_id,
                posted_by: parts.posted_by,
                state: parts.state,
                claimed_by: parts.claimed_by,
                created_at: parts.created_at,
                updated_at: parts.updated_at,
            }),
        }
    }

    /// Claim the posting (OPEN → CLAIMED).
    pub fn claim(&mut self, claimant: EmployeeId) -> Result<(), CoverUpError> {
        self.require_open()?;
        self.state = CoverUpState::Claimed;
        self.claimed_by = Some(claimant);
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Withdraw the posting (OPEN → CANCELLED).
    pub fn cancel(&mut self) -> Result<(), CoverUpError> {
        self.require_open()?;
        self.state = CoverUpState::Cancelled;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    fn require_open(&self) -> Result<(), CoverUpError> {
        if self.state != CoverUpState::Open {
            return Err(CoverUpError::NotClaimable {
                id: self.id,
                current: self.state,
            });
        }
        Ok(())
    }

    pub fn id(&self) -> CoverUpId {
        self.id
    }

    pub fn shift_id(&self) -> ShiftId {
        self.shift_id
    }

    pub fn posted_by(&self) -> EmployeeId {
        self.posted_by
    }

    pub fn state(&self) -> CoverUpState {
        self.state
    }

    pub fn claimed_by(&self) -> Option<EmployeeId> {
        self.claimed_by
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Whether the posting can still be claimed.
    pub fn is_open(&self) -> bool {
        self.state == CoverUpState::Open
    }

    /// Copy out the raw fields.
    pub fn to_parts(&self) -> CoverUpParts {
        CoverUpParts {
            id: self.id,
            shift_id: self.shift_id,
            posted_by: self.posted_by,
            state: self.state,
            claimed_by: self.claimed_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl TryFrom<CoverUpParts> for CoverUp {
    type Error = CoverUpError;

    fn try_from(parts: CoverUpParts) -> Result<Self, Self::Error> {
        Self::from_parts(parts)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
