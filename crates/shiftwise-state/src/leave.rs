//! # Leave Requests
//!
//! An employee asks to be off for one period of one day, optionally at a
//! specific location. An administrator other than the employee decides once.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use shiftwise_core::{EmployeeId, LeaveId, Timestamp, ValidationError};

use crate::decision::{Decision, DecisionError, DecisionState, Ruling};

/// Maximum length of the free-text reason.
pub const MAX_REASON_LEN: usize = 2_000;

/// Maximum length of the location label.
pub const MAX_LOCATION_LEN: usize = 100;

/// The part of the day a leave request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftPeriod {
    Morning,
    Afternoon,
    Night,
}

impl ShiftPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Night => "night",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "morning" => Some(Self::Morning),
            "afternoon" => Some(Self::Afternoon),
            "night" => Some(Self::Night),
            _ => None,
        }
    }
}

impl std::fmt::Display for ShiftPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw fields of a leave request, as stored or transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveParts {
    pub id: LeaveId,
    pub employee_id: EmployeeId,
    pub shift_date: NaiveDate,
    pub shift_period: ShiftPeriod,
    pub location: Option<String>,
    pub reason: String,
    pub state: DecisionState,
    pub decided_by: Option<EmployeeId>,
    pub decided_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// A request for leave on one shift period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LeaveParts")]
pub struct LeaveRequest {
    id: LeaveId,
    employee_id: EmployeeId,
    shift_date: NaiveDate,
    shift_period: ShiftPeriod,
    location: Option<String>,
    reason: String,
    #[serde(flatten)]
    ruling: Ruling,
    created_at: Timestamp,
}

impl LeaveRequest {
    /// Create a pending request. The reason must be non-blank.
    pub fn request(
        employee_id: EmployeeId,
        shift_date: NaiveDate,
        shift_period: ShiftPeriod,
        location: Option<String>,
        reason: String,
    ) -> Result<Self, ValidationError> {
        ValidationError::check_text("reason", &reason, MAX_REASON_LEN)?;
        if let Some(loc) = &location {
            ValidationError::check_text("location", loc, MAX_LOCATION_LEN)?;
        }
        Ok(Self {
            id: LeaveId::new(),
            employee_id,
            shift_date,
            shift_period,
            location,
            reason,
            ruling: Ruling::pending(),
            created_at: Timestamp::now(),
        })
    }

    pub fn from_parts(parts: LeaveParts) -> Result<Self, DecisionError> {
        let ruling =
            Ruling::from_parts(&parts.id, parts.state, parts.decided_by, parts.decided_at)?;
        Ok(Self {
            id: parts.id,
            employee_id: parts.employee_id,
            shift_date: parts.shift_date,
            shift_period: parts.shift_period,
            location: parts.location,
            reason: parts.reason,
            ruling,
            created_at: parts.created_at,
        })
    }

    /// Seal the decision. The requesting employee cannot decide their own leave.
    pub fn decide(&mut self, decision: Decision, approver: EmployeeId) -> Result<(), DecisionError> {
        if approver == self.employee_id {
            return Err(DecisionError::PartyCannotDecide {
                subject: self.id.to_string(),
                approver,
            });
        }
        self.ruling.decide(&self.id, decision, approver)
    }

    /// Whether `other` asks for the same slot as this request.
    pub fn same_slot(&self, other: &LeaveRequest) -> bool {
        self.employee_id == other.employee_id
            && self.shift_date == other.shift_date
            && self.shift_period == other.shift_period
            && self.location == other.location
    }

    pub fn id(&self) -> LeaveId {
        self.id
    }

    pub fn employee_id(&self) -> EmployeeId {
        self.employee_id
    }

    pub fn shift_date(&self) -> NaiveDate {
        self.shift_date
    }

    pub fn shift_period(&self) -> ShiftPeriod {
        self.shift_period
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn state(&self) -> DecisionState {
        self.ruling.state()
    }

    pub fn ruling(&self) -> &Ruling {
        &self.ruling
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn to_parts(&self) -> LeaveParts {
        LeaveParts {
            id: self.id,
            employee_id: self.employee_id,
            shift_date: self.shift_date,
            shift_period: self.shift_period,
            location: self.location.clone(),
            reason: self.reason.clone(),
            state: self.ruling.state(),
            decided_by: self.ruling.decided_by(),
            decided_at: self.ruling.decided_at(),
            created_at: self.created_at,
        }
    }
}

impl TryFrom<LeaveParts> for LeaveRequest {
    type Error = DecisionError;

    fn try_from(parts: LeaveParts) -> Result<Self, Self::Error> {
        Self::from_parts(parts)
    }
}
