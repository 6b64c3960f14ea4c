//! # Shift Swap Proposals
//!
//! A requester proposes exchanging their shift with a partner's shift. A
//! neutral approver (neither requester nor partner) decides once.
//!
//! Approval here only seals the proposal. Exchanging the `employee` on the
//! two shifts is done by the arbitrator in the same atomic unit as the seal.

use serde::{Deserialize, Serialize};

use shiftwise_core::{EmployeeId, ShiftId, SwapId, Timestamp, ValidationError};

use crate::decision::{Decision, DecisionError, DecisionState, Ruling};

/// Maximum length of the free-text reason.
pub const MAX_REASON_LEN: usize = 2_000;

/// Raw fields of a swap proposal, as stored or transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParts {
    pub id: SwapId,
    pub requester: EmployeeId,
    pub partner: EmployeeId,
    pub requester_shift: ShiftId,
    pub partner_shift: ShiftId,
    pub reason: String,
    pub state: DecisionState,
    pub decided_by: Option<EmployeeId>,
    pub decided_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// A proposal to exchange two shifts between two employees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SwapParts")]
pub struct SwapProposal {
    id: SwapId,
    requester: EmployeeId,
    partner: EmployeeId,
    requester_shift: ShiftId,
    partner_shift: ShiftId,
    reason: String,
    #[serde(flatten)]
    ruling: Ruling,
    created_at: Timestamp,
}

impl SwapProposal {
    /// Create a pending proposal.
    ///
    /// Rejects a proposal with oneself, a swap of a shift with itself, and
    /// reasons longer than [`MAX_REASON_LEN`]. The reason may be empty.
    pub fn propose(
        requester: EmployeeId,
        partner: EmployeeId,
        requester_shift: ShiftId,
        partner_shift: ShiftId,
        reason: String,
    ) -> Result<Self, ValidationError> {
        if requester == partner {
            return Err(ValidationError::Invalid {
                field: "partner",
                reason: "cannot swap with yourself".to_string(),
            });
        }
        if requester_shift == partner_shift {
            return Err(ValidationError::Invalid {
                field: "partner_shift",
                reason: "must differ from requester_shift".to_string(),
            });
        }
        if reason.chars().count() > MAX_REASON_LEN {
            return Err(ValidationError::TooLong {
                field: "reason",
                max: MAX_REASON_LEN,
            });
        }
        Ok(Self {
            id: SwapId::new(),
            requester,
            partner,
            requester_shift,
            partner_shift,
            reason,
            ruling: Ruling::pending(),
            created_at: Timestamp::now(),
        })
    }

    /// Rebuild from stored fields, validating the ruling invariant.
    pub fn from_parts(parts: SwapParts) -> Result<Self, DecisionError> {
        let ruling =
            Ruling::from_parts(&parts.id, parts.state, parts.decided_by, parts.decided_at)?;
        Ok(Self {
            id: parts.id,
            requester: parts.requester,
            partner: parts.partner,
            requester_shift: parts.requester_shift,
            partner_shift: parts.partner_shift,
            reason: parts.reason,
            ruling,
            created_at: parts.created_at,
        })
    }

    /// Seal the decision.
    ///
    /// Fails with `PartyCannotDecide` if the approver is the requester or
    /// the partner, and with `AlreadyDecided` if already sealed.
    pub fn decide(&mut self, decision: Decision, approver: EmployeeId) -> Result<(), DecisionError> {
        if self.involves(approver) {
            return Err(DecisionError::PartyCannotDecide {
                subject: self.id.to_string(),
                approver,
            });
        }
        self.ruling.decide(&self.id, decision, approver)
    }

    /// Whether `employee` is the requester or the partner.
    pub fn involves(&self, employee: EmployeeId) -> bool {
        self.requester == employee || self.partner == employee
    }

    pub fn id(&self) -> SwapId {
        self.id
    }

    pub fn requester(&self) -> EmployeeId {
        self.requester
    }

    pub fn partner(&self) -> EmployeeId {
        self.partner
    }

    pub fn requester_shift(&self) -> ShiftId {
        self.requester_shift
    }

    pub fn partner_shift(&self) -> ShiftId {
        self.partner_shift
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

    /// Copy out the raw fields.
    pub fn to_parts(&self) -> SwapParts {
        SwapParts {
            id: self.id,
            requester: self.requester,
            partner: self.partner,
            requester_shift: self.requester_shift,
            partner_shift: self.partner_shift,
            reason: self.reason.clone(),
            state: self.ruling.state(),
            decided_by: self.ruling.decided_by(),
            decided_at: self.ruling.decided_at(),
            created_at: self.created_at,
        }
    }
}

impl TryFrom<SwapParts> for SwapProposal {
    type Error = DecisionError;

    fn try_from(parts: SwapParts) -> Result<Self, Self::Error> {
        Self::from_parts(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal() -> SwapProposal {
        SwapProposal::propose(
            EmployeeId::new(),
            EmployeeId::new(),
            ShiftId::new(),
            ShiftId::new(),
            "family event".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_proposal_is_pending() {
        let p = proposal();
        assert_eq!(p.state(), DecisionState::Pending);
        assert!(p.ruling().decided_by().is_none());
    }

    #[test]
    fn test_cannot_swap_with_self() {
        let me = EmployeeId::new();
        let err = SwapProposal::propose(me, me, ShiftId::new(), ShiftId::new(), String::new())
            .unwrap_err();
        assert!(matches!(err, ValidationError::Invalid { field: "partner", .. }));
    }

    #[test]
    fn test_cannot_swap_shift_with_itself() {
        let shift = ShiftId::new();
        assert!(SwapProposal::propose(
            EmployeeId::new(),
            EmployeeId::new(),
            shift,
            shift,
            String::new()
        )
        .is_err());
    }

    #[test]
    fn test_overlong_reason_rejected() {
        let reason = "x".repeat(MAX_REASON_LEN + 1);
        assert!(SwapProposal::propose(
            EmployeeId::new(),
            EmployeeId::new(),
            ShiftId::new(),
            ShiftId::new(),
            reason
        )
        .is_err());
    }

    #[test]
    fn test_parties_cannot_decide() {
        let mut p = proposal();
        let requester = p.requester();
        let partner = p.partner();
        assert!(matches!(
            p.decide(Decision::Approve, requester),
            Err(DecisionError::PartyCannotDecide { .. })
        ));
        assert!(matches!(
            p.decide(Decision::Reject, partner),
            Err(DecisionError::PartyCannotDecide { .. })
        ));
        assert_eq!(p.state(), DecisionState::Pending);
    }

    #[test]
    fn test_reject_then_approve_fails() {
        let mut p = proposal();
        p.decide(Decision::Reject, EmployeeId::new()).unwrap();
        let err = p.decide(Decision::Approve, EmployeeId::new()).unwrap_err();
        assert!(matches!(
            err,
            DecisionError::AlreadyDecided {
                current: DecisionState::Rejected,
                ..
            }
        ));
        assert_eq!(p.state(), DecisionState::Rejected);
    }

    #[test]
    fn test_serialized_form_is_flat() {
        let mut p = proposal();
        let approver = EmployeeId::new();
        p.decide(Decision::Approve, approver).unwrap();
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["state"], "approved");
        assert_eq!(json["decided_by"], serde_json::json!(approver));
        assert!(json.get("ruling").is_none());

        let parsed: SwapProposal = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, p);
    }

    #[test]
    fn test_parts_roundtrip_validates() {
        let p = proposal();
        let mut parts = p.to_parts();
        assert_eq!(SwapProposal::from_parts(parts.clone()).unwrap(), p);

        parts.state = DecisionState::Approved;
        assert!(SwapProposal::from_parts(parts).is_err());
    }
}
