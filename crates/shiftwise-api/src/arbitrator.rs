//! # Swap Arbitrator
//!
//! Shift swap proposals and their exactly-once decision.
//!
//! Approval seals the proposal and exchanges the two shifts' employees as one
//! unit. In memory the proposal's own lock is taken first and the two
//! shifts' locks second, all with a timeout; nothing takes them in the
//! other order. In Postgres the conditional `UPDATE` on the
//! proposal and the exchange on `shifts` share one transaction; if either
//! shift changed hands since the proposal was made, the transaction rolls
//! back and the proposal stays pending.

use sqlx::PgPool;
use thiserror::Error;

use shiftwise_core::{EmployeeId, ShiftId, SwapId, ValidationError};
use shiftwise_state::{Decision, DecisionError, DecisionState, SwapProposal};

use crate::concurrency::{is_busy_sqlx, Contended, RetryPolicy};
use crate::db::Conditional;
use crate::notify::Notifier;
use crate::schedule::{ExchangeError, Schedule};
use crate::state::{LockTimeout, NotificationKind, Store};

/// Errors from arbitrator operations.
#[derive(Error, Debug)]
pub enum ArbitrationError {
    #[error("{0} not found")]
    NotFound(SwapId),

    #[error("{id} was already {current}")]
    AlreadyDecided { id: SwapId, current: DecisionState },

    #[error("{approver} is a party to {id} and cannot decide it")]
    PartyCannotDecide { id: SwapId, approver: EmployeeId },

    /// A shift no longer belongs to the employee named in the proposal.
    #[error("the shifts in {id} changed hands since it was proposed")]
    StaleAssignment { id: SwapId },

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("timed out waiting for the lock on {id} during {operation}")]
    Busy { operation: &'static str, id: SwapId },

    #[error("stored swap proposal is invalid: {0}")]
    Corrupt(DecisionError),

    #[error("storage error: {0}")]
    Storage(sqlx::Error),
}

impl ArbitrationError {
    fn storage(operation: &'static str, id: SwapId, err: sqlx::Error) -> Self {
        if is_busy_sqlx(&err) {
            Self::Busy { operation, id }
        } else {
            Self::Storage(err)
        }
    }

    fn from_decision(id: SwapId, err: DecisionError) -> Self {
        match err {
            DecisionError::AlreadyDecided { current, .. } => Self::AlreadyDecided { id, current },
            DecisionError::PartyCannotDecide { approver, .. } => {
                Self::PartyCannotDecide { id, approver }
            }
            inconsistent @ DecisionError::Inconsistent { .. } => Self::Corrupt(inconsistent),
        }
    }
}

impl Contended for ArbitrationError {
    fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

#[derive(Debug, Clone)]
enum Backend {
    Memory(Store<SwapId, SwapProposal>),
    Postgres(PgPool),
}

/// The swap arbitrator.
#[derive(Debug, Clone)]
pub struct SwapArbitrator {
    backend: Backend,
    schedule: Schedule,
    notifier: Notifier,
    retry: RetryPolicy,
}

impl SwapArbitrator {
    /// A Postgres-backed arbitrator when `pool` is present, in-memory otherwise.
    pub fn new(
        pool: Option<PgPool>,
        schedule: Schedule,
        notifier: Notifier,
        retry: RetryPolicy,
    ) -> Self {
        let backend = match pool {
            Some(pool) => Backend::Postgres(pool),
            None => Backend::Memory(Store::new()),
        };
        Self {
            backend,
            schedule,
            notifier,
            retry,
        }
    }

    /// Propose exchanging `requester_shift` (held by `requester`) with
    /// `partner_shift` (held by `partner`).
    pub async fn propose(
        &self,
        requester: EmployeeId,
        partner: EmployeeId,
        requester_shift: ShiftId,
        partner_shift: ShiftId,
        reason: String,
    ) -> Result<SwapProposal, ArbitrationError> {
        let proposal =
            SwapProposal::propose(requester, partner, requester_shift, partner_shift, reason)?;
        self.check_holder("requester_shift", requester_shift, requester)?;
        self.check_holder("partner_shift", partner_shift, partner)?;

        match &self.backend {
            Backend::Memory(store) => {
                store.insert(proposal.id(), proposal.clone());
            }
            Backend::Postgres(pool) => crate::db::swaps::insert(pool, &proposal)
                .await
                .map_err(ArbitrationError::Storage)?,
        }
        tracing::info!(swap_id = %proposal.id(), %requester, %partner, "swap proposed");
        self.notifier.emit(
            partner,
            NotificationKind::Swap,
            format!("{requester} asked to swap {requester_shift} for your {partner_shift}"),
        );
        Ok(proposal)
    }

    fn check_holder(
        &self,
        field: &'static str,
        shift_id: ShiftId,
        holder: EmployeeId,
    ) -> Result<(), ValidationError> {
        match self.schedule.get(shift_id) {
            None => Err(ValidationError::Invalid {
                field,
                reason: format!("{shift_id} does not exist"),
            }),
            Some(shift) if shift.employee_id != holder => Err(ValidationError::Invalid {
                field,
                reason: format!("{shift_id} is not assigned to {holder}"),
            }),
            Some(_) => Ok(()),
        }
    }

    /// All proposals, newest first.
    pub async fn list(&self) -> Result<Vec<SwapProposal>, ArbitrationError> {
        match &self.backend {
            Backend::Memory(store) => Ok(newest_first(store.list())),
            Backend::Postgres(pool) => crate::db::swaps::list(pool, None)
                .await
                .map_err(ArbitrationError::Storage),
        }
    }

    /// Proposals where `employee` is requester or partner, newest first.
    pub async fn list_for(&self, employee: EmployeeId) -> Result<Vec<SwapProposal>, ArbitrationError> {
        match &self.backend {
            Backend::Memory(store) => Ok(newest_first(store.filter(|p| p.involves(employee)))),
            Backend::Postgres(pool) => crate::db::swaps::list(pool, Some(employee))
                .await
                .map_err(ArbitrationError::Storage),
        }
    }

    pub async fn get(&self, id: SwapId) -> Result<SwapProposal, ArbitrationError> {
        let found = match &self.backend {
            Backend::Memory(store) => store.get(&id),
            Backend::Postgres(pool) => crate::db::swaps::get(pool, id)
                .await
                .map_err(ArbitrationError::Storage)?,
        };
        found.ok_or(ArbitrationError::NotFound(id))
    }

    /// Approve or reject a pending proposal. Exactly one concurrent decision wins.
    pub async fn decide(
        &self,
        id: SwapId,
        decision: Decision,
        approver: EmployeeId,
    ) -> Result<SwapProposal, ArbitrationError> {
        let operation = match decision {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        };
        let result = self
            .retry
            .run(operation, || self.try_decide(id, decision, approver))
            .await;

        let outcome = match &result {
            Ok(proposal) => {
                tracing::info!(swap_id = %id, %approver, state = %proposal.state(), "swap decided");
                "ok"
            }
            Err(ArbitrationError::AlreadyDecided { current, .. }) => {
                tracing::debug!(swap_id = %id, operation, %current, "swap already decided");
                "already_decided"
            }
            Err(ArbitrationError::Busy { .. }) => {
                tracing::warn!(swap_id = %id, operation, "swap lock still busy after retries");
                "busy"
            }
            Err(
                e @ (ArbitrationError::Corrupt(_) | ArbitrationError::Storage(_)),
            ) => {
                tracing::error!(swap_id = %id, operation, error = %e, "swap decision failed");
                "error"
            }
            Err(e) => {
                tracing::debug!(swap_id = %id, operation, error = %e, "swap decision refused");
                "refused"
            }
        };
        metrics::counter!("shiftwise_claim_outcomes_total", "operation" => operation, "outcome" => outcome)
            .increment(1);

        let proposal = result?;
        let verdict = proposal.state();
        for party in [proposal.requester(), proposal.partner()] {
            self.notifier.emit(
                party,
                NotificationKind::Swap,
                format!("Swap {} was {verdict}", proposal.id()),
            );
        }
        Ok(proposal)
    }

    async fn try_decide(
        &self,
        id: SwapId,
        decision: Decision,
        approver: EmployeeId,
    ) -> Result<SwapProposal, ArbitrationError> {
        match &self.backend {
            Backend::Memory(store) => self.decide_in_memory(store, id, decision, approver),
            Backend::Postgres(pool) => self.decide_in_postgres(pool, id, decision, approver).await,
        }
    }

    fn decide_in_memory(
        &self,
        store: &Store<SwapId, SwapProposal>,
        id: SwapId,
        decision: Decision,
        approver: EmployeeId,
    ) -> Result<SwapProposal, ArbitrationError> {
        let operation = "decide";
        let timeout = self.retry.lock_timeout;
        store
            .try_update_within(&id, timeout, |proposal| {
                proposal
                    .decide(decision, approver)
                    .map_err(|e| ArbitrationError::from_decision(id, e))?;
                if decision == Decision::Approve {
                    self.schedule
                        .exchange(
                            proposal.requester_shift(),
                            proposal.partner_shift(),
                            proposal.requester(),
                            proposal.partner(),
                            timeout,
                        )
                        .map_err(|e| match e {
                            ExchangeError::Busy => ArbitrationError::Busy { operation, id },
                            ExchangeError::Missing(_) | ExchangeError::Stale(_) => {
                                ArbitrationError::StaleAssignment { id }
                            }
                        })?;
                }
                Ok(proposal.clone())
            })
            .map_err(|_: LockTimeout| ArbitrationError::Busy { operation, id })?
            .ok_or(ArbitrationError::NotFound(id))?
    }

    async fn decide_in_postgres(
        &self,
        pool: &PgPool,
        id: SwapId,
        decision: Decision,
        approver: EmployeeId,
    ) -> Result<SwapProposal, ArbitrationError> {
        let operation = "decide";
        let storage = |e| ArbitrationError::storage(operation, id, e);

        let mut tx = self.retry.begin(pool).await.map_err(storage)?;
        let decided = crate::db::swaps::decide(&mut *tx, id, decision.outcome(), approver)
            .await
            .map_err(storage)?;
        let proposal = match decided {
            Conditional::Applied(proposal) => proposal,
            Conditional::Missing => return Err(ArbitrationError::NotFound(id)),
            Conditional::Refused(current) if current.involves(approver) => {
                return Err(ArbitrationError::PartyCannotDecide { id, approver })
            }
            Conditional::Refused(current) => {
                return Err(ArbitrationError::AlreadyDecided {
                    id,
                    current: current.state(),
                })
            }
        };

        if decision == Decision::Approve {
            let exchanged = Schedule::exchange_in(
                &mut *tx,
                proposal.requester_shift(),
                proposal.partner_shift(),
                proposal.requester(),
                proposal.partner(),
            )
            .await
            .map_err(storage)?;
            if !exchanged {
                tx.rollback().await.map_err(storage)?;
                return Err(ArbitrationError::StaleAssignment { id });
            }
        }
        tx.commit().await.map_err(storage)?;

        if decision == Decision::Approve {
            self.schedule.mirror_exchange(
                proposal.requester_shift(),
                proposal.partner_shift(),
                proposal.requester(),
                proposal.partner(),
            );
        }
        Ok(proposal)
    }
}

fn newest_first(mut proposals: Vec<SwapProposal>) -> Vec<SwapProposal> {
    proposals.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    proposals
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::schedule::tests::shift_for;
    use crate::state::AppConfig;

    struct Fixture {
        arbitrator: SwapArbitrator,
        schedule: Schedule,
        notifier: Notifier,
        alice: EmployeeId,
        bob: EmployeeId,
        alice_shift: ShiftId,
        bob_shift: ShiftId,
    }

    async fn fixture() -> Fixture {
        let notifier = Notifier::new(None);
        let schedule = Schedule::new(None, notifier.clone());
        let (alice, bob) = (EmployeeId::new(), EmployeeId::new());
        let alice_shift = schedule.create(shift_for(alice, 6)).await.unwrap().id;
        let bob_shift = schedule.create(shift_for(bob, 7)).await.unwrap().id;
        let arbitrator = SwapArbitrator::new(
            None,
            schedule.clone(),
            notifier.clone(),
            RetryPolicy::from_config(&AppConfig::default()),
        );
        Fixture {
            arbitrator,
            schedule,
            notifier,
            alice,
            bob,
            alice_shift,
            bob_shift,
        }
    }

    async fn proposed(f: &Fixture) -> SwapProposal {
        f.arbitrator
            .propose(f.alice, f.bob, f.alice_shift, f.bob_shift, "wedding".into())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn propose_notifies_partner() {
        let f = fixture().await;
        let proposal = proposed(&f).await;
        assert_eq!(proposal.state(), DecisionState::Pending);
        assert!(f
            .notifier
            .for_recipient(f.bob)
            .iter()
            .any(|n| n.kind == NotificationKind::Swap));
    }

    #[tokio::test]
    async fn propose_rejects_shift_not_held_by_party() {
        let f = fixture().await;
        let err = f
            .arbitrator
            .propose(f.alice, f.bob, f.bob_shift, f.alice_shift, String::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ArbitrationError::Invalid(ValidationError::Invalid { field: "requester_shift", .. })
        ));

        let err = f
            .arbitrator
            .propose(f.alice, f.bob, f.alice_shift, ShiftId::new(), String::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ArbitrationError::Invalid(ValidationError::Invalid { field: "partner_shift", .. })
        ));
        assert!(f.arbitrator.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn approval_exchanges_shifts() {
        let f = fixture().await;
        let proposal = proposed(&f).await;
        let approved = f
            .arbitrator
            .decide(proposal.id(), Decision::Approve, EmployeeId::SYSTEM)
            .await
            .unwrap();

        assert_eq!(approved.state(), DecisionState::Approved);
        assert_eq!(approved.ruling().decided_by(), Some(EmployeeId::SYSTEM));
        assert_eq!(f.schedule.get(f.alice_shift).unwrap().employee_id, f.bob);
        assert_eq!(f.schedule.get(f.bob_shift).unwrap().employee_id, f.alice);
    }

    #[tokio::test]
    async fn reject_then_approve_stays_rejected() {
        let f = fixture().await;
        let proposal = proposed(&f).await;
        let manager = EmployeeId::new();

        f.arbitrator
            .decide(proposal.id(), Decision::Reject, manager)
            .await
            .unwrap();
        let err = f
            .arbitrator
            .decide(proposal.id(), Decision::Approve, manager)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ArbitrationError::AlreadyDecided { current: DecisionState::Rejected, .. }
        ));
        assert_eq!(
            f.arbitrator.get(proposal.id()).await.unwrap().state(),
            DecisionState::Rejected
        );
        assert_eq!(f.schedule.get(f.alice_shift).unwrap().employee_id, f.alice);
        assert_eq!(f.schedule.get(f.bob_shift).unwrap().employee_id, f.bob);
    }

    #[tokio::test]
    async fn party_cannot_decide() {
        let f = fixture().await;
        let proposal = proposed(&f).await;
        let err = f
            .arbitrator
            .decide(proposal.id(), Decision::Approve, f.bob)
            .await
            .unwrap_err();
        assert!(matches!(err, ArbitrationError::PartyCannotDecide { .. }));
        assert_eq!(
            f.arbitrator.get(proposal.id()).await.unwrap().state(),
            DecisionState::Pending
        );
    }

    #[tokio::test]
    async fn missing_proposal_is_not_found() {
        let f = fixture().await;
        let err = f
            .arbitrator
            .decide(SwapId::new(), Decision::Reject, EmployeeId::SYSTEM)
            .await
            .unwrap_err();
        assert!(matches!(err, ArbitrationError::NotFound(_)));
    }

    #[tokio::test]
    async fn stale_assignment_leaves_proposal_pending() {
        let f = fixture().await;
        let proposal = proposed(&f).await;
        let carol = EmployeeId::new();
        let carol_shift = f.schedule.create(shift_for(carol, 8)).await.unwrap().id;
        // Bob's shift moves to Carol before the decision.
        f.schedule
            .exchange(f.bob_shift, carol_shift, f.bob, carol, Duration::from_millis(50))
            .unwrap();

        let err = f
            .arbitrator
            .decide(proposal.id(), Decision::Approve, EmployeeId::SYSTEM)
            .await
            .unwrap_err();
        assert!(matches!(err, ArbitrationError::StaleAssignment { .. }));
        assert_eq!(
            f.arbitrator.get(proposal.id()).await.unwrap().state(),
            DecisionState::Pending
        );
        assert_eq!(f.schedule.get(f.alice_shift).unwrap().employee_id, f.alice);
    }

    #[tokio::test]
    async fn held_proposal_blocks_only_its_own_decision() {
        let f = fixture().await;
        let retry = RetryPolicy {
            lock_timeout: Duration::from_millis(5),
            busy_retries: 1,
            busy_backoff: Duration::from_millis(1),
        };
        let arbitrator = SwapArbitrator::new(None, f.schedule.clone(), f.notifier.clone(), retry);
        let carol = EmployeeId::new();
        let carol_shift = f.schedule.create(shift_for(carol, 9)).await.unwrap().id;
        let locked = arbitrator
            .propose(f.alice, f.bob, f.alice_shift, f.bob_shift, String::new())
            .await
            .unwrap();
        let free = arbitrator
            .propose(f.bob, carol, f.bob_shift, carol_shift, String::new())
            .await
            .unwrap();

        let Backend::Memory(store) = &arbitrator.backend else {
            unreachable!("in-memory arbitrator");
        };
        let slot = store.slot(&locked.id()).unwrap();
        let held = slot.lock();

        let err = arbitrator
            .decide(locked.id(), Decision::Approve, EmployeeId::SYSTEM)
            .await
            .unwrap_err();
        assert!(matches!(err, ArbitrationError::Busy { .. }));
        let decided = arbitrator
            .decide(free.id(), Decision::Reject, EmployeeId::SYSTEM)
            .await
            .unwrap();
        assert_eq!(decided.state(), DecisionState::Rejected);

        drop(held);
        assert_eq!(
            arbitrator.get(locked.id()).await.unwrap().state(),
            DecisionState::Pending
        );
    }

    #[tokio::test]
    async fn listings_filter_by_party() {
        let f = fixture().await;
        let proposal = proposed(&f).await;
        assert_eq!(f.arbitrator.list_for(f.alice).await.unwrap(), vec![proposal.clone()]);
        assert_eq!(f.arbitrator.list_for(f.bob).await.unwrap().len(), 1);
        assert!(f.arbitrator.list_for(EmployeeId::new()).await.unwrap().is_empty());
        assert_eq!(f.arbitrator.list().await.unwrap(), vec![proposal]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_decisions_have_exactly_one_winner() {
        let f = fixture().await;
        let proposal = proposed(&f).await;
        let arbitrator = Arc::new(f.arbitrator.clone());

        let tasks: Vec<_> = (0..12)
            .map(|i| {
                let arbitrator = Arc::clone(&arbitrator);
                let decision = if i % 2 == 0 {
                    Decision::Approve
                } else {
                    Decision::Reject
                };
                let id = proposal.id();
                tokio::spawn(async move {
                    (decision, arbitrator.decide(id, decision, EmployeeId::new()).await)
                })
            })
            .collect();

        let mut winners = Vec::new();
        for task in tasks {
            match task.await.unwrap() {
                (decision, Ok(_)) => winners.push(decision),
                (_, Err(ArbitrationError::AlreadyDecided { .. })) => {}
                (_, Err(other)) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners.len(), 1);

        let final_state = f.arbitrator.get(proposal.id()).await.unwrap().state();
        assert_eq!(final_state, winners[0].outcome());
        let alice_shift_owner = f.schedule.get(f.alice_shift).unwrap().employee_id;
        match winners[0] {
            Decision::Approve => assert_eq!(alice_shift_owner, f.bob),
            Decision::Reject => assert_eq!(alice_shift_owner, f.alice),
        }
    }
}
