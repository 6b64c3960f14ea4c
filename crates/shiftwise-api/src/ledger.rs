//! # Claim Ledger
//!
//! Cover-up postings and the first-claim-wins rule.
//!
//! `claim` and `cancel` are a single check-and-set on one record. In memory
//! that is a closure run under the posting's own lock; in Postgres it is
//! `UPDATE ... WHERE status = 'open' RETURNING ...` inside a transaction
//! with a bounded `lock_timeout`. Either way, of N concurrent claims on an
//! open posting exactly one observes `Open`.

use sqlx::PgPool;
use thiserror::Error;

use shiftwise_core::{CoverUpId, EmployeeId, ShiftId};
use shiftwise_state::{CoverUp, CoverUpError, CoverUpState};

use crate::concurrency::{is_busy_sqlx, Contended, RetryPolicy};
use crate::db::Conditional;
use crate::notify::Notifier;
use crate::schedule::Schedule;
use crate::state::{LockTimeout, NotificationKind, Store};

/// Errors from ledger operations.
#[derive(Error, Debug)]
pub enum ClaimError {
    #[error("{0} not found")]
    NotFound(CoverUpId),

    /// Lost the race, or the posting was never there.
    #[error("{id} is no longer available")]
    NotClaimable {
        id: CoverUpId,
        current: Option<CoverUpState>,
    },

    #[error("{0} not found")]
    ShiftNotFound(ShiftId),

    #[error("timed out waiting for the lock on {id} during {operation}")]
    Busy {
        operation: &'static str,
        id: CoverUpId,
    },

    #[error("stored cover-up is invalid: {0}")]
    Corrupt(CoverUpError),

    #[error("storage error: {0}")]
    Storage(sqlx::Error),
}

impl ClaimError {
    fn storage(operation: &'static str, id: CoverUpId, err: sqlx::Error) -> Self {
        if is_busy_sqlx(&err) {
            Self::Busy { operation, id }
        } else {
            Self::Storage(err)
        }
    }
}

impl Contended for ClaimError {
    fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

impl From<CoverUpError> for ClaimError {
    fn from(err: CoverUpError) -> Self {
        match err {
            CoverUpError::NotClaimable { id, current } => Self::NotClaimable {
                id,
                current: Some(current),
            },
            inconsistent @ CoverUpError::Inconsistent { .. } => Self::Corrupt(inconsistent),
        }
    }
}

#[derive(Debug, Clone)]
enum Backend {
    Memory(Store<CoverUpId, CoverUp>),
    Postgres(PgPool),
}

/// The claim ledger.
#[derive(Debug, Clone)]
pub struct ClaimLedger {
    backend: Backend,
    schedule: Schedule,
    notifier: Notifier,
    retry: RetryPolicy,
}

#[derive(Debug, Clone, Copy)]
enum Transition {
    Claim(EmployeeId),
    Cancel,
}

impl Transition {
    fn operation(self) -> &'static str {
        match self {
            Self::Claim(_) => "claim",
            Self::Cancel => "cancel",
        }
    }

    fn apply(self, unit: &mut CoverUp) -> Result<(), CoverUpError> {
        match self {
            Self::Claim(claimant) => unit.claim(claimant),
            Self::Cancel => unit.cancel(),
        }
    }
}

impl ClaimLedger {
    /// A Postgres-backed ledger when `pool` is present, in-memory otherwise.
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

    /// Open postings, oldest first.
    pub async fn list_open(&self) -> Result<Vec<CoverUp>, ClaimError> {
        match &self.backend {
            Backend::Memory(store) => {
                let mut units = store.filter(CoverUp::is_open);
                units.sort_by_key(|u| (u.created_at(), u.id().0));
                Ok(units)
            }
            Backend::Postgres(pool) => crate::db::cover_ups::list_open(pool)
                .await
                .map_err(ClaimError::Storage),
        }
    }

    /// Every posting, newest first.
    pub async fn list_all(&self) -> Result<Vec<CoverUp>, ClaimError> {
        match &self.backend {
            Backend::Memory(store) => {
                let mut units = store.list();
                units.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
                Ok(units)
            }
            Backend::Postgres(pool) => crate::db::cover_ups::list_all(pool)
                .await
                .map_err(ClaimError::Storage),
        }
    }

    pub async fn get(&self, id: CoverUpId) -> Result<CoverUp, ClaimError> {
        let found = match &self.backend {
            Backend::Memory(store) => store.get(&id),
            Backend::Postgres(pool) => crate::db::cover_ups::get(pool, id)
                .await
                .map_err(ClaimError::Storage)?,
        };
        found.ok_or(ClaimError::NotFound(id))
    }

    /// Post `shift_id` for cover.
    pub async fn open(&self, shift_id: ShiftId, posted_by: EmployeeId) -> Result<CoverUp, ClaimError> {
        if self.schedule.get(shift_id).is_none() {
            return Err(ClaimError::ShiftNotFound(shift_id));
        }
        let unit = CoverUp::open(shift_id, posted_by);
        match &self.backend {
            Backend::Memory(store) => {
                store.insert(unit.id(), unit.clone());
            }
            Backend::Postgres(pool) => crate::db::cover_ups::insert(pool, &unit)
                .await
                .map_err(ClaimError::Storage)?,
        }
        tracing::info!(cover_up_id = %unit.id(), %shift_id, %posted_by, "cover-up opened");
        metrics::counter!("shiftwise_claim_outcomes_total", "operation" => "open", "outcome" => "ok")
            .increment(1);
        Ok(unit)
    }

    /// Claim an open posting. Exactly one concurrent claimant wins.
    pub async fn claim(&self, id: CoverUpId, claimant: EmployeeId) -> Result<CoverUp, ClaimError> {
        let unit = self.seal(id, Transition::Claim(claimant)).await?;
        self.notifier.emit(
            unit.posted_by(),
            NotificationKind::CoverUp,
            format!("Your cover-up for {} was claimed by {}", unit.shift_id(), claimant),
        );
        Ok(unit)
    }

    /// Withdraw an open posting.
    pub async fn cancel(&self, id: CoverUpId, actor: EmployeeId) -> Result<CoverUp, ClaimError> {
        let unit = self.seal(id, Transition::Cancel).await?;
        tracing::info!(cover_up_id = %id, %actor, "cover-up cancelled");
        self.notifier.emit(
            unit.posted_by(),
            NotificationKind::CoverUp,
            format!("Your cover-up for {} was cancelled", unit.shift_id()),
        );
        Ok(unit)
    }

    async fn seal(&self, id: CoverUpId, transition: Transition) -> Result<CoverUp, ClaimError> {
        let operation = transition.operation();
        let result = self
            .retry
            .run(operation, || self.try_seal(id, transition))
            .await;

        let outcome = match &result {
            Ok(unit) => {
                tracing::info!(cover_up_id = %id, operation, state = %unit.state(), "cover-up sealed");
                "ok"
            }
            Err(ClaimError::NotClaimable { current, .. }) => {
                tracing::debug!(cover_up_id = %id, operation, current = ?current, "cover-up not claimable");
                "not_claimable"
            }
            Err(ClaimError::NotFound(_)) => "not_found",
            Err(ClaimError::Busy { .. }) => {
                tracing::warn!(cover_up_id = %id, operation, "cover-up lock still busy after retries");
                "busy"
            }
            Err(e) => {
                tracing::error!(cover_up_id = %id, operation, error = %e, "cover-up transition failed");
                "error"
            }
        };
        metrics::counter!("shiftwise_claim_outcomes_total", "operation" => operation, "outcome" => outcome)
            .increment(1);
        result
    }

    async fn try_seal(&self, id: CoverUpId, transition: Transition) -> Result<CoverUp, ClaimError> {
        let operation = transition.operation();
        let applied = match &self.backend {
            Backend::Memory(store) => store
                .try_update_within(&id, self.retry.lock_timeout, |unit| {
                    transition.apply(unit)?;
                    Ok::<_, CoverUpError>(unit.clone())
                })
                .map_err(|_: LockTimeout| ClaimError::Busy { operation, id })?
                .map(|r| r.map(Conditional::Applied).or_else(refused))
                .unwrap_or(Ok(Conditional::Missing))?,
            Backend::Postgres(pool) => {
                let mut tx = self
                    .retry
                    .begin(pool)
                    .await
                    .map_err(|e| ClaimError::storage(operation, id, e))?;
                let conditional = match transition {
                    Transition::Claim(claimant) => {
                        crate::db::cover_ups::claim(&mut *tx, id, claimant).await
                    }
                    Transition::Cancel => crate::db::cover_ups::cancel(&mut *tx, id).await,
                }
                .map_err(|e| ClaimError::storage(operation, id, e))?;
                tx.commit()
                    .await
                    .map_err(|e| ClaimError::storage(operation, id, e))?;
                conditional
            }
        };

        match applied {
            Conditional::Applied(unit) => Ok(unit),
            Conditional::Refused(current) => Err(ClaimError::NotClaimable {
                id,
                current: Some(current),
            }),
            // A claim on a missing posting reads as a lost race; a cancel is a plain 404.
            Conditional::Missing => match transition {
                Transition::Claim(_) => Err(ClaimError::NotClaimable { id, current: None }),
                Transition::Cancel => Err(ClaimError::NotFound(id)),
            },
        }
    }
}

fn refused(err: CoverUpError) -> Result<Conditional<CoverUp, CoverUpState>, ClaimError> {
    match err {
        CoverUpError::NotClaimable { current, .. } => Ok(Conditional::Refused(current)),
        other => Err(other.into()),
    }
}
