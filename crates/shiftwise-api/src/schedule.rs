//! # Schedule
//!
//! Owns shifts: creation, status changes, and the paired reassignment the
//! swap arbitrator performs on approval.
//!
//! Shifts are served from memory and written through to Postgres. On swap
//! approval with a database, the exchange is written inside the
//! arbitrator's transaction and mirrored here after commit.

use std::time::Duration;

use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use shiftwise_core::{EmployeeId, ShiftId, Timestamp};
use shiftwise_state::{ShiftStatus, ShiftStatusError};

use crate::notify::Notifier;
use crate::state::{LockTimeout, NotificationKind, ShiftRecord, Store};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors from shift operations.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("{0} not found")]
    NotFound(ShiftId),

    #[error("{shift} is not assigned to {employee}")]
    NotAssigned { shift: ShiftId, employee: EmployeeId },

    #[error(transparent)]
    Transition(#[from] ShiftStatusError),

    #[error("timed out waiting for the lock on {0}")]
    Busy(ShiftId),

    /// The stored row moved on since this process last saw it.
    #[error("{0} was changed by another writer")]
    Stale(ShiftId),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Why a paired reassignment did not happen.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("{0} not found")]
    Missing(ShiftId),

    /// One of the shifts is no longer held by the expected employee.
    #[error("{0} changed hands since the swap was proposed")]
    Stale(ShiftId),

    #[error("timed out waiting for the schedule lock")]
    Busy,
}

impl From<LockTimeout> for ExchangeError {
    fn from(_: LockTimeout) -> Self {
        Self::Busy
    }
}

/// The schedule collaborator shared by routes, ledger and arbitrator.
#[derive(Debug, Clone)]
pub struct Schedule {
    shifts: Store<ShiftId, ShiftRecord>,
    pool: Option<PgPool>,
    notifier: Notifier,
    lock_timeout: Duration,
}

impl Schedule {
    pub fn new(pool: Option<PgPool>, notifier: Notifier) -> Self {
        Self {
            shifts: Store::new(),
            pool,
            notifier,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Longest a status change waits for the shift's lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Persist and publish a new shift, notifying its employee.
    pub async fn create(&self, record: ShiftRecord) -> Result<ShiftRecord, ScheduleError> {
        if let Some(pool) = &self.pool {
            crate::db::shifts::insert(pool, &record).await?;
        }
        self.shifts.insert(record.id, record.clone());
        tracing::info!(shift_id = %record.id, employee_id = %record.employee_id, date = %record.date, "shift created");
        self.notifier.emit(
            record.employee_id,
            NotificationKind::Shift,
            format!(
                "You have been scheduled on {} from {} to {} at {}",
                record.date, record.start_time, record.end_time, record.location
            ),
        );
        Ok(record)
    }

    pub fn get(&self, id: ShiftId) -> Option<ShiftRecord> {
        self.shifts.get(&id)
    }

    /// All shifts ordered by date and start time.
    pub fn list(&self) -> Vec<ShiftRecord> {
        sorted(self.shifts.list())
    }

    /// Shifts assigned to `employee`, ordered by date and start time.
    pub fn for_employee(&self, employee: EmployeeId) -> Vec<ShiftRecord> {
        sorted(self.shifts.filter(|s| s.employee_id == employee))
    }

    /// The assigned employee acknowledges their shift.
    pub async fn confirm_by_employee(
        &self,
        id: ShiftId,
        employee: EmployeeId,
    ) -> Result<ShiftRecord, ScheduleError> {
        self.transition(id, |shift| {
            if shift.employee_id != employee {
                return Err(ScheduleError::NotAssigned {
                    shift: id,
                    employee,
                });
            }
            Ok(shift.status.confirm_by_employee()?)
        })
        .await
    }

    /// An administrator confirms or cancels a shift.
    pub async fn set_status(
        &self,
        id: ShiftId,
        to: ShiftStatus,
    ) -> Result<ShiftRecord, ScheduleError> {
        let updated = self
            .transition(id, |shift| Ok(shift.status.set_by_admin(to)?))
            .await?;
        self.notifier.emit(
            updated.employee_id,
            NotificationKind::Shift,
            format!("Your shift on {} is now {}", updated.date, updated.status),
        );
        Ok(updated)
    }

    /// Change one shift's status in memory, then write it through.
    ///
    /// The database row is only updated from the status this process saw.
    /// If the write fails or finds the row moved on, the in-memory change is
    /// undone and, in the latter case, the stored row is adopted.
    async fn transition(
        &self,
        id: ShiftId,
        next: impl FnOnce(&ShiftRecord) -> Result<ShiftStatus, ScheduleError>,
    ) -> Result<ShiftRecord, ScheduleError> {
        let (before, updated) = self
            .shifts
            .try_update_within(&id, self.lock_timeout, |shift| {
                let before = shift.clone();
                shift.status = next(shift)?;
                shift.updated_at = Timestamp::now();
                Ok::<_, ScheduleError>((before, shift.clone()))
            })
            .map_err(|_: LockTimeout| ScheduleError::Busy(id))?
            .ok_or(ScheduleError::NotFound(id))??;

        if let Some(pool) = &self.pool {
            match crate::db::shifts::update_status(pool, &updated, before.status).await {
                Ok(true) => {}
                Ok(false) => {
                    self.shifts.restore(&id, &updated, before);
                    self.adopt_stored(pool, id).await;
                    tracing::debug!(shift_id = %id, "shift status changed elsewhere");
                    return Err(ScheduleError::Stale(id));
                }
                Err(e) => {
                    self.shifts.restore(&id, &updated, before);
                    tracing::error!(shift_id = %id, error = %e, "failed to persist shift status");
                    return Err(e.into());
                }
            }
        }
        tracing::info!(shift_id = %id, status = %updated.status, "shift status changed");
        Ok(updated)
    }

    /// Replace the in-memory copy of `id` with the stored row.
    async fn adopt_stored(&self, pool: &PgPool, id: ShiftId) {
        match crate::db::shifts::get(pool, id).await {
            Ok(Some(stored)) => {
                self.shifts.insert(id, stored);
            }
            Ok(None) => {
                self.shifts.remove(&id);
            }
            Err(e) => tracing::warn!(shift_id = %id, error = %e, "failed to reload shift"),
        }
    }

    /// Exchange the employees of two shifts in memory, atomically.
    ///
    /// Both shifts must still be held by `owner_a` and `owner_b`
    /// respectively; otherwise nothing changes.
    pub fn exchange(
        &self,
        a: ShiftId,
        b: ShiftId,
        owner_a: EmployeeId,
        owner_b: EmployeeId,
        timeout: Duration,
    ) -> Result<(), ExchangeError> {
        let exchanged = self.shifts.try_update_pair_within(&a, &b, timeout, |shift_a, shift_b| {
            for shift in [&*shift_a, &*shift_b] {
                let expected = if shift.id == a { owner_a } else { owner_b };
                if shift.employee_id != expected {
                    return Err(ExchangeError::Stale(shift.id));
                }
            }
            let now = Timestamp::now();
            shift_a.employee_id = owner_b;
            shift_a.updated_at = now;
            shift_b.employee_id = owner_a;
            shift_b.updated_at = now;
            Ok(())
        })?;
        match exchanged {
            Some(result) => result,
            None if a == b => Err(ExchangeError::Stale(a)),
            None if self.shifts.contains(&a) => Err(ExchangeError::Missing(b)),
            None => Err(ExchangeError::Missing(a)),
        }
    }

    /// Exchange the employees of two shifts inside an open transaction.
    ///
    /// Returns `false` (and changes nothing) unless both rows still have the
    /// expected owners.
    pub async fn exchange_in(
        conn: &mut PgConnection,
        a: ShiftId,
        b: ShiftId,
        owner_a: EmployeeId,
        owner_b: EmployeeId,
    ) -> Result<bool, sqlx::Error> {
        crate::db::shifts::exchange(conn, a, b, owner_a, owner_b, Timestamp::now()).await
    }

    /// Mirror an exchange already committed to Postgres.
    pub fn mirror_exchange(&self, a: ShiftId, b: ShiftId, owner_a: EmployeeId, owner_b: EmployeeId) {
        let now = Timestamp::now();
        for (id, new_owner) in [(a, owner_b), (b, owner_a)] {
            self.shifts.update(&id, |shift| {
                shift.employee_id = new_owner;
                shift.updated_at = now;
            });
        }
    }

    /// Load persisted shifts. Returns how many were loaded.
    pub async fn hydrate(&self, pool: &PgPool) -> Result<usize, sqlx::Error> {
        let records = crate::db::shifts::load_all(pool).await?;
        let count = records.len();
        for record in records {
            self.shifts.insert(record.id, record);
        }
        Ok(count)
    }
}

fn sorted(mut shifts: Vec<ShiftRecord>) -> Vec<ShiftRecord> {
    shifts.sort_by(|a, b| (a.date, a.start_time).cmp(&(b.date, b.start_time)));
    shifts
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    pub(crate) fn shift_for(employee: EmployeeId, day: u32) -> ShiftRecord {
        let now = Timestamp::now();
        ShiftRecord {
            id: ShiftId::new(),
            employee_id: employee,
            date: NaiveDate::from_ymd_opt(2026, 5, day).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            location: "Front desk".to_string(),
            status: ShiftStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// A pool whose every acquire fails.
    pub(crate) fn unreachable_pool() -> PgPool {
        sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(250))
            .connect_lazy("postgres://shiftwise@127.0.0.1:1/shiftwise")
            .unwrap()
    }

    fn schedule() -> (Schedule, Notifier) {
        let notifier = Notifier::new(None);
        (Schedule::new(None, notifier.clone()), notifier)
    }

    const WAIT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn create_notifies_employee() {
        let (schedule, notifier) = schedule();
        let alice = EmployeeId::new();
        let shift = schedule.create(shift_for(alice, 4)).await.unwrap();
        assert_eq!(schedule.get(shift.id), Some(shift));
        let inbox = notifier.for_recipient(alice);
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::Shift);
    }

    #[tokio::test]
    async fn listings_are_ordered_by_date() {
        let (schedule, _) = schedule();
        let alice = EmployeeId::new();
        schedule.create(shift_for(alice, 9)).await.unwrap();
        schedule.create(shift_for(alice, 2)).await.unwrap();
        schedule.create(shift_for(EmployeeId::new(), 5)).await.unwrap();

        let days: Vec<u32> = schedule
            .for_employee(alice)
            .iter()
            .map(|s| chrono::Datelike::day(&s.date))
            .collect();
        assert_eq!(days, vec![2, 9]);
        assert_eq!(schedule.list().len(), 3);
    }

    #[tokio::test]
    async fn only_assignee_confirms() {
        let (schedule, _) = schedule();
        let alice = EmployeeId::new();
        let shift = schedule.create(shift_for(alice, 4)).await.unwrap();

        let err = schedule
            .confirm_by_employee(shift.id, EmployeeId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::NotAssigned { .. }));

        let confirmed = schedule.confirm_by_employee(shift.id, alice).await.unwrap();
        assert_eq!(confirmed.status, ShiftStatus::EmployeeConfirmed);

        let again = schedule.confirm_by_employee(shift.id, alice).await.unwrap_err();
        assert!(matches!(again, ScheduleError::Transition(_)));
    }

    #[tokio::test]
    async fn cancelled_shift_cannot_be_confirmed() {
        let (schedule, _) = schedule();
        let shift = schedule.create(shift_for(EmployeeId::new(), 4)).await.unwrap();
        schedule
            .set_status(shift.id, ShiftStatus::Cancelled)
            .await
            .unwrap();
        assert!(schedule
            .set_status(shift.id, ShiftStatus::Confirmed)
            .await
            .is_err());
        assert_eq!(schedule.get(shift.id).unwrap().status, ShiftStatus::Cancelled);
    }

    #[tokio::test]
    async fn exchange_swaps_owners() {
        let (schedule, _) = schedule();
        let (alice, bob) = (EmployeeId::new(), EmployeeId::new());
        let a = schedule.create(shift_for(alice, 1)).await.unwrap();
        let b = schedule.create(shift_for(bob, 2)).await.unwrap();

        schedule.exchange(a.id, b.id, alice, bob, WAIT).unwrap();
        assert_eq!(schedule.get(a.id).unwrap().employee_id, bob);
        assert_eq!(schedule.get(b.id).unwrap().employee_id, alice);
    }

    #[tokio::test]
    async fn stale_exchange_changes_nothing() {
        let (schedule, _) = schedule();
        let (alice, bob) = (EmployeeId::new(), EmployeeId::new());
        let a = schedule.create(shift_for(alice, 1)).await.unwrap();
        let b = schedule.create(shift_for(bob, 2)).await.unwrap();

        let err = schedule
            .exchange(a.id, b.id, alice, EmployeeId::new(), WAIT)
            .unwrap_err();
        assert_eq!(err, ExchangeError::Stale(b.id));
        assert_eq!(schedule.get(a.id).unwrap().employee_id, alice);
        assert_eq!(schedule.get(b.id).unwrap().employee_id, bob);

        let missing = ShiftId::new();
        assert_eq!(
            schedule.exchange(a.id, missing, alice, bob, WAIT),
            Err(ExchangeError::Missing(missing))
        );
    }

    #[tokio::test]
    async fn failed_status_write_keeps_previous_status() {
        let notifier = Notifier::new(None);
        let schedule = Schedule::new(Some(unreachable_pool()), notifier.clone());
        let shift = shift_for(EmployeeId::new(), 4);
        schedule.shifts.insert(shift.id, shift.clone());

        let err = schedule
            .set_status(shift.id, ShiftStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Storage(_)));
        assert_eq!(schedule.get(shift.id), Some(shift.clone()));
        assert!(notifier.for_recipient(shift.employee_id).is_empty());

        let err = schedule
            .confirm_by_employee(shift.id, shift.employee_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Storage(_)));
        assert_eq!(schedule.get(shift.id).unwrap().status, ShiftStatus::Pending);
    }

    #[tokio::test]
    async fn status_change_waits_only_for_its_own_shift() {
        let (schedule, _) = schedule();
        let schedule = schedule.with_lock_timeout(Duration::from_millis(10));
        let busy = schedule.create(shift_for(EmployeeId::new(), 4)).await.unwrap();
        let free = schedule.create(shift_for(EmployeeId::new(), 5)).await.unwrap();

        let slot = schedule.shifts.slot(&busy.id).unwrap();
        let held = slot.lock();
        let err = schedule
            .set_status(busy.id, ShiftStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Busy(id) if id == busy.id));
        let confirmed = schedule
            .set_status(free.id, ShiftStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, ShiftStatus::Confirmed);
        drop(held);
    }

    #[tokio::test]
    async fn exchange_in_either_key_order() {
        let (schedule, _) = schedule();
        let (alice, bob) = (EmployeeId::new(), EmployeeId::new());
        let a = schedule.create(shift_for(alice, 1)).await.unwrap();
        let b = schedule.create(shift_for(bob, 2)).await.unwrap();

        schedule.exchange(b.id, a.id, bob, alice, WAIT).unwrap();
        assert_eq!(schedule.get(a.id).unwrap().employee_id, bob);
        assert_eq!(schedule.get(b.id).unwrap().employee_id, alice);
        assert_eq!(
            schedule.exchange(a.id, a.id, bob, bob, WAIT),
            Err(ExchangeError::Stale(a.id))
        );
    }
}
