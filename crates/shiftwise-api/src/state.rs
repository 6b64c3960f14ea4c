//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! - **Claim ledger** and **swap arbitrator** own cover-ups and swap
//!   proposals. With a database configured those records live only in
//!   Postgres; without one, in a [`Store`].
//! - **Schedule**, employees, attendance, leave, payroll, announcements,
//!   inquiries and notifications live in in-memory stores, written through
//!   to Postgres when configured and hydrated from it on startup.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use utoipa::ToSchema;

use shiftwise_core::{
    AnnouncementId, AttendanceId, EmployeeId, InquiryId, LeaveId, NotificationId, PayrollRunId,
    ShiftId, Timestamp,
};
use shiftwise_state::{LeaveRequest, ShiftStatus};

use crate::arbitrator::SwapArbitrator;
use crate::auth::Role;
use crate::concurrency::RetryPolicy;
use crate::ledger::ClaimLedger;
use crate::notify::Notifier;
use crate::schedule::Schedule;

// -- Generic In-Memory Store --------------------------------------------------

/// The record lock was not acquired within the allowed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeout;

/// One record behind its own lock.
pub(crate) type Slot<T> = Arc<Mutex<T>>;

/// Thread-safe, cloneable in-memory key-value store with per-record locks.
///
/// The index lock guards only the key-to-slot map and is released before
/// any record lock is taken, so a transition on one record never waits on
/// another. Record locks are `parking_lot` mutexes and are never held
/// across `.await` points.
#[derive(Debug)]
pub struct Store<K, T> {
    index: Arc<RwLock<HashMap<K, Slot<T>>>>,
}

impl<K, T> Clone for Store<K, T> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
        }
    }
}

impl<K: Eq + Hash + Copy, T: Clone> Store<K, T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            index: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The lock cell for `id`.
    pub(crate) fn slot(&self, id: &K) -> Option<Slot<T>> {
        self.index.read().get(id).cloned()
    }

    fn slots(&self) -> Vec<Slot<T>> {
        self.index.read().values().cloned().collect()
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: K, value: T) -> Option<T> {
        let existing = {
            let mut index = self.index.write();
            match index.entry(id) {
                Entry::Occupied(slot) => Arc::clone(slot.get()),
                Entry::Vacant(vacant) => {
                    vacant.insert(Arc::new(Mutex::new(value)));
                    return None;
                }
            }
        };
        let previous = std::mem::replace(&mut *existing.lock(), value);
        Some(previous)
    }

    /// Insert unless an existing record matches `conflicts`, as one step.
    /// Returns whether the record was inserted.
    ///
    /// The index stays write-locked for the scan so no other insert can
    /// slip in between the check and the insert.
    pub fn insert_unless(&self, id: K, value: T, conflicts: impl Fn(&T) -> bool) -> bool {
        let mut index = self.index.write();
        if index.values().any(|slot| conflicts(&slot.lock())) {
            return false;
        }
        index.insert(id, Arc::new(Mutex::new(value)));
        true
    }

    pub fn remove(&self, id: &K) -> Option<T> {
        let slot = self.index.write().remove(id)?;
        let value = slot.lock().clone();
        Some(value)
    }

    pub fn get(&self, id: &K) -> Option<T> {
        self.slot(id).map(|slot| slot.lock().clone())
    }

    pub fn list(&self) -> Vec<T> {
        self.slots().iter().map(|slot| slot.lock().clone()).collect()
    }

    /// List records matching `predicate`.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.slots()
            .iter()
            .filter_map(|slot| {
                let record = slot.lock();
                predicate(&record).then(|| record.clone())
            })
            .collect()
    }

    /// Whether any record matches `predicate`.
    pub fn any(&self, predicate: impl Fn(&T) -> bool) -> bool {
        self.slots().iter().any(|slot| predicate(&slot.lock()))
    }

    /// Update a record in place. Returns the updated record, or `None` if not found.
    pub fn update(&self, id: &K, f: impl FnOnce(&mut T)) -> Option<T> {
        let slot = self.slot(id)?;
        let mut record = slot.lock();
        f(&mut record);
        Some(record.clone())
    }

    /// Atomically read-validate-update one record, waiting at most
    /// `timeout` for its lock.
    ///
    /// The closure runs on a copy which replaces the stored record only on
    /// `Ok`, so a failed check never leaves a partial mutation behind.
    /// Returns `Ok(None)` if the record doesn't exist.
    pub fn try_update_within<R, E>(
        &self,
        id: &K,
        timeout: Duration,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Result<Option<Result<R, E>>, LockTimeout> {
        let Some(slot) = self.slot(id) else {
            return Ok(None);
        };
        let mut record = slot.try_lock_for(timeout).ok_or(LockTimeout)?;
        let mut working = record.clone();
        let result = f(&mut working);
        if result.is_ok() {
            *record = working;
        }
        Ok(Some(result))
    }

    /// [`Store::try_update_within`] over two distinct records at once.
    ///
    /// Locks are taken in key order. Both copies are committed on `Ok` and
    /// neither on `Err`. Returns `Ok(None)` if either record is missing or
    /// `a == b`.
    pub fn try_update_pair_within<R, E>(
        &self,
        a: &K,
        b: &K,
        timeout: Duration,
        f: impl FnOnce(&mut T, &mut T) -> Result<R, E>,
    ) -> Result<Option<Result<R, E>>, LockTimeout>
    where
        K: Ord,
    {
        if a == b {
            return Ok(None);
        }
        let (Some(slot_a), Some(slot_b)) = (self.slot(a), self.slot(b)) else {
            return Ok(None);
        };
        let (first, second) = if a < b {
            (&slot_a, &slot_b)
        } else {
            (&slot_b, &slot_a)
        };
        let mut first = first.try_lock_for(timeout).ok_or(LockTimeout)?;
        let mut second = second.try_lock_for(timeout).ok_or(LockTimeout)?;
        let (record_a, record_b) = if a < b {
            (&mut *first, &mut *second)
        } else {
            (&mut *second, &mut *first)
        };

        let (mut working_a, mut working_b) = (record_a.clone(), record_b.clone());
        let result = f(&mut working_a, &mut working_b);
        if result.is_ok() {
            *record_a = working_a;
            *record_b = working_b;
        }
        Ok(Some(result))
    }

    /// Put `previous` back, but only if the record still equals `expected`.
    ///
    /// Undoes a local change whose write-through failed without clobbering
    /// a later change by someone else. Returns whether it was restored.
    pub fn restore(&self, id: &K, expected: &T, previous: T) -> bool
    where
        T: PartialEq,
    {
        let Some(slot) = self.slot(id) else {
            return false;
        };
        let mut record = slot.lock();
        if *record != *expected {
            return false;
        }
        *record = previous;
        true
    }

    pub fn contains(&self, id: &K) -> bool {
        self.index.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Copy, T: Clone> Default for Store<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Record Types -------------------------------------------------------------

/// An employee account with payroll settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EmployeeRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: EmployeeId,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub role: Role,
    /// Pay for a standard 40-hour week, in cents.
    pub weekly_base_salary_cents: i64,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
}

/// A scheduled shift assigned to one employee.
///
/// `end_time` earlier than `start_time` means the shift runs past midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShiftRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: ShiftId,
    #[schema(value_type = String, format = Uuid)]
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "17:00:00")]
    pub end_time: NaiveTime,
    pub location: String,
    #[schema(value_type = String, example = "pending")]
    pub status: ShiftStatus,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: Timestamp,
}

/// One clock-in, and once completed, its clock-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: AttendanceId,
    #[schema(value_type = String, format = Uuid)]
    pub shift_id: ShiftId,
    #[schema(value_type = String, format = Uuid)]
    pub employee_id: EmployeeId,
    #[schema(value_type = String, format = DateTime)]
    pub clock_in_at: Timestamp,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub clock_out_at: Option<Timestamp>,
    pub clock_in_location: Option<String>,
    pub clock_out_location: Option<String>,
    /// Whole minutes between clock-in and clock-out; set on clock-out.
    pub worked_minutes: Option<i64>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
}

impl AttendanceRecord {
    pub fn is_open(&self) -> bool {
        self.clock_out_at.is_none()
    }
}

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Shift,
    Leave,
    Swap,
    CoverUp,
    Announcement,
    Inquiry,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shift => "shift",
            Self::Leave => "leave",
            Self::Swap => "swap",
            Self::CoverUp => "cover_up",
            Self::Announcement => "announcement",
            Self::Inquiry => "inquiry",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "shift" => Some(Self::Shift),
            "leave" => Some(Self::Leave),
            "swap" => Some(Self::Swap),
            "cover_up" => Some(Self::CoverUp),
            "announcement" => Some(Self::Announcement),
            "inquiry" => Some(Self::Inquiry),
            _ => None,
        }
    }
}

/// An in-app message for one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NotificationRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: NotificationId,
    #[schema(value_type = String, format = Uuid)]
    pub recipient: EmployeeId,
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
}

/// A message from administrators to every employee or to a chosen few.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AnnouncementRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: AnnouncementId,
    pub topic: String,
    pub message: String,
    /// Addressees. Empty means everyone.
    #[schema(value_type = Vec<String>)]
    pub recipients: Vec<EmployeeId>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
}

impl AnnouncementRecord {
    pub fn is_broadcast(&self) -> bool {
        self.recipients.is_empty()
    }

    pub fn is_visible_to(&self, employee: EmployeeId) -> bool {
        self.is_broadcast() || self.recipients.contains(&employee)
    }
}

/// Whether an inquiry has been answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InquiryStatus {
    Pending,
    Answered,
}

impl InquiryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Answered => "answered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "answered" => Some(Self::Answered),
            _ => None,
        }
    }
}

/// A question from an employee to the administrators.
///
/// Answering sets `status` to `answered`; a later answer replaces the
/// earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InquiryRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: InquiryId,
    #[schema(value_type = String, format = Uuid)]
    pub employee_id: EmployeeId,
    pub subject: String,
    pub message: String,
    pub answer: Option<String>,
    pub status: InquiryStatus,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: Timestamp,
}

/// Pay for one employee within a payroll run. Amounts are in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PayrollDetailRecord {
    #[schema(value_type = String, format = Uuid)]
    pub employee_id: EmployeeId,
    pub worked_minutes: i64,
    pub base_salary_cents: i64,
    pub overtime_pay_cents: i64,
    pub deductions_cents: i64,
    pub net_salary_cents: i64,
}

/// A payroll computed over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PayrollRunRecord {
    #[schema(value_type = String, format = Uuid)]
    pub id: PayrollRunId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub details: Vec<PayrollDetailRecord>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
}

// -- Configuration ------------------------------------------------------------

/// An environment variable held a value that could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{name} has invalid value {value:?}: expected {expected}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Application configuration.
///
/// Custom `Debug` redacts the `auth_token` to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer token secret. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
    /// Longest a claim or decision waits for its record lock per attempt.
    pub lock_timeout: Duration,
    /// Extra attempts after a lock timeout before reporting busy.
    pub busy_retries: u32,
    /// Base delay between busy retries; attempt `n` waits `n × busy_backoff`.
    pub busy_backoff: Duration,
    pub metrics_enabled: bool,
    pub log_json: bool,
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// Unset variables take their defaults; set but unparseable ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let port = parse_var(&lookup, "PORT", "a port number", defaults.port)?;
        let lock_timeout_ms = parse_var(
            &lookup,
            "SHIFTWISE_LOCK_TIMEOUT_MS",
            "milliseconds",
            defaults.lock_timeout.as_millis() as u64,
        )?;
        let busy_retries = parse_var(
            &lookup,
            "SHIFTWISE_BUSY_RETRIES",
            "a retry count",
            defaults.busy_retries,
        )?;
        let busy_backoff_ms = parse_var(
            &lookup,
            "SHIFTWISE_BUSY_BACKOFF_MS",
            "milliseconds",
            defaults.busy_backoff.as_millis() as u64,
        )?;
        let metrics_enabled = parse_var(
            &lookup,
            "SHIFTWISE_METRICS_ENABLED",
            "true or false",
            defaults.metrics_enabled,
        )?;
        let log_json = parse_var(
            &lookup,
            "SHIFTWISE_LOG_JSON",
            "true or false",
            defaults.log_json,
        )?;

        Ok(Self {
            port,
            auth_token: lookup("AUTH_TOKEN").filter(|t| !t.is_empty()),
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            busy_retries,
            busy_backoff: Duration::from_millis(busy_backoff_ms),
            metrics_enabled,
            log_json,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError {
            name,
            value: raw,
            expected,
        }),
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("lock_timeout", &self.lock_timeout)
            .field("busy_retries", &self.busy_retries)
            .field("busy_backoff", &self.busy_backoff)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            lock_timeout: Duration::from_millis(2000),
            busy_retries: 3,
            busy_backoff: Duration::from_millis(25),
            metrics_enabled: true,
            log_json: false,
        }
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state accessible to all route handlers.
///
/// Clone-friendly: every store and service is `Arc`-backed.
#[derive(Debug, Clone)]
pub struct AppState {
    pub employees: Store<EmployeeId, EmployeeRecord>,
    pub attendance: Store<AttendanceId, AttendanceRecord>,
    pub leaves: Store<LeaveId, LeaveRequest>,
    pub payroll_runs: Store<PayrollRunId, PayrollRunRecord>,
    pub announcements: Store<AnnouncementId, AnnouncementRecord>,
    pub inquiries: Store<InquiryId, InquiryRecord>,

    pub schedule: Schedule,
    pub ledger: ClaimLedger,
    pub arbitrator: SwapArbitrator,
    pub notifier: Notifier,

    /// PostgreSQL pool. `None` means in-memory-only mode.
    pub db_pool: Option<PgPool>,

    /// Prometheus render handle, present when a recorder was installed.
    pub metrics: Option<PrometheusHandle>,

    pub config: AppConfig,
}

impl AppState {
    /// In-memory state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// State with the given configuration and optional database pool.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        let retry = RetryPolicy::from_config(&config);
        let notifier = Notifier::new(db_pool.clone());
        let schedule =
            Schedule::new(db_pool.clone(), notifier.clone()).with_lock_timeout(config.lock_timeout);
        let ledger = ClaimLedger::new(
            db_pool.clone(),
            schedule.clone(),
            notifier.clone(),
            retry.clone(),
        );
        let arbitrator =
            SwapArbitrator::new(db_pool.clone(), schedule.clone(), notifier.clone(), retry);

        Self {
            employees: Store::new(),
            attendance: Store::new(),
            leaves: Store::new(),
            payroll_runs: Store::new(),
            announcements: Store::new(),
            inquiries: Store::new(),
            schedule,
            ledger,
            arbitrator,
            notifier,
            db_pool,
            metrics: None,
            config,
        }
    }

    /// Attach the Prometheus handle served at `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Hydrate in-memory stores from the database.
    ///
    /// Called once on startup when a database pool is available. Cover-ups
    /// and swap proposals are not hydrated; they are always read from
    /// Postgres.
    pub async fn hydrate_from_db(&self) -> Result<(), sqlx::Error> {
        let Some(pool) = &self.db_pool else {
            return Ok(());
        };

        let employees = crate::db::employees::load_all(pool).await?;
        let employee_count = employees.len();
        for record in employees {
            self.employees.insert(record.id, record);
        }

        let shift_count = self.schedule.hydrate(pool).await?;

        let attendance = crate::db::attendance::load_all(pool).await?;
        let attendance_count = attendance.len();
        for record in attendance {
            self.attendance.insert(record.id, record);
        }

        let leaves = crate::db::leaves::load_all(pool).await?;
        let leave_count = leaves.len();
        for record in leaves {
            self.leaves.insert(record.id(), record);
        }

        let runs = crate::db::payroll::load_all(pool).await?;
        let run_count = runs.len();
        for record in runs {
            self.payroll_runs.insert(record.id, record);
        }

        let announcements = crate::db::announcements::load_all(pool).await?;
        let announcement_count = announcements.len();
        for record in announcements {
            self.announcements.insert(record.id, record);
        }

        let inquiries = crate::db::inquiries::load_all(pool).await?;
        let inquiry_count = inquiries.len();
        for record in inquiries {
            self.inquiries.insert(record.id, record);
        }

        let notification_count = self.notifier.hydrate(pool).await?;

        tracing::info!(
            employees = employee_count,
            shifts = shift_count,
            attendance = attendance_count,
            leaves = leave_count,
            payroll_runs = run_count,
            announcements = announcement_count,
            inquiries = inquiry_count,
            notifications = notification_count,
            "Hydrated in-memory stores from database"
        );
        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_attendance(id: AttendanceId) -> AttendanceRecord {
        let now = Timestamp::now();
        AttendanceRecord {
            id,
            shift_id: ShiftId::new(),
            employee_id: EmployeeId::new(),
            clock_in_at: now,
            clock_out_at: None,
            clock_in_location: None,
            clock_out_location: None,
            worked_minutes: None,
            created_at: now,
        }
    }

    // -- Store tests ----------------------------------------------------------

    #[test]
    fn store_new_creates_empty_store() {
        let store: Store<AttendanceId, AttendanceRecord> = Store::new();
        assert!(store.is_empty());
        assert!(store.list().is_empty());
    }

    #[test]
    fn store_insert_and_get_roundtrip() {
        let store = Store::new();
        let id = AttendanceId::new();
        assert!(store.insert(id, sample_attendance(id)).is_none());
        assert_eq!(store.get(&id).unwrap().id, id);
        assert!(store.contains(&id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn store_update_returns_none_for_missing_key() {
        let store: Store<AttendanceId, AttendanceRecord> = Store::new();
        assert!(store
            .update(&AttendanceId::new(), |r| r.worked_minutes = Some(1))
            .is_none());
    }

    #[test]
    fn store_filter_and_any() {
        let store = Store::new();
        let a = AttendanceId::new();
        let b = AttendanceId::new();
        store.insert(a, sample_attendance(a));
        let mut closed = sample_attendance(b);
        closed.worked_minutes = Some(30);
        store.insert(b, closed);

        assert_eq!(store.filter(|r| r.worked_minutes.is_some()).len(), 1);
        assert!(store.any(|r| r.id == a));
        assert!(!store.any(|r| r.worked_minutes == Some(99)));
    }

    #[test]
    fn insert_unless_refuses_conflicting_record() {
        let store = Store::new();
        let first = AttendanceId::new();
        let record = sample_attendance(first);
        let shift = record.shift_id;
        assert!(store.insert_unless(first, record, |r| r.shift_id == shift));

        let second = AttendanceId::new();
        let mut duplicate = sample_attendance(second);
        duplicate.shift_id = shift;
        assert!(!store.insert_unless(second, duplicate, |r| r.shift_id == shift));
        assert_eq!(store.len(), 1);

        assert!(store.remove(&first).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn try_update_within_discards_failed_mutation() {
        let store = Store::new();
        let id = AttendanceId::new();
        store.insert(id, sample_attendance(id));

        let result = store
            .try_update_within(&id, Duration::from_millis(50), |r| {
                r.worked_minutes = Some(10);
                Err::<(), _>("rejected")
            })
            .unwrap();
        assert_eq!(result, Some(Err("rejected")));
        assert_eq!(store.get(&id).unwrap().worked_minutes, None);
    }

    #[test]
    fn try_update_within_applies_successful_mutation() {
        let store = Store::new();
        let id = AttendanceId::new();
        store.insert(id, sample_attendance(id));

        let result = store
            .try_update_within(&id, Duration::from_millis(50), |r| {
                r.worked_minutes = Some(10);
                Ok::<_, ()>(r.worked_minutes)
            })
            .unwrap();
        assert_eq!(result, Some(Ok(Some(10))));
        assert_eq!(store.get(&id).unwrap().worked_minutes, Some(10));
    }

    #[test]
    fn try_update_within_times_out_while_record_locked() {
        let store: Store<AttendanceId, AttendanceRecord> = Store::new();
        let id = AttendanceId::new();
        store.insert(id, sample_attendance(id));

        let slot = store.slot(&id).unwrap();
        let _held = slot.lock();
        let other = store.clone();
        let result = std::thread::spawn(move || {
            other.try_update_within(&id, Duration::from_millis(20), |_| Ok::<_, ()>(()))
        })
        .join()
        .unwrap();
        assert_eq!(result, Err(LockTimeout));
    }

    #[test]
    fn locked_record_does_not_block_other_records() {
        let store: Store<AttendanceId, AttendanceRecord> = Store::new();
        let (busy, free) = (AttendanceId::new(), AttendanceId::new());
        store.insert(busy, sample_attendance(busy));
        store.insert(free, sample_attendance(free));

        let slot = store.slot(&busy).unwrap();
        let held = slot.lock();
        let other = store.clone();
        let result = std::thread::spawn(move || {
            let updated = other.try_update_within(&free, Duration::from_millis(20), |r| {
                r.worked_minutes = Some(5);
                Ok::<_, ()>(())
            });
            (updated, other.contains(&busy), other.len())
        })
        .join()
        .unwrap();
        assert_eq!(result, (Ok(Some(Ok(()))), true, 2));
        drop(held);
        assert_eq!(store.get(&free).unwrap().worked_minutes, Some(5));
    }

    #[test]
    fn pair_update_commits_both_or_neither() {
        let store = Store::new();
        let (a, b) = (AttendanceId::new(), AttendanceId::new());
        store.insert(a, sample_attendance(a));
        store.insert(b, sample_attendance(b));
        let wait = Duration::from_millis(50);

        let failed = store
            .try_update_pair_within(&a, &b, wait, |x, y| {
                x.worked_minutes = Some(1);
                y.worked_minutes = Some(2);
                Err::<(), _>("refused")
            })
            .unwrap();
        assert_eq!(failed, Some(Err("refused")));
        assert_eq!(store.get(&a).unwrap().worked_minutes, None);
        assert_eq!(store.get(&b).unwrap().worked_minutes, None);

        store
            .try_update_pair_within(&b, &a, wait, |x, y| {
                x.worked_minutes = Some(2);
                y.worked_minutes = Some(1);
                Ok::<_, ()>(())
            })
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(store.get(&a).unwrap().worked_minutes, Some(1));
        assert_eq!(store.get(&b).unwrap().worked_minutes, Some(2));

        let none = store
            .try_update_pair_within(&a, &a, wait, |_, _| Ok::<_, ()>(()))
            .unwrap();
        assert!(none.is_none());
        let missing = store
            .try_update_pair_within(&a, &AttendanceId::new(), wait, |_, _| Ok::<_, ()>(()))
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn restore_skips_records_changed_since() {
        let store = Store::new();
        let id = AttendanceId::new();
        let original = sample_attendance(id);
        store.insert(id, original.clone());

        let changed = store.update(&id, |r| r.worked_minutes = Some(30)).unwrap();
        assert!(store.restore(&id, &changed, original.clone()));
        assert_eq!(store.get(&id), Some(original.clone()));

        store.update(&id, |r| r.worked_minutes = Some(45));
        assert!(!store.restore(&id, &changed, original));
        assert_eq!(store.get(&id).unwrap().worked_minutes, Some(45));
    }

    #[test]
    fn insert_over_existing_keeps_the_slot() {
        let store = Store::new();
        let id = AttendanceId::new();
        store.insert(id, sample_attendance(id));
        let slot = store.slot(&id).unwrap();

        let mut replacement = sample_attendance(id);
        replacement.worked_minutes = Some(7);
        assert!(store.insert(id, replacement).is_some());
        assert_eq!(slot.lock().worked_minutes, Some(7));
    }

    // -- Config tests ---------------------------------------------------------

    #[test]
    fn config_defaults_when_environment_empty() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.auth_token.is_none());
        assert_eq!(config.lock_timeout, Duration::from_millis(2000));
        assert_eq!(config.busy_retries, 3);
        assert_eq!(config.busy_backoff, Duration::from_millis(25));
        assert!(config.metrics_enabled);
        assert!(!config.log_json);
    }

    #[test]
    fn config_reads_overrides() {
        let config = AppConfig::from_lookup(|name| match name {
            "PORT" => Some("9000".into()),
            "AUTH_TOKEN" => Some("s3cret".into()),
            "SHIFTWISE_LOCK_TIMEOUT_MS" => Some("150".into()),
            "SHIFTWISE_BUSY_RETRIES" => Some("0".into()),
            "SHIFTWISE_LOG_JSON" => Some("true".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.auth_token.as_deref(), Some("s3cret"));
        assert_eq!(config.lock_timeout, Duration::from_millis(150));
        assert_eq!(config.busy_retries, 0);
        assert!(config.log_json);
    }

    #[test]
    fn config_rejects_garbage() {
        let err = AppConfig::from_lookup(|name| {
            (name == "SHIFTWISE_BUSY_RETRIES").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert_eq!(err.name, "SHIFTWISE_BUSY_RETRIES");
        assert_eq!(err.value, "lots");
    }

    #[test]
    fn config_debug_redacts_token() {
        let config = AppConfig {
            auth_token: Some("super-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn notification_kind_strings_roundtrip() {
        for kind in [
            NotificationKind::Shift,
            NotificationKind::Leave,
            NotificationKind::Swap,
            NotificationKind::CoverUp,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
    }
}
