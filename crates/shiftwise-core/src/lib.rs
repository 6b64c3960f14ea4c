//! # shiftwise-core — Foundational Types for Shiftwise
//!
//! Every other crate in the workspace depends on `shiftwise-core`; it depends
//! on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `EmployeeId`, `ShiftId`,
//!    `CoverUpId`, `SwapId` and friends are distinct types. A shift id cannot
//!    be passed where an employee id is expected.
//!
//! 2. **Store-precision timestamps.** [`Timestamp`] is UTC-only and truncated
//!    to microseconds, the precision Postgres keeps, so a value read back from
//!    the database compares equal to the value that was written.
//!
//! 3. **Structured validation errors.** Request validation failures carry the
//!    offending field name rather than free-form strings.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `shiftwise-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod temporal;

pub use error::{ShiftwiseError, ValidationError};
pub use identity::{
    AnnouncementId, AttendanceId, CoverUpId, EmployeeId, InquiryId, LeaveId, NotificationId,
    PayrollRunId, ShiftId, SwapId,
};
pub use temporal::Timestamp;
