//! # shiftwise-state — Seal-Once State Machines
//!
//! The records whose state may change at most once, plus the shift status
//! lifecycle they act on.
//!
//! ## State Machines
//!
//! - **Cover-up** (`cover_up.rs`): `Open → Claimed | Cancelled`. The claimant
//!   is recorded if and only if the posting is `Claimed`.
//!
//! - **Decision** (`decision.rs`): `Pending → Approved | Rejected`, sealed
//!   exactly once with the deciding approver. Shared by swap proposals and
//!   leave requests.
//!
//! - **Swap** (`swap.rs`): a proposal to exchange two employees' shifts,
//!   decided by a neutral approver.
//!
//! - **Leave** (`leave.rs`): a leave request for one shift period.
//!
//! - **Shift status** (`shift.rs`): `Pending → EmployeeConfirmed → Confirmed`,
//!   with `Cancelled` reachable from any non-terminal status.
//!
//! ## Design
//!
//! These types only decide whether a transition is legal and apply it to a
//! value in hand. Making the check and the write one atomic step against
//! shared storage is the job of the claim ledger and swap arbitrator in
//! `shiftwise-api`; they run these transitions inside a single lock
//! acquisition or express the same precondition as a conditional `UPDATE`.
//!
//! Every record type is deserialized through a `*Parts` struct and
//! re-validated, so a row that violates an invariant is rejected at load
//! time instead of surfacing later as an impossible state.

pub mod cover_up;
pub mod decision;
pub mod leave;
pub mod shift;
pub mod swap;

pub use cover_up::{CoverUp, CoverUpError, CoverUpParts, CoverUpState};
pub use decision::{Decision, DecisionError, DecisionState, Ruling};
pub use leave::{LeaveParts, LeaveRequest, ShiftPeriod};
pub use shift::{ShiftStatus, ShiftStatusError};
pub use swap::{SwapParts, SwapProposal};
