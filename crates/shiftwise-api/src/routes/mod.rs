//! # API Route Modules
//!
//! - `cover_ups` — the claim ledger: posting, claiming and cancelling
//!   cover-up shifts.
//! - `swaps` — the swap arbitrator: proposing and deciding shift swaps.
//! - `employees` — employee accounts and payroll settings.
//! - `shifts` — the schedule: creation, confirmation, status changes.
//! - `attendance` — clock-in and clock-out.
//! - `leaves` — leave requests and their decisions.
//! - `payroll` — payroll runs over a date range.
//! - `announcements` — messages from administrators to everyone or a few.
//! - `inquiries` — employee questions and administrator answers.
//! - `notifications` — the caller's in-app messages.

pub mod announcements;
pub mod attendance;
pub mod cover_ups;
pub mod employees;
pub mod inquiries;
pub mod leaves;
pub mod notifications;
pub mod payroll;
pub mod shifts;
pub mod swaps;

use serde::Deserialize;
use utoipa::ToSchema;

use shiftwise_state::Decision;

/// Approve or reject a pending request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DecisionRequest {
    /// `"approve"` or `"reject"`.
    #[schema(value_type = String, example = "approve")]
    pub decision: Decision,
}
