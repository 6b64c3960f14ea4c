//! # shiftwise-payroll — Salary Arithmetic
//!
//! Pure functions; nothing here touches storage.
//!
//! - [`calculate_salary`] turns a weekly base salary and a number of worked
//!   minutes into a [`SalaryBreakdown`].
//! - [`PayPeriod`] is an inclusive date range, and [`tally_worked_minutes`]
//!   sums completed attendance inside one.
//!
//! Money is integer cents and time is integer minutes throughout. Division
//! rounds half-up to the nearest cent.

pub mod period;
pub mod salary;

pub use period::{tally_worked_minutes, PayPeriod};
pub use salary::{calculate_salary, SalaryBreakdown, OVERTIME_DIVISOR, STANDARD_WEEK_MINUTES};

use thiserror::Error;

/// Errors from payroll inputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayrollError {
    /// Weekly base salary below zero.
    #[error("weekly base salary must not be negative, got {0} cents")]
    NegativeBase(i64),

    /// Worked time below zero.
    #[error("worked minutes must not be negative, got {0}")]
    NegativeMinutes(i64),

    /// The period ends before it starts.
    #[error("pay period end {end} is before start {start}")]
    InvertedPeriod {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// The result does not fit in an `i64` of cents.
    #[error("salary computation overflowed")]
    Overflow,
}
