//! Pay periods and worked-time tallies.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use shiftwise_core::EmployeeId;

use crate::PayrollError;

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

impl PayPeriod {
    /// Build a period. `start` may equal `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PayrollError> {
        if end < start {
            return Err(PayrollError::InvertedPeriod { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Sum worked minutes per employee for entries dated inside `period`.
///
/// Each entry is `(employee, clock-in date, worked minutes)`. Entries
/// outside the period are ignored. A total that does not fit in an `i64`
/// is [`PayrollError::Overflow`].
pub fn tally_worked_minutes<I>(
    period: &PayPeriod,
    entries: I,
) -> Result<BTreeMap<EmployeeId, i64>, PayrollError>
where
    I: IntoIterator<Item = (EmployeeId, NaiveDate, i64)>,
{
    let mut totals = BTreeMap::new();
    for (employee, date, minutes) in entries {
        if period.contains(date) {
            let total: &mut i64 = totals.entry(employee).or_insert(0);
            *total = total.checked_add(minutes).ok_or(PayrollError::Overflow)?;
        }
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    #[test]
    fn test_inverted_period_rejected() {
        assert_eq!(
            PayPeriod::new(d(10), d(9)),
            Err(PayrollError::InvertedPeriod {
                start: d(10),
                end: d(9)
            })
        );
        assert!(PayPeriod::new(d(9), d(9)).is_ok());
    }

    #[test]
    fn test_contains_is_inclusive() {
        let p = PayPeriod::new(d(2), d(8)).unwrap();
        assert!(p.contains(d(2)));
        assert!(p.contains(d(8)));
        assert!(!p.contains(d(1)));
        assert!(!p.contains(d(9)));
    }

    #[test]
    fn test_tally_sums_per_employee_within_period() {
        let p = PayPeriod::new(d(2), d(8)).unwrap();
        let alice = EmployeeId::new();
        let bob = EmployeeId::new();
        let totals = tally_worked_minutes(
            &p,
            vec![
                (alice, d(2), 480),
                (alice, d(3), 300),
                (bob, d(8), 60),
                (bob, d(9), 600),
                (alice, d(1), 999),
            ],
        )
        .unwrap();
        assert_eq!(totals.get(&alice), Some(&780));
        assert_eq!(totals.get(&bob), Some(&60));
        assert_eq!(totals.len(), 2);
    }

    #[test]
    fn test_tally_overflow_is_an_error() {
        let p = PayPeriod::new(d(2), d(8)).unwrap();
        let alice = EmployeeId::new();
        assert_eq!(
            tally_worked_minutes(&p, vec![(alice, d(2), i64::MAX), (alice, d(3), 1)]),
            Err(PayrollError::Overflow)
        );
        // Out-of-period entries never reach the sum.
        assert!(tally_worked_minutes(&p, vec![(alice, d(2), i64::MAX), (alice, d(9), 1)]).is_ok());
    }
}
