//! Weekly salary with pro-rating and overtime.
//!
//! The base salary pays a 40-hour week. Below that it is pro-rated by the
//! share of the week worked. Above it the full base is paid plus overtime at
//! one and a half times the hourly rate:
//!
//! ```text
//! worked ≤ 2400 min:  net = base × worked / 2400
//! worked > 2400 min:  net = base + base × 1.5 × (worked − 2400) / 2400
//!                         = base + base × (worked − 2400) / 1600
//! ```
//!
//! No deductions are applied.

use serde::{Deserialize, Serialize};

use crate::PayrollError;

/// Minutes in the standard week the base salary pays for.
pub const STANDARD_WEEK_MINUTES: i64 = 40 * 60;

/// `STANDARD_WEEK_MINUTES / 1.5`, the divisor for overtime minutes.
pub const OVERTIME_DIVISOR: i64 = STANDARD_WEEK_MINUTES * 2 / 3;

/// The result of a salary calculation, in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryBreakdown {
    pub worked_minutes: i64,
    /// The employee's weekly base, as configured.
    pub base_salary_cents: i64,
    pub overtime_pay_cents: i64,
    pub deductions_cents: i64,
    pub net_salary_cents: i64,
}

/// Compute pay for `worked_minutes` against a weekly base of `weekly_base_cents`.
pub fn calculate_salary(
    weekly_base_cents: i64,
    worked_minutes: i64,
) -> Result<SalaryBreakdown, PayrollError> {
    if weekly_base_cents < 0 {
        return Err(PayrollError::NegativeBase(weekly_base_cents));
    }
    if worked_minutes < 0 {
        return Err(PayrollError::NegativeMinutes(worked_minutes));
    }

    let (overtime, net) = if worked_minutes <= STANDARD_WEEK_MINUTES {
        let net = mul_div_round(weekly_base_cents, worked_minutes, STANDARD_WEEK_MINUTES)?;
        (0, net)
    } else {
        let extra = worked_minutes - STANDARD_WEEK_MINUTES;
        let overtime = mul_div_round(weekly_base_cents, extra, OVERTIME_DIVISOR)?;
        let net = weekly_base_cents
            .checked_add(overtime)
            .ok_or(PayrollError::Overflow)?;
        (overtime, net)
    };

    Ok(SalaryBreakdown {
        worked_minutes,
        base_salary_cents: weekly_base_cents,
        overtime_pay_cents: overtime,
        deductions_cents: 0,
        net_salary_cents: net,
    })
}

/// `a × b / d` rounded half-up, for non-negative `a`, `b` and positive `d`.
fn mul_div_round(a: i64, b: i64, d: i64) -> Result<i64, PayrollError> {
    let product = i128::from(a) * i128::from(b);
    let d = i128::from(d);
    let (quotient, remainder) = (product / d, product % d);
    let rounded = if remainder * 2 >= d { quotient + 1 } else { quotient };
    i64::try_from(rounded).map_err(|_| PayrollError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BASE: i64 = 100_000; // 1000.00 per week

    #[test]
    fn test_exact_standard_week_pays_base() {
        let s = calculate_salary(BASE, STANDARD_WEEK_MINUTES).unwrap();
        assert_eq!(s.net_salary_cents, BASE);
        assert_eq!(s.overtime_pay_cents, 0);
        assert_eq!(s.deductions_cents, 0);
    }

    #[test]
    fn test_half_week_is_pro_rated() {
        let s = calculate_salary(BASE, 20 * 60).unwrap();
        assert_eq!(s.net_salary_cents, 50_000);
        assert_eq!(s.overtime_pay_cents, 0);
    }

    #[test]
    fn test_overtime_at_time_and_a_half() {
        // 42h: hourly 25.00, overtime 2h × 37.50 = 75.00
        let s = calculate_salary(BASE, 42 * 60).unwrap();
        assert_eq!(s.overtime_pay_cents, 7_500);
        assert_eq!(s.net_salary_cents, 107_500);
        assert_eq!(s.base_salary_cents, BASE);
    }

    #[test]
    fn test_rounds_half_up_to_the_cent() {
        // 1 cent × 1200/2400 = 0.5 → 1
        assert_eq!(calculate_salary(1, 1200).unwrap().net_salary_cents, 1);
        // 1 cent × 1199/2400 < 0.5 → 0
        assert_eq!(calculate_salary(1, 1199).unwrap().net_salary_cents, 0);
    }

    #[test]
    fn test_zero_minutes_pays_nothing() {
        assert_eq!(calculate_salary(BASE, 0).unwrap().net_salary_cents, 0);
    }

    #[test]
    fn test_negative_inputs_rejected() {
        assert_eq!(
            calculate_salary(-1, 60),
            Err(PayrollError::NegativeBase(-1))
        );
        assert_eq!(
            calculate_salary(BASE, -5),
            Err(PayrollError::NegativeMinutes(-5))
        );
    }

    #[test]
    fn test_overflow_reported() {
        assert_eq!(
            calculate_salary(i64::MAX, i64::MAX),
            Err(PayrollError::Overflow)
        );
    }

    proptest! {
        #[test]
        fn prop_pay_is_monotonic_in_minutes(base in 0i64..10_000_000, m in 0i64..20_000) {
            let a = calculate_salary(base, m).unwrap();
            let b = calculate_salary(base, m + 1).unwrap();
            prop_assert!(b.net_salary_cents >= a.net_salary_cents);
        }

        #[test]
        fn prop_net_is_base_plus_overtime_above_standard(base in 0i64..10_000_000, extra in 1i64..10_000) {
            let s = calculate_salary(base, STANDARD_WEEK_MINUTES + extra).unwrap();
            prop_assert_eq!(s.net_salary_cents, base + s.overtime_pay_cents);
        }
    }
}
