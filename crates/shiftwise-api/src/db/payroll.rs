//! Payroll run persistence operations.
//!
//! A run and its per-employee details are written in one transaction.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use shiftwise_core::{EmployeeId, PayrollRunId, Timestamp};

use crate::state::{PayrollDetailRecord, PayrollRunRecord};

pub async fn insert(pool: &PgPool, run: &PayrollRunRecord) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO payroll_runs (id, start_date, end_date, created_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(run.id.0)
    .bind(run.start_date)
    .bind(run.end_date)
    .bind(*run.created_at.as_datetime())
    .execute(&mut *tx)
    .await?;

    for detail in &run.details {
        sqlx::query(
            "INSERT INTO payroll_details (run_id, employee_id, worked_minutes, base_salary_cents,
                 overtime_pay_cents, deductions_cents, net_salary_cents)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(run.id.0)
        .bind(detail.employee_id.0)
        .bind(detail.worked_minutes)
        .bind(detail.base_salary_cents)
        .bind(detail.overtime_pay_cents)
        .bind(detail.deductions_cents)
        .bind(detail.net_salary_cents)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

/// Load all runs with their details on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<PayrollRunRecord>, sqlx::Error> {
    let runs = sqlx::query_as::<_, RunRow>(
        "SELECT id, start_date, end_date, created_at FROM payroll_runs ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let details = sqlx::query_as::<_, DetailRow>(
        "SELECT run_id, employee_id, worked_minutes, base_salary_cents,
                overtime_pay_cents, deductions_cents, net_salary_cents
         FROM payroll_details ORDER BY run_id, employee_id",
    )
    .fetch_all(pool)
    .await?;

    let mut by_run: HashMap<Uuid, Vec<PayrollDetailRecord>> = HashMap::new();
    for row in details {
        by_run.entry(row.run_id).or_default().push(row.into_record());
    }

    Ok(runs
        .into_iter()
        .map(|run| PayrollRunRecord {
            id: PayrollRunId(run.id),
            start_date: run.start_date,
            end_date: run.end_date,
            details: by_run.remove(&run.id).unwrap_or_default(),
            created_at: Timestamp::from_utc(run.created_at),
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct DetailRow {
    run_id: Uuid,
    employee_id: Uuid,
    worked_minutes: i64,
    base_salary_cents: i64,
    overtime_pay_cents: i64,
    deductions_cents: i64,
    net_salary_cents: i64,
}

impl DetailRow {
    fn into_record(self) -> PayrollDetailRecord {
        PayrollDetailRecord {
            employee_id: EmployeeId(self.employee_id),
            worked_minutes: self.worked_minutes,
            base_salary_cents: self.base_salary_cents,
            overtime_pay_cents: self.overtime_pay_cents,
            deductions_cents: self.deductions_cents,
            net_salary_cents: self.net_salary_cents,
        }
    }
}
