//! # Payroll API
//!
//! A run covers an inclusive date range. Every employee gets one detail
//! line, priced from the completed attendance whose clock-in date falls
//! inside the range.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use shiftwise_core::{PayrollRunId, Timestamp};
use shiftwise_payroll::{calculate_salary, tally_worked_minutes, PayPeriod};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::{AppState, PayrollDetailRecord, PayrollRunRecord};

// ── Request/Response DTOs ───────────────────────────────────────────

/// Compute payroll over `[start_date, end_date]`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePayrollRunRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the payroll router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/payroll/runs", get(list_runs).post(create_run))
        .route("/v1/payroll/runs/{id}", get(get_run))
}

/// Price every employee over `period` from the attendance in `state`.
fn compute_details(
    state: &AppState,
    period: &PayPeriod,
) -> Result<Vec<PayrollDetailRecord>, AppError> {
    let completed = state.attendance.filter(|r| !r.is_open());
    let totals = tally_worked_minutes(
        period,
        completed.iter().filter_map(|r| {
            r.worked_minutes
                .map(|minutes| (r.employee_id, r.clock_in_at.date(), minutes))
        }),
    )?;

    let mut employees = state.employees.list();
    employees.sort_by_key(|e| e.id);
    employees
        .into_iter()
        .map(|employee| {
            let worked = totals.get(&employee.id).copied().unwrap_or(0);
            let pay = calculate_salary(employee.weekly_base_salary_cents, worked)?;
            Ok(PayrollDetailRecord {
                employee_id: employee.id,
                worked_minutes: pay.worked_minutes,
                base_salary_cents: pay.base_salary_cents,
                overtime_pay_cents: pay.overtime_pay_cents,
                deductions_cents: pay.deductions_cents,
                net_salary_cents: pay.net_salary_cents,
            })
        })
        .collect()
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /v1/payroll/runs — Compute and store a payroll run.
#[utoipa::path(
    post,
    path = "/v1/payroll/runs",
    request_body = CreatePayrollRunRequest,
    responses(
        (status = 201, description = "Run created", body = PayrollRunRecord),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
        (status = 422, description = "End date before start date", body = crate::error::ErrorBody),
    ),
    tag = "payroll"
)]
pub(crate) async fn create_run(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreatePayrollRunRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PayrollRunRecord>), AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_json(body)?;
    let period = PayPeriod::new(req.start_date, req.end_date)?;

    let run = PayrollRunRecord {
        id: PayrollRunId::new(),
        start_date: period.start(),
        end_date: period.end(),
        details: compute_details(&state, &period)?,
        created_at: Timestamp::now(),
    };

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::payroll::insert(pool, &run).await {
            tracing::error!(run_id = %run.id, error = %e, "failed to persist payroll run");
            return Err(AppError::Internal("database write failed".to_string()));
        }
    }
    state.payroll_runs.insert(run.id, run.clone());

    tracing::info!(
        run_id = %run.id,
        start = %run.start_date,
        end = %run.end_date,
        employees = run.details.len(),
        "payroll run created"
    );
    Ok((StatusCode::CREATED, Json(run)))
}

/// GET /v1/payroll/runs — All runs, newest first.
#[utoipa::path(
    get,
    path = "/v1/payroll/runs",
    responses(
        (status = 200, description = "All runs", body = Vec<PayrollRunRecord>),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
    ),
    tag = "payroll"
)]
pub(crate) async fn list_runs(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<PayrollRunRecord>>, AppError> {
    require_role(&caller, Role::Admin)?;
    let mut runs = state.payroll_runs.list();
    runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(runs))
}

/// GET /v1/payroll/runs/{id} — One run with its details.
#[utoipa::path(
    get,
    path = "/v1/payroll/runs/{id}",
    params(("id" = Uuid, Path, description = "Payroll run ID")),
    responses(
        (status = 200, description = "Run found", body = PayrollRunRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "payroll"
)]
pub(crate) async fn get_run(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<PayrollRunRecord>, AppError> {
    require_role(&caller, Role::Admin)?;
    let id = PayrollRunId(id);
    state
        .payroll_runs
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("{id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftwise_core::{AttendanceId, EmployeeId, ShiftId};

    use crate::state::{AttendanceRecord, EmployeeRecord};

    fn employee(state: &AppState, weekly_base_salary_cents: i64) -> EmployeeId {
        let id = EmployeeId::new();
        state.employees.insert(
            id,
            EmployeeRecord {
                id,
                name: "Worker".to_string(),
                email: format!("{id}@example.com"),
                department: None,
                role: Role::Employee,
                weekly_base_salary_cents,
                created_at: Timestamp::now(),
            },
        );
        id
    }

    fn worked(state: &AppState, employee_id: EmployeeId, clock_in: &str, minutes: Option<i64>) {
        let id = AttendanceId::new();
        let clock_in_at = Timestamp::parse(clock_in).unwrap();
        state.attendance.insert(
            id,
            AttendanceRecord {
                id,
                shift_id: ShiftId::new(),
                employee_id,
                clock_in_at,
                clock_out_at: minutes.map(|_| Timestamp::now()),
                clock_in_location: None,
                clock_out_location: None,
                worked_minutes: minutes,
                created_at: clock_in_at,
            },
        );
    }

    fn period(start: u32, end: u32) -> PayPeriod {
        PayPeriod::new(
            NaiveDate::from_ymd_opt(2026, 3, start).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, end).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn details_cover_every_employee() {
        let state = AppState::new();
        let busy = employee(&state, 200_000);
        let idle = employee(&state, 150_000);
        worked(&state, busy, "2026-03-02T09:00:00Z", Some(20 * 60));

        let details = compute_details(&state, &period(1, 7)).unwrap();
        assert_eq!(details.len(), 2);
        let busy_line = details.iter().find(|d| d.employee_id == busy).unwrap();
        assert_eq!(busy_line.worked_minutes, 1200);
        assert_eq!(busy_line.net_salary_cents, 100_000);
        let idle_line = details.iter().find(|d| d.employee_id == idle).unwrap();
        assert_eq!(idle_line.net_salary_cents, 0);
    }

    #[test]
    fn open_and_out_of_range_attendance_is_ignored() {
        let state = AppState::new();
        let id = employee(&state, 240_000);
        worked(&state, id, "2026-03-03T09:00:00Z", Some(60));
        worked(&state, id, "2026-03-04T09:00:00Z", None);
        worked(&state, id, "2026-03-20T09:00:00Z", Some(600));

        let details = compute_details(&state, &period(1, 7)).unwrap();
        assert_eq!(details[0].worked_minutes, 60);
        assert_eq!(details[0].net_salary_cents, 6_000);
    }

    #[test]
    fn router_builds() {
        let _router = router();
    }
}
