//! # Employee API
//!
//! Employee accounts and their payroll settings. Administrators manage
//! accounts; an employee may read their own.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use shiftwise_core::{EmployeeId, Timestamp, ValidationError};

use crate::auth::{require_access, require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{check_optional_text, extract_validated_json, Validate};
use crate::state::{AppState, EmployeeRecord};

const MAX_NAME_LEN: usize = 200;
const MAX_EMAIL_LEN: usize = 320;
const MAX_DEPARTMENT_LEN: usize = 100;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Create an employee account.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEmployeeRequest {
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    /// Defaults to `"employee"`.
    #[serde(default = "default_role")]
    pub role: Role,
    pub weekly_base_salary_cents: i64,
}

fn default_role() -> Role {
    Role::Employee
}

impl Validate for CreateEmployeeRequest {
    fn validate(&self) -> Result<(), String> {
        ValidationError::check_text("name", &self.name, MAX_NAME_LEN).map_err(|e| e.to_string())?;
        ValidationError::check_text("email", &self.email, MAX_EMAIL_LEN)
            .map_err(|e| e.to_string())?;
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(format!("email {email:?} is not a valid address")),
        }
        check_optional_text("department", self.department.as_deref(), MAX_DEPARTMENT_LEN)?;
        if self.weekly_base_salary_cents < 0 {
            return Err("weekly_base_salary_cents must not be negative".to_string());
        }
        Ok(())
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the employees router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/employees", get(list_employees).post(create_employee))
        .route("/v1/employees/{id}", get(get_employee))
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /v1/employees — Create an employee.
#[utoipa::path(
    post,
    path = "/v1/employees",
    request_body = CreateEmployeeRequest,
    responses(
        (status = 201, description = "Employee created", body = EmployeeRecord),
        (status = 409, description = "Email already registered", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "employees"
)]
pub(crate) async fn create_employee(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateEmployeeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EmployeeRecord>), AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_validated_json(body)?;

    let email = req.email.trim().to_lowercase();
    let record = EmployeeRecord {
        id: EmployeeId::new(),
        name: req.name.trim().to_string(),
        email: email.clone(),
        department: req.department.map(|d| d.trim().to_string()),
        role: req.role,
        weekly_base_salary_cents: req.weekly_base_salary_cents,
        created_at: Timestamp::now(),
    };

    if !state
        .employees
        .insert_unless(record.id, record.clone(), |e| e.email == email)
    {
        return Err(duplicate_email(&email));
    }

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::employees::insert(pool, &record).await {
            state.employees.remove(&record.id);
            if e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                return Err(duplicate_email(&email));
            }
            tracing::error!(employee_id = %record.id, error = %e, "failed to persist employee");
            return Err(AppError::Internal("database write failed".to_string()));
        }
    }

    tracing::info!(employee_id = %record.id, role = record.role.as_str(), "employee created");
    Ok((StatusCode::CREATED, Json(record)))
}

fn duplicate_email(email: &str) -> AppError {
    AppError::Conflict(format!("an employee with email {email} already exists"))
}

/// GET /v1/employees — All employees, ordered by name.
#[utoipa::path(
    get,
    path = "/v1/employees",
    responses(
        (status = 200, description = "All employees", body = Vec<EmployeeRecord>),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
    ),
    tag = "employees"
)]
pub(crate) async fn list_employees(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<EmployeeRecord>>, AppError> {
    require_role(&caller, Role::Admin)?;
    let mut employees = state.employees.list();
    employees.sort_by(|a, b| a.name.cmp(&b.name).then(a.email.cmp(&b.email)));
    Ok(Json(employees))
}

/// GET /v1/employees/{id} — One employee; admins or the employee themself.
#[utoipa::path(
    get,
    path = "/v1/employees/{id}",
    params(("id" = Uuid, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = EmployeeRecord),
        (status = 403, description = "Another employee's record", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "employees"
)]
pub(crate) async fn get_employee(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<EmployeeRecord>, AppError> {
    let id = EmployeeId(id);
    require_access(&caller, id, "this employee record")?;
    state
        .employees
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("{id} not found")))
}
