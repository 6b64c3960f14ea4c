//! Employee persistence operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use shiftwise_core::{EmployeeId, Timestamp};

use super::unknown_value;
use crate::auth::Role;
use crate::state::EmployeeRecord;

/// Insert a new employee. Fails with a unique violation on a duplicate email.
pub async fn insert(pool: &PgPool, record: &EmployeeRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO employees (id, name, email, department, role, weekly_base_salary_cents, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(record.id.0)
    .bind(&record.name)
    .bind(&record.email)
    .bind(record.department.as_deref())
    .bind(record.role.as_str())
    .bind(record.weekly_base_salary_cents)
    .bind(*record.created_at.as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all employees on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<EmployeeRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, EmployeeRow>(
        "SELECT id, name, email, department, role, weekly_base_salary_cents, created_at
         FROM employees ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(EmployeeRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct EmployeeRow {
    id: Uuid,
    name: String,
    email: String,
    department: Option<String>,
    role: String,
    weekly_base_salary_cents: i64,
    created_at: DateTime<Utc>,
}

impl EmployeeRow {
    fn into_record(self) -> Result<EmployeeRecord, sqlx::Error> {
        let role = Role::parse(&self.role).ok_or_else(|| unknown_value("employees.role", &self.role))?;
        Ok(EmployeeRecord {
            id: EmployeeId(self.id),
            name: self.name,
            email: self.email,
            department: self.department,
            role,
            weekly_base_salary_cents: self.weekly_base_salary_cents,
            created_at: Timestamp::from_utc(self.created_at),
        })
    }
}
