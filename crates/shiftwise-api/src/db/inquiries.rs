//! Employee inquiry persistence operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use shiftwise_core::{EmployeeId, InquiryId, Timestamp};

use super::unknown_value;
use crate::state::{InquiryRecord, InquiryStatus};

pub async fn insert(pool: &PgPool, record: &InquiryRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO inquiries (id, employee_id, subject, message, answer, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(record.id.0)
    .bind(record.employee_id.0)
    .bind(&record.subject)
    .bind(&record.message)
    .bind(record.answer.as_deref())
    .bind(record.status.as_str())
    .bind(*record.created_at.as_datetime())
    .bind(*record.updated_at.as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

/// Store the answer. `false` if the row is gone.
pub async fn update_answer(pool: &PgPool, record: &InquiryRecord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE inquiries SET answer = $1, status = $2, updated_at = $3 WHERE id = $4",
    )
    .bind(record.answer.as_deref())
    .bind(record.status.as_str())
    .bind(*record.updated_at.as_datetime())
    .bind(record.id.0)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &PgPool, id: InquiryId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM inquiries WHERE id = $1")
        .bind(id.0)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all inquiries on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<InquiryRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, InquiryRow>(
        "SELECT id, employee_id, subject, message, answer, status, created_at, updated_at
         FROM inquiries ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(InquiryRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct InquiryRow {
    id: Uuid,
    employee_id: Uuid,
    subject: String,
    message: String,
    answer: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InquiryRow {
    fn into_record(self) -> Result<InquiryRecord, sqlx::Error> {
        let status = InquiryStatus::parse(&self.status)
            .ok_or_else(|| unknown_value("inquiries.status", &self.status))?;
        Ok(InquiryRecord {
            id: InquiryId(self.id),
            employee_id: EmployeeId(self.employee_id),
            subject: self.subject,
            message: self.message,
            answer: self.answer,
            status,
            created_at: Timestamp::from_utc(self.created_at),
            updated_at: Timestamp::from_utc(self.updated_at),
        })
    }
}
