//! Announcement persistence operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use shiftwise_core::{AnnouncementId, EmployeeId, Timestamp};

use crate::state::AnnouncementRecord;

fn recipient_uuids(record: &AnnouncementRecord) -> Vec<Uuid> {
    record.recipients.iter().map(|e| e.0).collect()
}

pub async fn insert(pool: &PgPool, record: &AnnouncementRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO announcements (id, topic, message, recipients, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(record.id.0)
    .bind(&record.topic)
    .bind(&record.message)
    .bind(recipient_uuids(record))
    .bind(*record.created_at.as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

/// Replace topic, message and recipients. `false` if the row is gone.
pub async fn update(pool: &PgPool, record: &AnnouncementRecord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE announcements SET topic = $1, message = $2, recipients = $3 WHERE id = $4",
    )
    .bind(&record.topic)
    .bind(&record.message)
    .bind(recipient_uuids(record))
    .bind(record.id.0)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &PgPool, id: AnnouncementId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM announcements WHERE id = $1")
        .bind(id.0)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all announcements on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<AnnouncementRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AnnouncementRow>(
        "SELECT id, topic, message, recipients, created_at
         FROM announcements ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(AnnouncementRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct AnnouncementRow {
    id: Uuid,
    topic: String,
    message: String,
    recipients: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

impl AnnouncementRow {
    fn into_record(self) -> AnnouncementRecord {
        AnnouncementRecord {
            id: AnnouncementId(self.id),
            topic: self.topic,
            message: self.message,
            recipients: self.recipients.into_iter().map(EmployeeId).collect(),
            created_at: Timestamp::from_utc(self.created_at),
        }
    }
}
