//! Notification persistence operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use shiftwise_core::{EmployeeId, NotificationId, Timestamp};

use super::unknown_value;
use crate::state::{NotificationKind, NotificationRecord};

pub async fn insert(pool: &PgPool, record: &NotificationRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO notifications (id, recipient_id, kind, message, is_read, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(record.id.0)
    .bind(record.recipient.0)
    .bind(record.kind.as_str())
    .bind(&record.message)
    .bind(record.is_read)
    .bind(*record.created_at.as_datetime())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn mark_read(pool: &PgPool, id: NotificationId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
        .bind(id.0)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all notifications on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<NotificationRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, NotificationRow>(
        "SELECT id, recipient_id, kind, message, is_read, created_at
         FROM notifications ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(NotificationRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    kind: String,
    message: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl NotificationRow {
    fn into_record(self) -> Result<NotificationRecord, sqlx::Error> {
        let kind = NotificationKind::parse(&self.kind)
            .ok_or_else(|| unknown_value("notifications.kind", &self.kind))?;
        Ok(NotificationRecord {
            id: NotificationId(self.id),
            recipient: EmployeeId(self.recipient_id),
            kind,
            message: self.message,
            is_read: self.is_read,
            created_at: Timestamp::from_utc(self.created_at),
        })
    }
}
