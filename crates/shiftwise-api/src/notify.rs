//! # Notifications
//!
//! Fire-and-forget in-app messages. [`Notifier::emit`] records the message
//! in memory immediately and writes it through to Postgres on a background
//! task. A failed write is logged and never propagates to the operation
//! that triggered it.

use sqlx::PgPool;

use shiftwise_core::{EmployeeId, NotificationId, Timestamp};

use crate::state::{NotificationKind, NotificationRecord, Store};

/// Emits and serves notifications.
#[derive(Debug, Clone)]
pub struct Notifier {
    store: Store<NotificationId, NotificationRecord>,
    pool: Option<PgPool>,
}

impl Notifier {
    pub fn new(pool: Option<PgPool>) -> Self {
        Self {
            store: Store::new(),
            pool,
        }
    }

    /// Queue a message for `recipient`.
    ///
    /// Messages addressed to [`EmployeeId::SYSTEM`] are dropped.
    pub fn emit(&self, recipient: EmployeeId, kind: NotificationKind, message: impl Into<String>) {
        if recipient.is_system() {
            return;
        }
        let record = NotificationRecord {
            id: NotificationId::new(),
            recipient,
            kind,
            message: message.into(),
            is_read: false,
            created_at: Timestamp::now(),
        };
        self.store.insert(record.id, record.clone());
        tracing::debug!(notification_id = %record.id, %recipient, kind = kind.as_str(), "notification emitted");

        if let Some(pool) = self.pool.clone() {
            // Outside a runtime (e.g. synchronous tests) the in-memory copy is all there is.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = crate::db::notifications::insert(&pool, &record).await {
                        tracing::warn!(
                            notification_id = %record.id,
                            error = %e,
                            "failed to persist notification"
                        );
                    }
                });
            }
        }
    }

    /// Notifications for `recipient`, newest first.
    pub fn for_recipient(&self, recipient: EmployeeId) -> Vec<NotificationRecord> {
        let mut items = self.store.filter(|n| n.recipient == recipient);
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items
    }

    pub fn get(&self, id: NotificationId) -> Option<NotificationRecord> {
        self.store.get(&id)
    }

    /// Mark a notification read. Idempotent; `None` if it does not exist.
    pub async fn mark_read(
        &self,
        id: NotificationId,
    ) -> Result<Option<NotificationRecord>, sqlx::Error> {
        let Some(record) = self.store.update(&id, |n| n.is_read = true) else {
            return Ok(None);
        };
        if let Some(pool) = &self.pool {
            crate::db::notifications::mark_read(pool, id).await?;
        }
        Ok(Some(record))
    }

    /// Load persisted notifications. Returns how many were loaded.
    pub async fn hydrate(&self, pool: &PgPool) -> Result<usize, sqlx::Error> {
        let records = crate::db::notifications::load_all(pool).await?;
        let count = records.len();
        for record in records {
            self.store.insert(record.id, record);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitted_messages_are_listed_newest_first() {
        let notifier = Notifier::new(None);
        let me = EmployeeId::new();
        notifier.emit(me, NotificationKind::Shift, "first");
        std::thread::sleep(std::time::Duration::from_millis(2));
        notifier.emit(me, NotificationKind::Swap, "second");
        notifier.emit(EmployeeId::new(), NotificationKind::Leave, "not mine");

        let mine = notifier.for_recipient(me);
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].message, "second");
        assert!(mine.iter().all(|n| !n.is_read));
    }

    #[test]
    fn system_recipient_is_dropped() {
        let notifier = Notifier::new(None);
        notifier.emit(EmployeeId::SYSTEM, NotificationKind::CoverUp, "nobody");
        assert!(notifier.for_recipient(EmployeeId::SYSTEM).is_empty());
    }

    #[tokio::test]
    async fn mark_read_is_idempotent() {
        let notifier = Notifier::new(None);
        let me = EmployeeId::new();
        notifier.emit(me, NotificationKind::Leave, "approved");
        let id = notifier.for_recipient(me)[0].id;

        assert!(notifier.mark_read(id).await.unwrap().unwrap().is_read);
        assert!(notifier.mark_read(id).await.unwrap().unwrap().is_read);
        assert!(notifier
            .mark_read(NotificationId::new())
            .await
            .unwrap()
            .is_none());
    }
}
