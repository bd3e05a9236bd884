//! Notification lifecycle service.
//!
//! `create_notification` persists first — the persistence outcome is what the
//! caller sees, always. Only afterwards, and only for notifications that need
//! immediacy, it enqueues a live push and hands the email side-channel an
//! attempt. Neither of those can fail the create.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::hub::worker::NotificationHub;
use crate::notify::email::EmailSender;
use crate::notify::store::{NotificationStore, StoreError};
use crate::notify::{NewNotification, NotificationRecord, NotificationType};

pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    mailer: Arc<dyn EmailSender>,
    hub: NotificationHub,
    /// Near-future window within which a scheduled reminder is pushed
    /// immediately instead of being left to the external scheduler.
    reminder_window: Duration,
}

/// Whether a notification should be pushed (and emailed) at creation time.
/// Every type is immediate except reminders scheduled beyond the window;
/// those are persisted and picked up later by the scheduler, which re-enters
/// this same path when they come due.
pub fn should_send_now(
    kind: NotificationType,
    scheduled_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: Duration,
) -> bool {
    match kind {
        NotificationType::Reminder => match scheduled_at {
            Some(at) => at <= now + window,
            // An unscheduled reminder has nothing to wait for.
            None => true,
        },
        _ => true,
    }
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        mailer: Arc<dyn EmailSender>,
        hub: NotificationHub,
        reminder_window_mins: i64,
    ) -> Self {
        Self {
            store,
            mailer,
            hub,
            reminder_window: Duration::minutes(reminder_window_mins),
        }
    }

    /// Persist a notification and, when it needs immediacy, push it live and
    /// trigger the email fallback. Returns the stored record; `sent_at` is
    /// set iff a push was attempted.
    pub async fn create_notification(
        &self,
        new: NewNotification,
    ) -> Result<NotificationRecord, StoreError> {
        let created_at = Utc::now();

        let store = self.store.clone();
        let request = new.clone();
        let mut record =
            tokio::task::spawn_blocking(move || store.create(&request, created_at))
                .await
                .map_err(|e| Box::new(e) as StoreError)??;

        if !should_send_now(
            record.notification_type,
            record.scheduled_at,
            created_at,
            self.reminder_window,
        ) {
            tracing::debug!(
                id = record.id,
                user_id = record.user_id,
                scheduled_at = ?record.scheduled_at,
                "notification deferred to scheduler"
            );
            return Ok(record);
        }

        // Best-effort from here on: the record above is the guarantee.
        let sent_at = Utc::now();
        record.sent_at = Some(sent_at);

        match serde_json::to_string(&record) {
            Ok(payload) => self.hub.send_to_user(record.user_id, payload),
            Err(e) => tracing::error!(id = record.id, error = %e, "record serialization failed"),
        }

        let store = self.store.clone();
        let id = record.id;
        let stamp = tokio::task::spawn_blocking(move || store.mark_sent(id, sent_at))
            .await
            .map_err(|e| Box::new(e) as StoreError)
            .and_then(|r| r);
        if let Err(e) = stamp {
            tracing::warn!(id = record.id, error = %e, "failed to stamp sent_at");
        }

        let mailer = self.mailer.clone();
        let (user_id, title, message) =
            (record.user_id, record.title.clone(), record.message.clone());
        let mailed =
            tokio::task::spawn_blocking(move || mailer.send(user_id, &title, &message)).await;
        match mailed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(id = record.id, user_id = record.user_id, error = %e,
                    "email side-channel failed")
            }
            Err(e) => tracing::warn!(id = record.id, error = %e, "email task panicked"),
        }

        Ok(record)
    }

    pub async fn get_user_notifications(
        &self,
        user_id: i64,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.list_for_user(user_id))
            .await
            .map_err(|e| Box::new(e) as StoreError)?
    }

    pub async fn mark_as_read(&self, user_id: i64, id: i64) -> Result<bool, StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.mark_read(user_id, id))
            .await
            .map_err(|e| Box::new(e) as StoreError)?
    }

    pub async fn delete_notification(&self, user_id: i64, id: i64) -> Result<bool, StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.delete(user_id, id))
            .await
            .map_err(|e| Box::new(e) as StoreError)?
    }
}
