//! Durable notification store.
//!
//! The lifecycle of the canonical record is deliberately decoupled from live
//! delivery: the hub is told about a record only after persistence succeeds,
//! and a failed push never touches the record (beyond the `sent_at` stamp
//! written on the attempt).
//!
//! The trait is synchronous and dyn-safe. Callers run it on the blocking
//! pool via `tokio::task::spawn_blocking`, same as all other DB work here.

use chrono::{DateTime, Utc};
use rusqlite::params;
use rusqlite::types::Type;
use std::sync::Mutex;

use crate::db::DbPool;
use crate::notify::{NewNotification, NotificationRecord, NotificationType};

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

pub trait NotificationStore: Send + Sync {
    /// Persist a new record, returning it with its assigned id.
    fn create(
        &self,
        new: &NewNotification,
        created_at: DateTime<Utc>,
    ) -> Result<NotificationRecord, StoreError>;

    /// All records for one user, newest first.
    fn list_for_user(&self, user_id: i64) -> Result<Vec<NotificationRecord>, StoreError>;

    /// Mark one of the user's records read. Returns false if the record does
    /// not exist or belongs to someone else.
    fn mark_read(&self, user_id: i64, id: i64) -> Result<bool, StoreError>;

    /// Delete one of the user's records. Same ownership rule as `mark_read`.
    fn delete(&self, user_id: i64, id: i64) -> Result<bool, StoreError>;

    /// Stamp the moment a live push was attempted.
    fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<(), StoreError>;
}

// --- SQLite implementation ---

pub struct SqliteStore {
    db: DbPool,
}

impl SqliteStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<NotificationRecord> {
    let type_str: String = row.get(4)?;
    let notification_type = NotificationType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("unknown notification type '{type_str}'").into(),
        )
    })?;

    Ok(NotificationRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        message: row.get(3)?,
        notification_type,
        is_read: row.get::<_, i64>(5)? != 0,
        created_at: parse_ts(row, 6)?,
        scheduled_at: parse_opt_ts(row, 7)?,
        sent_at: parse_opt_ts(row, 8)?,
        related_entity_id: row.get(9)?,
        related_entity_type: row.get(10)?,
    })
}

fn parse_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_opt_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
    }
}

const SELECT_COLUMNS: &str = "id, user_id, title, message, notification_type, is_read, \
                              created_at, scheduled_at, sent_at, related_entity_id, related_entity_type";

impl NotificationStore for SqliteStore {
    fn create(
        &self,
        new: &NewNotification,
        created_at: DateTime<Utc>,
    ) -> Result<NotificationRecord, StoreError> {
        let conn = self.db.lock().map_err(|_| "DB lock poisoned")?;
        conn.execute(
            "INSERT INTO notifications \
             (user_id, title, message, notification_type, is_read, created_at, scheduled_at, \
              related_entity_id, related_entity_type) \
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8)",
            params![
                new.user_id,
                new.title,
                new.message,
                new.notification_type.as_str(),
                created_at.to_rfc3339(),
                new.scheduled_at.map(|t| t.to_rfc3339()),
                new.related_entity_id,
                new.related_entity_type,
            ],
        )?;

        Ok(NotificationRecord {
            id: conn.last_insert_rowid(),
            user_id: new.user_id,
            title: new.title.clone(),
            message: new.message.clone(),
            notification_type: new.notification_type,
            is_read: false,
            created_at,
            scheduled_at: new.scheduled_at,
            sent_at: None,
            related_entity_id: new.related_entity_id,
            related_entity_type: new.related_entity_type.clone(),
        })
    }

    fn list_for_user(&self, user_id: i64) -> Result<Vec<NotificationRecord>, StoreError> {
        let conn = self.db.lock().map_err(|_| "DB lock poisoned")?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM notifications WHERE user_id = ?1 \
             ORDER BY created_at DESC, id DESC"
        ))?;
        let records = stmt
            .query_map([user_id], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn mark_read(&self, user_id: i64, id: i64) -> Result<bool, StoreError> {
        let conn = self.db.lock().map_err(|_| "DB lock poisoned")?;
        let changed = conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(changed > 0)
    }

    fn delete(&self, user_id: i64, id: i64) -> Result<bool, StoreError> {
        let conn = self.db.lock().map_err(|_| "DB lock poisoned")?;
        let changed = conn.execute(
            "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(changed > 0)
    }

    fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.db.lock().map_err(|_| "DB lock poisoned")?;
        conn.execute(
            "UPDATE notifications SET sent_at = ?1 WHERE id = ?2",
            params![sent_at.to_rfc3339(), id],
        )?;
        Ok(())
    }
}

// --- In-memory implementation (tests, and an injectable stand-in) ---

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_id: i64,
    records: Vec<NotificationRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationStore for MemoryStore {
    fn create(
        &self,
        new: &NewNotification,
        created_at: DateTime<Utc>,
    ) -> Result<NotificationRecord, StoreError> {
        let mut inner = self.inner.lock().map_err(|_| "store lock poisoned")?;
        inner.next_id += 1;
        let record = NotificationRecord {
            id: inner.next_id,
            user_id: new.user_id,
            title: new.title.clone(),
            message: new.message.clone(),
            notification_type: new.notification_type,
            is_read: false,
            created_at,
            scheduled_at: new.scheduled_at,
            sent_at: None,
            related_entity_id: new.related_entity_id,
            related_entity_type: new.related_entity_type.clone(),
        };
        inner.records.push(record.clone());
        Ok(record)
    }

    fn list_for_user(&self, user_id: i64) -> Result<Vec<NotificationRecord>, StoreError> {
        let inner = self.inner.lock().map_err(|_| "store lock poisoned")?;
        let mut records: Vec<_> = inner
            .records
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    fn mark_read(&self, user_id: i64, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().map_err(|_| "store lock poisoned")?;
        match inner
            .records
            .iter_mut()
            .find(|r| r.id == id && r.user_id == user_id)
        {
            Some(record) => {
                record.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, user_id: i64, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().map_err(|_| "store lock poisoned")?;
        let before = inner.records.len();
        inner.records.retain(|r| !(r.id == id && r.user_id == user_id));
        Ok(inner.records.len() < before)
    }

    fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().map_err(|_| "store lock poisoned")?;
        if let Some(record) = inner.records.iter_mut().find(|r| r.id == id) {
            record.sent_at = Some(sent_at);
        }
        Ok(())
    }
}
