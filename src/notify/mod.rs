//! Notification domain: the durable record model, the lifecycle store, the
//! email side-channel, and the create/read/mark-read/delete service that
//! hands immediate notifications to the hub.

pub mod email;
pub mod routes;
pub mod service;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a notification. Everything except `Reminder` is pushed live
/// at creation time; reminders are gated on their schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    General,
    Appointment,
    Reminder,
    TreatmentUpdate,
    Billing,
    SystemAlert,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Appointment => "appointment",
            Self::Reminder => "reminder",
            Self::TreatmentUpdate => "treatment_update",
            Self::Billing => "billing",
            Self::SystemAlert => "system_alert",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "general" => Some(Self::General),
            "appointment" => Some(Self::Appointment),
            "reminder" => Some(Self::Reminder),
            "treatment_update" => Some(Self::TreatmentUpdate),
            "billing" => Some(Self::Billing),
            "system_alert" => Some(Self::SystemAlert),
            _ => None,
        }
    }
}

/// The canonical durable notification record. Also serialized as the live
/// push payload, so an online client sees exactly what a later poll returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub related_entity_id: Option<i64>,
    pub related_entity_type: Option<String>,
}

/// Input for creating a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub related_entity_id: Option<i64>,
    #[serde(default)]
    pub related_entity_type: Option<String>,
}
