//! Event dispatcher: resolves a tagged notification event to the set of live
//! connections that should receive it and delivers the payload to each one
//! independently.
//!
//! Delivery is best-effort by design. The durable notification record created
//! upstream is the guarantee; a recipient that is offline or mid-teardown is
//! normal, never an error. Pushing into a connection's channel cannot block —
//! the actual socket write happens in that connection's writer task, which
//! bounds it with its own timeout.

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::hub::registry::ConnectionRegistry;
use crate::hub::{group_key_for_role, group_key_for_user};

/// A transient notification event. The payload is an opaque, already
/// serialized unit; the dispatcher never looks inside it.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    UserTargeted {
        user_id: i64,
        payload: Arc<str>,
        timestamp: DateTime<Utc>,
    },
    RoleTargeted {
        role: String,
        payload: Arc<str>,
        timestamp: DateTime<Utc>,
    },
    Broadcast {
        payload: Arc<str>,
        timestamp: DateTime<Utc>,
    },
    GroupTargeted {
        group: String,
        payload: Arc<str>,
        timestamp: DateTime<Utc>,
    },
}

impl NotificationEvent {
    pub fn user_targeted(user_id: i64, payload: impl Into<Arc<str>>) -> Self {
        Self::UserTargeted {
            user_id,
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn role_targeted(role: impl Into<String>, payload: impl Into<Arc<str>>) -> Self {
        Self::RoleTargeted {
            role: role.into(),
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn broadcast(payload: impl Into<Arc<str>>) -> Self {
        Self::Broadcast {
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn group_targeted(group: impl Into<String>, payload: impl Into<Arc<str>>) -> Self {
        Self::GroupTargeted {
            group: group.into(),
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            Self::UserTargeted { payload, .. }
            | Self::RoleTargeted { payload, .. }
            | Self::Broadcast { payload, .. }
            | Self::GroupTargeted { payload, .. } => payload,
        }
    }

    /// Short label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserTargeted { .. } => "user",
            Self::RoleTargeted { .. } => "role",
            Self::Broadcast { .. } => "broadcast",
            Self::GroupTargeted { .. } => "group",
        }
    }

    /// Reject events with no resolvable target before they reach the queue.
    pub fn validate(&self) -> Result<(), DispatchError> {
        match self {
            Self::UserTargeted { user_id, .. } if *user_id <= 0 => Err(
                DispatchError::InvalidTarget(format!("user id must be positive, got {user_id}")),
            ),
            Self::RoleTargeted { role, .. } if role.trim().is_empty() => Err(
                DispatchError::InvalidTarget("role must not be empty".to_string()),
            ),
            Self::GroupTargeted { group, .. } if group.trim().is_empty() => Err(
                DispatchError::InvalidTarget("group name must not be empty".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

/// Synchronous rejection of a malformed event. Per-recipient delivery
/// failures never surface here.
#[derive(Debug)]
pub enum DispatchError {
    InvalidTarget(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTarget(reason) => write!(f, "invalid event target: {reason}"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Per-event outcome counts. An empty target set is a success with
/// `targets == 0` — the addressee being offline is the expected case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub targets: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Resolves events against the registry and pushes to each recipient.
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn dispatch(&self, event: &NotificationEvent) -> Result<DispatchReceipt, DispatchError> {
        event.validate()?;

        let targets = self.resolve(event);
        let mut receipt = DispatchReceipt {
            targets: targets.len(),
            ..Default::default()
        };

        for connection_id in &targets {
            match self.registry.sender(connection_id) {
                Some(sender) => {
                    // Each push is independent: one closed channel never
                    // aborts delivery to the remaining recipients.
                    if sender.send(Message::Text(event.payload().into())).is_ok() {
                        receipt.delivered += 1;
                    } else {
                        receipt.failed += 1;
                        tracing::debug!(
                            connection_id = %connection_id,
                            kind = event.kind(),
                            "recipient channel closed mid-dispatch"
                        );
                    }
                }
                None => {
                    // Resolved id disconnected between resolution and push.
                    receipt.failed += 1;
                    tracing::debug!(
                        connection_id = %connection_id,
                        kind = event.kind(),
                        "recipient disconnected before delivery"
                    );
                }
            }
        }

        Ok(receipt)
    }

    fn resolve(&self, event: &NotificationEvent) -> Vec<String> {
        match event {
            NotificationEvent::UserTargeted { user_id, .. } => self
                .registry
                .members(&group_key_for_user(*user_id))
                .into_iter()
                .collect(),
            NotificationEvent::RoleTargeted { role, .. } => self
                .registry
                .members(&group_key_for_role(role))
                .into_iter()
                .collect(),
            NotificationEvent::Broadcast { .. } => self.registry.connection_ids(),
            NotificationEvent::GroupTargeted { group, .. } => {
                self.registry.members(group).into_iter().collect()
            }
        }
    }
}
