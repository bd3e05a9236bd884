//! Connection registry and group membership index.
//!
//! The registry is the authoritative in-memory map of live WebSocket
//! connections. The group index (group key -> connection ids) is derived from
//! it and maintained in lock-step: it must never contain a connection id that
//! the registry no longer knows about.
//!
//! Both maps are DashMaps, so concurrent callers contend per shard, never on
//! a single global lock. The registry is constructed once at process start and
//! handed to callers through `AppState` — there is no process-wide static.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{BTreeSet, HashSet};

use crate::hub::{group_key_for_role, group_key_for_user, ConnectionSender};

/// Metadata tracked for one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Opaque unique id assigned at connect time; the only stable handle.
    pub connection_id: String,
    /// Authenticated user id, None for anonymous connections.
    pub user_id: Option<i64>,
    /// Role claim, "Anonymous" when unauthenticated.
    pub role: String,
    pub connected_at: DateTime<Utc>,
    pub is_authenticated: bool,
    /// Group keys this connection currently belongs to. At most one `user:*`
    /// and one `role:*` key (assigned at connect), any number of ad-hoc keys.
    pub groups: BTreeSet<String>,
}

struct ConnectionEntry {
    info: ConnectionInfo,
    sender: ConnectionSender,
}

/// Registry of live connections plus the derived group membership index.
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionEntry>,
    groups: DashMap<String, HashSet<String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            groups: DashMap::new(),
        }
    }

    /// Register a new connection and index its default groups
    /// (`user:{id}` when authenticated with a positive id, `role:{role}` when
    /// a role is present). Returns the stored info.
    pub fn connect(
        &self,
        connection_id: &str,
        sender: ConnectionSender,
        user_id: Option<i64>,
        role: &str,
        is_authenticated: bool,
    ) -> ConnectionInfo {
        let user_id = if is_authenticated {
            user_id.filter(|id| *id > 0)
        } else {
            None
        };

        let mut groups = BTreeSet::new();
        if let Some(uid) = user_id {
            groups.insert(group_key_for_user(uid));
        }
        if !role.is_empty() {
            groups.insert(group_key_for_role(role));
        }

        let info = ConnectionInfo {
            connection_id: connection_id.to_string(),
            user_id,
            role: role.to_string(),
            connected_at: Utc::now(),
            is_authenticated,
            groups: groups.clone(),
        };

        self.connections.insert(
            connection_id.to_string(),
            ConnectionEntry {
                info: info.clone(),
                sender,
            },
        );
        for key in &groups {
            self.groups
                .entry(key.clone())
                .or_default()
                .insert(connection_id.to_string());
        }

        tracing::debug!(
            connection_id = %connection_id,
            user_id = ?user_id,
            role = %role,
            "connection registered"
        );
        info
    }

    /// Remove a connection and sweep it out of every group it belonged to.
    /// Unknown ids are a no-op returning None — disconnecting twice is normal
    /// when the transport and the actor race on teardown.
    pub fn disconnect(&self, connection_id: &str) -> Option<ConnectionInfo> {
        let Some((_, entry)) = self.connections.remove(connection_id) else {
            tracing::debug!(connection_id = %connection_id, "disconnect for unknown connection");
            return None;
        };

        for key in &entry.info.groups {
            self.remove_member(key, connection_id);
        }

        tracing::debug!(
            connection_id = %connection_id,
            user_id = ?entry.info.user_id,
            "connection removed"
        );
        Some(entry.info)
    }

    pub fn get(&self, connection_id: &str) -> Option<ConnectionInfo> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.info.clone())
    }

    /// All live connections for one user. A user can hold several at once
    /// (multiple tabs/devices).
    pub fn list_by_user(&self, user_id: i64) -> Vec<ConnectionInfo> {
        self.members(&group_key_for_user(user_id))
            .into_iter()
            .filter_map(|id| self.get(&id))
            .collect()
    }

    /// Add a connection to an ad-hoc group. Idempotent; a join for an unknown
    /// connection id is a logged no-op — group membership is only meaningful
    /// for a live connection.
    pub fn join_group(&self, connection_id: &str, group_key: &str) {
        {
            let Some(mut entry) = self.connections.get_mut(connection_id) else {
                tracing::debug!(
                    connection_id = %connection_id,
                    group = %group_key,
                    "join for unknown connection"
                );
                return;
            };
            entry.info.groups.insert(group_key.to_string());
        }

        self.groups
            .entry(group_key.to_string())
            .or_default()
            .insert(connection_id.to_string());

        // A disconnect may have raced between the two inserts above. Its
        // sweep only covers groups it saw in the connection's own set, so
        // re-check and undo the index insert if the connection is gone.
        if !self.connections.contains_key(connection_id) {
            self.remove_member(group_key, connection_id);
        }
    }

    /// Remove a connection from an ad-hoc group. No-op if it was not a member
    /// or the connection is unknown.
    pub fn leave_group(&self, connection_id: &str, group_key: &str) {
        let Some(mut entry) = self.connections.get_mut(connection_id) else {
            tracing::debug!(
                connection_id = %connection_id,
                group = %group_key,
                "leave for unknown connection"
            );
            return;
        };
        entry.info.groups.remove(group_key);
        drop(entry);

        self.remove_member(group_key, connection_id);
    }

    /// Current members of a group. Unknown groups yield an empty set.
    pub fn members(&self, group_key: &str) -> HashSet<String> {
        self.groups
            .get(group_key)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    /// Every live connection id (broadcast target set).
    pub fn connection_ids(&self) -> Vec<String> {
        self.connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Clone of the sender channel for one connection, if still live.
    pub fn sender(&self, connection_id: &str) -> Option<ConnectionSender> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.sender.clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// One-pass clone of every connection's info, for status aggregation.
    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        self.connections
            .iter()
            .map(|entry| entry.info.clone())
            .collect()
    }

    /// Keys of all groups that currently have at least one member, sorted.
    pub fn active_groups(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .groups
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    fn remove_member(&self, group_key: &str, connection_id: &str) {
        let now_empty = match self.groups.get_mut(group_key) {
            Some(mut members) => {
                members.remove(connection_id);
                members.is_empty()
            }
            None => return,
        };
        if now_empty {
            // Drop empty index entries so active_groups() stays meaningful.
            self.groups.remove_if(group_key, |_, members| members.is_empty());
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
