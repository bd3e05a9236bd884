//! Read-only hub introspection for operational queries.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::hub::registry::ConnectionRegistry;

/// Aggregate view over the registry and group index.
#[derive(Debug, Clone, Serialize)]
pub struct HubStatus {
    pub total_connections: usize,
    /// Distinct authenticated user ids (two tabs of one user count once).
    pub authenticated_users: usize,
    pub anonymous_connections: usize,
    /// Authenticated connections per role.
    pub role_distribution: BTreeMap<String, usize>,
    /// Group keys with at least one live member, sorted.
    pub active_groups: Vec<String>,
    /// Live connection count per authenticated user id.
    pub connections_per_user: BTreeMap<i64, usize>,
}

/// Compute the current status in a single pass over one registry snapshot,
/// so no connection is double-counted within one result.
pub fn hub_status(registry: &ConnectionRegistry) -> HubStatus {
    let snapshot = registry.snapshot();

    let mut users = HashSet::new();
    let mut anonymous = 0usize;
    let mut role_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut connections_per_user: BTreeMap<i64, usize> = BTreeMap::new();

    for info in &snapshot {
        if info.is_authenticated {
            *role_distribution.entry(info.role.clone()).or_default() += 1;
            // user_id is None here only when the registry was fed a claim it
            // filtered out; such a connection is still not anonymous.
            if let Some(uid) = info.user_id {
                users.insert(uid);
                *connections_per_user.entry(uid).or_default() += 1;
            }
        } else {
            anonymous += 1;
        }
    }

    HubStatus {
        total_connections: snapshot.len(),
        authenticated_users: users.len(),
        anonymous_connections: anonymous,
        role_distribution,
        active_groups: registry.active_groups(),
        connections_per_user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::ConnectionSender;
    use tokio::sync::mpsc;

    fn sender() -> ConnectionSender {
        let (tx, _rx) = mpsc::unbounded_channel();
        tx
    }

    #[test]
    fn single_doctor_scenario() {
        let registry = ConnectionRegistry::new();
        registry.connect("c1", sender(), Some(7), "Doctor", true);

        let status = hub_status(&registry);
        assert_eq!(status.total_connections, 1);
        assert_eq!(status.authenticated_users, 1);
        assert_eq!(status.anonymous_connections, 0);
        assert_eq!(status.role_distribution.get("Doctor"), Some(&1));
        assert_eq!(status.connections_per_user.get(&7), Some(&1));
        assert!(status.active_groups.contains(&"user:7".to_string()));

        registry.disconnect("c1");
        let status = hub_status(&registry);
        assert_eq!(status.total_connections, 0);
        assert_eq!(status.authenticated_users, 0);
        assert!(status.role_distribution.is_empty());
        assert!(status.active_groups.is_empty());
        assert!(status.connections_per_user.is_empty());
    }

    #[test]
    fn two_tabs_count_as_one_user() {
        let registry = ConnectionRegistry::new();
        registry.connect("tab1", sender(), Some(5), "Patient", true);
        registry.connect("tab2", sender(), Some(5), "Patient", true);
        registry.connect("anon", sender(), None, "Anonymous", false);

        let status = hub_status(&registry);
        assert_eq!(status.total_connections, 3);
        assert_eq!(status.authenticated_users, 1);
        assert_eq!(status.anonymous_connections, 1);
        assert_eq!(status.connections_per_user.get(&5), Some(&2));
        assert_eq!(status.role_distribution.get("Patient"), Some(&2));
    }

    #[test]
    fn authenticated_without_uid_is_not_anonymous() {
        let registry = ConnectionRegistry::new();
        // The registry drops a non-positive uid but keeps the auth flag.
        registry.connect("c1", sender(), Some(0), "Nurse", true);

        let status = hub_status(&registry);
        assert_eq!(status.anonymous_connections, 0);
        assert_eq!(status.role_distribution.get("Nurse"), Some(&1));
        assert_eq!(status.authenticated_users, 0);
        assert!(status.connections_per_user.is_empty());
    }
}
