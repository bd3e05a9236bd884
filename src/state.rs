use std::sync::Arc;

use crate::hub::registry::ConnectionRegistry;
use crate::hub::worker::NotificationHub;
use crate::notify::service::NotificationService;

/// Shared application state passed to all handlers via axum State extractor.
/// Everything here is constructed once in main (or a test harness) and
/// injected — no process-wide singletons. The SQLite pool lives inside the
/// notification service's store; handlers never touch it directly.
#[derive(Clone)]
pub struct AppState {
    /// JWT verification secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Live WebSocket connections and their group index
    pub registry: Arc<ConnectionRegistry>,
    /// Publish handle for the dispatch worker pool
    pub hub: NotificationHub,
    /// Notification lifecycle service (store + email + hub)
    pub notifications: Arc<NotificationService>,
}
