pub mod actor;
pub mod admin;
pub mod dispatcher;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod status;
pub mod worker;

use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Group key for a user's personal group. Every authenticated connection of
/// the same user lands in the same group, so a user-targeted event reaches
/// all of their open tabs/devices.
pub fn group_key_for_user(user_id: i64) -> String {
    format!("user:{}", user_id)
}

/// Group key for a role group. Role names are matched case-insensitively,
/// so "Doctor" and "doctor" address the same group.
pub fn group_key_for_role(role: &str) -> String {
    format!("role:{}", role.to_lowercase())
}
