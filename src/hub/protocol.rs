//! Inbound client command protocol.
//!
//! Clients speak a small JSON protocol over text frames to manage their ad-hoc
//! group memberships. Pushed notifications go the other way as opaque text
//! frames and are not part of this protocol.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use crate::hub::registry::ConnectionRegistry;
use crate::hub::ConnectionSender;

/// Group key prefixes managed exclusively by the registry at connect time.
/// Clients may not join or leave these.
const RESERVED_PREFIXES: [&str; 2] = ["user:", "role:"];

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    JoinGroup { group: String },
    LeaveGroup { group: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerReply {
    Ack { action: &'static str, group: String },
    Error { message: String },
}

/// Handle one text frame from a client: parse, validate, apply, reply.
/// All failures are answered on the client's own channel and logged; nothing
/// propagates to the actor.
pub fn handle_client_command(
    text: &str,
    connection_id: &str,
    tx: &ConnectionSender,
    registry: &ConnectionRegistry,
) {
    let command = match serde_json::from_str::<ClientCommand>(text) {
        Ok(command) => command,
        Err(e) => {
            tracing::debug!(
                connection_id = %connection_id,
                error = %e,
                "unparseable client command"
            );
            send_reply(
                tx,
                &ServerReply::Error {
                    message: "unrecognized command".to_string(),
                },
            );
            return;
        }
    };

    match command {
        ClientCommand::JoinGroup { group } => match validate_group_name(&group) {
            Ok(()) => {
                registry.join_group(connection_id, &group);
                tracing::debug!(connection_id = %connection_id, group = %group, "joined group");
                send_reply(tx, &ServerReply::Ack { action: "join_group", group });
            }
            Err(message) => send_reply(tx, &ServerReply::Error { message }),
        },
        ClientCommand::LeaveGroup { group } => match validate_group_name(&group) {
            Ok(()) => {
                registry.leave_group(connection_id, &group);
                tracing::debug!(connection_id = %connection_id, group = %group, "left group");
                send_reply(tx, &ServerReply::Ack { action: "leave_group", group });
            }
            Err(message) => send_reply(tx, &ServerReply::Error { message }),
        },
    }
}

fn validate_group_name(group: &str) -> Result<(), String> {
    if group.trim().is_empty() {
        return Err("group name must not be empty".to_string());
    }
    for prefix in RESERVED_PREFIXES {
        if group.starts_with(prefix) {
            return Err(format!("'{prefix}*' groups are assigned by the server"));
        }
    }
    Ok(())
}

fn send_reply(tx: &ConnectionSender, reply: &ServerReply) {
    match serde_json::to_string(reply) {
        // Channel closed means the connection is tearing down; nothing to do.
        Ok(json) => {
            let _ = tx.send(Message::Text(json.into()));
        }
        Err(e) => tracing::error!(error = %e, "failed to serialize server reply"),
    }
}
