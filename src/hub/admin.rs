//! Operator endpoints for driving the hub directly: broadcast, targeted
//! sends, and status introspection. JWT auth required; the payload body is
//! treated as an opaque unit and forwarded as-is.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::middleware::Claims;
use crate::hub::dispatcher::NotificationEvent;
use crate::hub::status::{hub_status, HubStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PushRequest {
    pub payload: serde_json::Value,
}

/// GET /api/hub/status — Current connection/group aggregates.
pub async fn get_hub_status(State(state): State<AppState>, _claims: Claims) -> Json<HubStatus> {
    Json(hub_status(&state.registry))
}

/// POST /api/hub/broadcast — Push a payload to every live connection,
/// anonymous ones included.
pub async fn broadcast(
    State(state): State<AppState>,
    _claims: Claims,
    Json(req): Json<PushRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    publish(&state, NotificationEvent::broadcast(opaque(&req)?))
}

/// POST /api/hub/users/{user_id} — Push to every live connection of one user.
pub async fn send_to_user(
    State(state): State<AppState>,
    _claims: Claims,
    Path(user_id): Path<i64>,
    Json(req): Json<PushRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    publish(
        &state,
        NotificationEvent::user_targeted(user_id, opaque(&req)?),
    )
}

/// POST /api/hub/roles/{role} — Push to every live connection holding a role.
pub async fn send_to_role(
    State(state): State<AppState>,
    _claims: Claims,
    Path(role): Path<String>,
    Json(req): Json<PushRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    publish(&state, NotificationEvent::role_targeted(role, opaque(&req)?))
}

/// POST /api/hub/groups/{group} — Push to the members of an ad-hoc group.
pub async fn send_to_group(
    State(state): State<AppState>,
    _claims: Claims,
    Path(group): Path<String>,
    Json(req): Json<PushRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    publish(
        &state,
        NotificationEvent::group_targeted(group, opaque(&req)?),
    )
}

/// Validate synchronously, then enqueue. An event addressed to zero live
/// recipients is still accepted — offline targets are the normal case.
fn publish(
    state: &AppState,
    event: NotificationEvent,
) -> Result<StatusCode, (StatusCode, String)> {
    event
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    state.hub.publish(event);
    Ok(StatusCode::ACCEPTED)
}

fn opaque(req: &PushRequest) -> Result<String, (StatusCode, String)> {
    serde_json::to_string(&req.payload).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("unserializable payload: {e}"),
        )
    })
}
