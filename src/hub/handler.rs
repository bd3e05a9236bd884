use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::auth::jwt;
use crate::hub::actor::{self, ConnectionIdentity};
use crate::state::AppState;

/// Query parameters for the WebSocket upgrade. The token is optional:
/// without one the connection is registered as anonymous (broadcasts still
/// reach it; user- and role-targeted events do not).
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// WebSocket close codes:
/// 4001 = token expired
/// 4002 = token invalid
const CLOSE_TOKEN_EXPIRED: u16 = 4001;
const CLOSE_TOKEN_INVALID: u16 = 4002;

/// GET /ws?token=JWT
/// WebSocket upgrade endpoint. A present-but-bad token is not silently
/// downgraded to anonymous: the upgrade completes and closes immediately
/// with a descriptive close code so clients can refresh and retry.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = params.token else {
        tracing::debug!("anonymous WebSocket connection");
        return ws.on_upgrade(move |socket| {
            actor::run_connection(socket, state, ConnectionIdentity::anonymous())
        });
    };

    match jwt::validate_access_token(&state.jwt_secret, &token) {
        // A claims uid must be a real user id; zero or negative would register
        // an authenticated connection with no user group to target.
        Ok(claims) if claims.uid > 0 => {
            tracing::info!(
                user_id = claims.uid,
                role = %claims.role,
                "WebSocket connection authenticated"
            );
            ws.on_upgrade(move |socket| {
                actor::run_connection(
                    socket,
                    state,
                    ConnectionIdentity::authenticated(claims.uid, claims.role),
                )
            })
        }
        outcome => {
            let (close_code, reason) = match outcome {
                Ok(claims) => {
                    tracing::warn!(user_id = claims.uid, "token carries non-positive uid");
                    (CLOSE_TOKEN_INVALID, "Token invalid")
                }
                Err(err) => match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        (CLOSE_TOKEN_EXPIRED, "Token expired")
                    }
                    _ => (CLOSE_TOKEN_INVALID, "Token invalid"),
                },
            };

            tracing::warn!(
                close_code = close_code,
                reason = reason,
                "WebSocket auth failed"
            );

            ws.on_upgrade(move |mut socket| async move {
                let close_frame = CloseFrame {
                    code: close_code,
                    reason: reason.into(),
                };
                let _ = socket.send(Message::Close(Some(close_frame))).await;
            })
        }
    }
}
