use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::auth::middleware::JwtSecret;
use crate::hub::{admin as hub_admin, handler as ws_handler};
use crate::notify::routes as notify_routes;
use crate::state::AppState;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // WebSocket transport
        .route("/ws", get(ws_handler::ws_upgrade))
        // Notification lifecycle
        .route(
            "/api/notifications",
            post(notify_routes::create_notification).get(notify_routes::list_notifications),
        )
        .route("/api/notifications/{id}/read", post(notify_routes::mark_read))
        .route(
            "/api/notifications/{id}",
            delete(notify_routes::delete_notification),
        )
        // Hub operations
        .route("/api/hub/status", get(hub_admin::get_hub_status))
        .route("/api/hub/broadcast", post(hub_admin::broadcast))
        .route("/api/hub/users/{user_id}", post(hub_admin::send_to_user))
        .route("/api/hub/roles/{role}", post(hub_admin::send_to_role))
        .route("/api/hub/groups/{group}", post(hub_admin::send_to_group))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}
