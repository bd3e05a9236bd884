//! REST surface for the notification lifecycle.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::auth::middleware::Claims;
use crate::notify::{NewNotification, NotificationRecord};
use crate::state::AppState;

/// POST /api/notifications — Persist a notification for a user; immediate
/// types are also pushed live and emailed. The response reflects only the
/// persistence outcome.
pub async fn create_notification(
    State(state): State<AppState>,
    _claims: Claims,
    Json(req): Json<NewNotification>,
) -> Result<(StatusCode, Json<NotificationRecord>), (StatusCode, String)> {
    if req.user_id <= 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "user_id must be positive".to_string(),
        ));
    }
    if req.title.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "title must not be empty".to_string()));
    }

    let record = state
        .notifications
        .create_notification(req)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "notification create failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to store notification".to_string(),
            )
        })?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/notifications — The caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<NotificationRecord>>, (StatusCode, String)> {
    let records = state
        .notifications
        .get_user_notifications(claims.uid)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "notification list failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to load notifications".to_string(),
            )
        })?;
    Ok(Json(records))
}

/// POST /api/notifications/{id}/read — Mark one of the caller's records read.
pub async fn mark_read(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    let found = state
        .notifications
        .mark_as_read(claims.uid, id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, id, "mark-read failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to update notification".to_string(),
            )
        })?;

    if found {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "notification not found".to_string()))
    }
}

/// DELETE /api/notifications/{id} — Delete one of the caller's records.
pub async fn delete_notification(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    let found = state
        .notifications
        .delete_notification(claims.uid, id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, id, "delete failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to delete notification".to_string(),
            )
        })?;

    if found {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "notification not found".to_string()))
    }
}
