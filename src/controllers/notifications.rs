use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use super::parse_id;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/{notification_id}/read", patch(mark_as_read))
}

// GET /api/notifications
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.store.notifications_for_user(user.id).await?))
}

// PATCH /api/notifications/:notificationId/read
async fn mark_as_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(notification_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let notification_id = parse_id(&notification_id)?;

    // Повторный вызов ничего не меняет; чужие уведомления неотличимы от отсутствующих
    let notification = state
        .store
        .mark_notification_read(notification_id, user.id)
        .await?
        .ok_or_else(|| AppError::not_found("Notification not found"))?;

    Ok(Json(notification))
}

// GET /api/notifications/unread-count
async fn unread_count(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let count = state.store.count_unread_notifications(user.id).await?;
    Ok(Json(json!({ "count": count })))
}
