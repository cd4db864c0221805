use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::{parse_id, AppJson};
use crate::error::{AppError, AppResult};
use crate::models::{FeedbackAuthor, FeedbackView, NewFeedback};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/feedback/add-feedback", post(add_feedback))
        .route("/feedback/{event_id}", get(event_feedback))
}

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedbackRequest {
    event_id: Option<String>,
    user_id: Option<String>,
    feedback_text: Option<String>,
    rating: Option<i64>,
}

// POST /api/feedback/add-feedback
async fn add_feedback(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<FeedbackRequest>,
) -> AppResult<impl IntoResponse> {
    // Пустые значения и нулевой рейтинг считаются отсутствующими
    let (Some(event_id), Some(user_id), Some(feedback_text), Some(rating)) = (
        req.event_id.filter(|v| !v.is_empty()),
        req.user_id.filter(|v| !v.is_empty()),
        req.feedback_text.filter(|v| !v.trim().is_empty()),
        req.rating.filter(|r| *r != 0),
    ) else {
        return Err(AppError::validation("All fields are required"));
    };

    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::validation("Rating must be between 1 and 5"));
    }
    let event_id = parse_id(&event_id)?;
    let user_id = parse_id(&user_id)?;

    let duplicate = || AppError::Duplicate("You have already submitted feedback for this event.".to_string());
    if state.store.has_feedback(event_id, user_id).await? {
        return Err(duplicate());
    }

    // Гонку между проверкой и вставкой закрывает уникальный индекс (Conflict -> Duplicate)
    let feedback = state
        .store
        .insert_feedback(NewFeedback {
            event_id,
            user_id,
            feedback_text,
            rating: rating as i16,
        })
        .await?;

    info!(feedback_id = %feedback.id, %event_id, %user_id, rating, "Feedback added");
    Ok((StatusCode::CREATED, Json(feedback)))
}

// GET /api/feedback/:eventId
async fn event_feedback(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let event_id = parse_id(&event_id)?;
    let feedback = state.store.feedback_for_event(event_id).await?;

    let author_ids: Vec<_> = feedback.iter().map(|f| f.user_id).collect();
    let authors: HashMap<_, _> = state
        .store
        .find_users(&author_ids)
        .await?
        .into_iter()
        .map(|u| {
            (
                u.id,
                FeedbackAuthor {
                    id: u.id,
                    name: u.name,
                },
            )
        })
        .collect();

    let views: Vec<FeedbackView> = feedback
        .into_iter()
        .map(|f| {
            let author = authors.get(&f.user_id).cloned();
            FeedbackView::new(f, author)
        })
        .collect();

    Ok(Json(views))
}
