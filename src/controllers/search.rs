use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::AppResult;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/search", get(search_events))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    keyword: Option<String>,
}

// GET /api/search?keyword=
async fn search_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> AppResult<impl IntoResponse> {
    let events = match query.keyword.as_deref().map(str::trim) {
        Some(keyword) if !keyword.is_empty() => state.cache.search_events(keyword).await?,
        _ => state.cache.get_events().await?,
    };
    Ok(Json(events))
}
