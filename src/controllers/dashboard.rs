use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::error::AppResult;
use crate::middleware::{AuthUser, Capability};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/dashboard/stats", get(dashboard_stats))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardStats {
    total_events: i64,
    // Считаются все билеты системы, а не только по событиям организатора
    total_tickets_sold: i64,
}

// GET /api/dashboard/stats
async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::ViewDashboard)?;

    let (total_events, total_tickets_sold) = futures::try_join!(
        state.store.count_events_by_organizer(user.id),
        state.store.count_tickets(),
    )?;

    Ok(Json(DashboardStats {
        total_events,
        total_tickets_sold,
    }))
}
