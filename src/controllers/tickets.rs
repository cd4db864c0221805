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

use super::{parse_id, AppJson};
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{EventSummary, TicketWithEvent, UserSummary};
use crate::services::booking::{self, normalize_currency};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets/my-tickets", get(my_tickets))
        .route("/tickets/book", post(book_ticket))
        .route("/tickets/purchase", post(purchase_ticket))
        .route("/tickets/{event_id}/attendees", get(ticket_attendees))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookTicketRequest {
    event_id: String,
    #[serde(default)]
    price: f64,
}

// POST /api/tickets/book
async fn book_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<BookTicketRequest>,
) -> AppResult<impl IntoResponse> {
    let event_id = parse_id(&req.event_id)?;
    let ticket = booking::book_ticket(&state, &user, event_id, req.price).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PurchaseRequest {
    event_id: String,
    currency: Option<String>,
}

// POST /api/tickets/purchase
async fn purchase_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<PurchaseRequest>,
) -> AppResult<impl IntoResponse> {
    let event_id = parse_id(&req.event_id)?;
    let currency = normalize_currency(req.currency);

    let purchase = booking::purchase(&state, &user, event_id, &currency).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

// GET /api/tickets/my-tickets
async fn my_tickets(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let tickets = state.store.tickets_for_attendee(user.id).await?;
    if tickets.is_empty() {
        return Err(AppError::not_found("No booked events found"));
    }

    let event_ids: Vec<_> = tickets.iter().map(|t| t.event).collect();
    let events: HashMap<_, _> = state
        .store
        .find_events(&event_ids)
        .await?
        .iter()
        .map(|e| (e.id, EventSummary::from(e)))
        .collect();

    let tickets: Vec<TicketWithEvent> = tickets
        .into_iter()
        .map(|t| {
            let event = events.get(&t.event).cloned();
            TicketWithEvent::new(t, event)
        })
        .collect();

    Ok(Json(tickets))
}

// GET /api/tickets/:eventId/attendees
async fn ticket_attendees(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(event_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let event_id = parse_id(&event_id)?;
    let tickets = state.store.tickets_for_event(event_id).await?;
    if tickets.is_empty() {
        return Err(AppError::not_found("No attendees found for this event"));
    }

    let attendee_ids: Vec<_> = tickets.iter().map(|t| t.attendee).collect();
    let users: HashMap<_, _> = state
        .store
        .find_users(&attendee_ids)
        .await?
        .iter()
        .map(|u| (u.id, UserSummary::from(u)))
        .collect();

    // По одной записи на билет; удаленные пользователи - null
    let attendees: Vec<Option<UserSummary>> = tickets
        .iter()
        .map(|t| users.get(&t.attendee).cloned())
        .collect();

    Ok(Json(attendees))
}
