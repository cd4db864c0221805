use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::{parse_id, parse_id_or, AppJson};
use crate::error::{AppError, AppResult};
use crate::middleware::{AuthUser, Capability};
use crate::models::{EventUpdate, NewEvent, Speaker, UserSummary};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/attendee-counts", get(attendee_counts))
        .route(
            "/events/organizer/{organizer_id}/attendee-counts",
            get(organizer_attendee_counts),
        )
        .route("/events/organizer/{organizer_id}", get(organizer_events))
        .route("/events/{event_id}/register", post(register_attendee))
        .route("/events/{event_id}/attendees", get(event_attendees))
        .route(
            "/events/{event_id}",
            get(get_event).put(update_event).delete(delete_event),
        )
}

fn event_not_found() -> AppError {
    AppError::not_found("Event not found")
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateEventRequest {
    #[validate(required(message = "Name is required"), length(min = 1, message = "Name is required"))]
    name: Option<String>,
    #[validate(required(message = "Date is required"))]
    date: Option<DateTime<Utc>>,
    #[validate(required(message = "Venue is required"), length(min = 1, message = "Venue is required"))]
    venue: Option<String>,
    description: Option<String>,
    #[serde(default)]
    speakers: Vec<Speaker>,
    #[validate(
        required(message = "Tickets available is required"),
        range(min = 0, message = "Tickets available cannot be negative")
    )]
    tickets_available: Option<i32>,
    #[serde(rename = "imageURL")]
    #[validate(required(message = "Image URL is required"), length(min = 1, message = "Image URL is required"))]
    image_url: Option<String>,
    #[validate(
        required(message = "Price is required"),
        range(min = 0.0, message = "Price cannot be negative")
    )]
    price: Option<f64>,
}

// POST /api/events
async fn create_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<CreateEventRequest>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::CreateEvent)?;
    req.validate()?;

    // После validate() все обязательные поля на месте
    let (Some(name), Some(date), Some(venue), Some(tickets_available), Some(image_url), Some(price)) = (
        req.name,
        req.date,
        req.venue,
        req.tickets_available,
        req.image_url,
        req.price,
    ) else {
        return Err(AppError::validation("All required event fields must be provided"));
    };

    let event = state
        .store
        .insert_event(NewEvent {
            name,
            date,
            venue,
            description: req.description,
            speakers: req.speakers,
            tickets_available,
            image_url,
            organizer: user.id,
            price,
        })
        .await?;
    state.cache.invalidate_events().await;

    info!(event_id = %event.id, organizer_id = %user.id, "Event created");
    Ok((StatusCode::CREATED, Json(event)))
}

// GET /api/events
async fn list_events(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    Ok(Json(state.cache.get_events().await?))
}

// GET /api/events/:id
async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let event_id = parse_id(&event_id)?;
    let event = state
        .store
        .find_event(event_id)
        .await?
        .ok_or_else(event_not_found)?;
    Ok(Json(event))
}

// PUT /api/events/:id
async fn update_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(event_id): Path<String>,
    AppJson(update): AppJson<EventUpdate>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::UpdateEvent)?;
    let event_id = parse_id(&event_id)?;
    update.validate()?;

    let event = state
        .store
        .update_event(event_id, update)
        .await?
        .ok_or_else(event_not_found)?;
    state.cache.invalidate_events().await;

    Ok(Json(event))
}

// DELETE /api/events/:id
async fn delete_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(event_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::DeleteEvent)?;
    let event_id = parse_id(&event_id)?;

    if !state.store.delete_event(event_id).await? {
        return Err(event_not_found());
    }
    state.cache.invalidate_events().await;

    info!(%event_id, deleted_by = %user.id, "Event deleted");
    Ok(Json(json!({ "message": "Event deleted successfully" })))
}

// POST /api/events/:eventId/register
async fn register_attendee(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(event_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::RegisterForEvent)?;
    let event_id = parse_id(&event_id)?;

    // Повторная регистрация не проверяется
    let event = state
        .store
        .add_event_attendee(event_id, user.id)
        .await?
        .ok_or_else(event_not_found)?;
    state.cache.invalidate_events().await;

    state.notifier.notify(
        user.id,
        format!("You have successfully booked the event: {}", event.name),
        Some(event.id),
    );
    state.notifier.notify(
        event.organizer,
        format!("User {} has booked the event: {}", user.name, event.name),
        Some(event.id),
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Successfully registered for the event" })),
    ))
}

// GET /api/events/:eventId/attendees
async fn event_attendees(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(event_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::ViewEventAttendees)?;
    let event_id = parse_id(&event_id)?;

    let event = state
        .store
        .find_event(event_id)
        .await?
        .ok_or_else(event_not_found)?;

    // Порядок и повторы как в списке attendees; удаленные пользователи пропускаются
    let users: HashMap<_, _> = state
        .store
        .find_users(&event.attendees)
        .await?
        .into_iter()
        .map(|u| (u.id, UserSummary::from(&u)))
        .collect();
    let attendees: Vec<UserSummary> = event
        .attendees
        .iter()
        .filter_map(|id| users.get(id).cloned())
        .collect();

    Ok(Json(attendees))
}

#[derive(Debug, Serialize)]
struct EventAttendeeCount {
    name: String,
    attendees: i64,
    organizer: String,
}

// GET /api/events/attendee-counts
async fn attendee_counts(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let counts = state.store.ticket_counts_by_event().await?;
    let event_ids: Vec<_> = counts.iter().map(|(id, _)| *id).collect();

    let events: HashMap<_, _> = state
        .store
        .find_events(&event_ids)
        .await?
        .into_iter()
        .map(|e| (e.id, e))
        .collect();
    let organizer_ids: Vec<_> = events.values().map(|e| e.organizer).collect();
    let organizers: HashMap<_, _> = state
        .store
        .find_users(&organizer_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();

    // Билеты удаленных событий не учитываются
    let result: Vec<EventAttendeeCount> = counts
        .into_iter()
        .filter_map(|(event_id, attendees)| {
            let event = events.get(&event_id)?;
            Some(EventAttendeeCount {
                name: event.name.clone(),
                attendees,
                organizer: organizers
                    .get(&event.organizer)
                    .cloned()
                    .unwrap_or_else(|| "Organizer Not Found".to_string()),
            })
        })
        .collect();

    Ok(Json(result))
}

#[derive(Debug, Serialize)]
struct NameValue {
    name: String,
    value: i64,
}

// GET /api/events/organizer/:organizerId/attendee-counts
async fn organizer_attendee_counts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(organizer_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::ViewOrganizerEvents)?;
    let organizer_id = parse_id_or(&organizer_id, "Invalid organizer ID")?;

    let events = state.store.list_events_by_organizer(organizer_id).await?;
    let names: HashMap<_, _> = events.iter().map(|e| (e.id, e.name.clone())).collect();

    // Группировка по названию: одноименные события складываются
    let mut result: Vec<NameValue> = Vec::new();
    for (event_id, count) in state.store.ticket_counts_by_event().await? {
        let Some(name) = names.get(&event_id) else { continue };
        match result.iter_mut().find(|entry| &entry.name == name) {
            Some(entry) => entry.value += count,
            None => result.push(NameValue {
                name: name.clone(),
                value: count,
            }),
        }
    }

    Ok(Json(result))
}

// GET /api/events/organizer/:organizerId
async fn organizer_events(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(organizer_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::ViewOrganizerEvents)?;
    let organizer_id = parse_id_or(&organizer_id, "Invalid organizer ID")?;
    Ok(Json(state.store.list_events_by_organizer(organizer_id).await?))
}
