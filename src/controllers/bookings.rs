use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{parse_id, parse_id_or, AppJson};
use crate::error::{AppError, AppResult};
use crate::middleware::{AuthUser, Capability};
use crate::models::{Booking, BookingDetails, BookingStatus, Role, UserProfile};
use crate::services::booking;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(list_bookings).post(create_booking))
        .route("/bookings/user/{user_id}", get(user_bookings))
        .route("/bookings/{id}", put(update_booking).delete(delete_booking))
}

fn booking_not_found() -> AppError {
    AppError::not_found("Booking not found")
}

// Чужие брони доступны только администратору
fn ensure_owner_or_admin(user: &AuthUser, owner: Uuid) -> AppResult<()> {
    if user.id == owner || user.role == Role::Admin {
        Ok(())
    } else {
        Err(AppError::auth("Not authorized to access this booking"))
    }
}

/// Подставляет события и пользователей в список броней.
async fn with_details(state: &AppState, bookings: Vec<Booking>) -> AppResult<Vec<BookingDetails>> {
    let event_ids: Vec<_> = bookings.iter().map(|b| b.event).collect();
    let user_ids: Vec<_> = bookings.iter().map(|b| b.user).collect();

    let events: HashMap<_, _> = state
        .store
        .find_events(&event_ids)
        .await?
        .into_iter()
        .map(|e| (e.id, e))
        .collect();
    let users: HashMap<_, _> = state
        .store
        .find_users(&user_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, UserProfile::from(&u)))
        .collect();

    Ok(bookings
        .into_iter()
        .map(|b| {
            let event = events.get(&b.event).cloned();
            let user = users.get(&b.user).cloned();
            BookingDetails::new(b, event, user)
        })
        .collect())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookingRequest {
    event: String,
    total_amount: f64,
    #[serde(default = "one")]
    number_of_tickets: i32,
}

fn one() -> i32 {
    1
}

// POST /api/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<CreateBookingRequest>,
) -> AppResult<impl IntoResponse> {
    let event_id = parse_id(&req.event)?;
    if req.number_of_tickets < 1 {
        return Err(AppError::validation("Number of tickets must be at least 1"));
    }

    let booking = booking::create_booking(
        &state,
        &user,
        event_id,
        req.total_amount,
        req.number_of_tickets,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings
async fn list_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    user.require(Capability::ListAllBookings)?;
    let bookings = state.store.list_bookings().await?;
    Ok(Json(with_details(&state, bookings).await?))
}

// GET /api/bookings/user/:userId
async fn user_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_id_or(&user_id, "Invalid userId")?;
    ensure_owner_or_admin(&user, user_id)?;

    let bookings = state.store.bookings_for_user(user_id).await?;
    if bookings.is_empty() {
        return Err(AppError::not_found("No bookings found for this user."));
    }

    Ok(Json(with_details(&state, bookings).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBookingRequest {
    payment_status: Option<BookingStatus>,
}

#[derive(Debug, Serialize)]
struct BookingUpdated {
    message: &'static str,
    booking: Booking,
}

// PUT /api/bookings/:id
async fn update_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateBookingRequest>,
) -> AppResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    let existing = state
        .store
        .find_booking(id)
        .await?
        .ok_or_else(booking_not_found)?;
    ensure_owner_or_admin(&user, existing.user)?;

    let booking = booking::update_booking_status(&state, existing, req.payment_status).await?;
    info!(booking_id = %booking.id, status = booking.payment_status.as_str(), "Booking updated");

    Ok(Json(BookingUpdated {
        message: "Booking updated successfully",
        booking,
    }))
}

// DELETE /api/bookings/:id
async fn delete_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    let existing = state
        .store
        .find_booking(id)
        .await?
        .ok_or_else(booking_not_found)?;
    ensure_owner_or_admin(&user, existing.user)?;

    if !state.store.delete_booking(id).await? {
        return Err(booking_not_found());
    }

    info!(booking_id = %id, deleted_by = %user.id, "Booking deleted");
    Ok(Json(json!({ "message": "Booking deleted successfully" })))
}
