pub mod auth;
pub mod bookings;
pub mod dashboard;
pub mod events;
pub mod feedback;
pub mod notifications;
pub mod payments;
pub mod search;
pub mod tickets;
pub mod users;

use axum::{extract::FromRequest, Router};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// `Json`, но ошибки разбора тела отдаются в общем формате `AppError`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Разбор id из пути. Некорректный id - ошибка валидации, а не 404.
pub fn parse_id(raw: &str) -> AppResult<Uuid> {
    parse_id_or(raw, "Invalid id")
}

pub fn parse_id_or(raw: &str, message: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::validation(message))
}

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(auth::routes())
        .merge(events::routes())
        .merge(tickets::routes())
        .merge(bookings::routes())
        .merge(payments::routes())
        .merge(users::routes())
        .merge(search::routes())
        .merge(dashboard::routes())
        .merge(notifications::routes())
        .merge(feedback::routes())
}
