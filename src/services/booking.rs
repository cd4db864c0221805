//! Бронирования, билеты и покупка.
//!
//! `purchase` - единый серверный сценарий: бронь, билет и списание места
//! создаются одной транзакцией хранилища, затем создается payment intent.
//! Если шлюз не ответил, резерв снимается компенсирующей операцией.

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{Booking, BookingStatus, Event, NewBooking, NewTicket, Ticket, TicketStatus};
use crate::services::payment::to_minor_units;
use crate::store::{PurchaseReservation, TicketReservation};
use crate::AppState;

pub const TAX_RATE: f64 = 0.10;
pub const DEFAULT_CURRENCY: &str = "usd";

pub fn total_with_tax(price: f64) -> f64 {
    price + price * TAX_RATE
}

/// Код валюты в нижнем регистре; пустой или отсутствующий - валюта по умолчанию.
pub fn normalize_currency(currency: Option<String>) -> String {
    currency
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
}

/// Результат успешной покупки.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub booking: Booking,
    pub ticket: Ticket,
    pub client_secret: String,
    pub total_amount: f64,
}

fn event_not_found() -> AppError {
    AppError::not_found("Event not found")
}

fn sold_out() -> AppError {
    AppError::validation("No tickets available for this event")
}

fn already_registered() -> AppError {
    AppError::Duplicate("User is already registered for this event.".to_string())
}

fn notify_ticket_booked(state: &AppState, user: &AuthUser, event: &Event) {
    state.notifier.notify(
        user.id,
        format!("You have successfully booked a ticket for the event: {}", event.name),
        Some(event.id),
    );
    state.notifier.notify(
        event.organizer,
        format!(
            "User {} has booked a ticket for your event: {}",
            user.name, event.name
        ),
        Some(event.id),
    );
}

/// Создает бронь в статусе Pending. Наличие мест не проверяется.
pub async fn create_booking(
    state: &AppState,
    user: &AuthUser,
    event_id: Uuid,
    total_amount: f64,
    number_of_tickets: i32,
) -> AppResult<Booking> {
    let event = state
        .store
        .find_event(event_id)
        .await?
        .ok_or_else(event_not_found)?;

    // Дублем считается только оплаченная бронь
    if state.store.has_paid_booking(event.id, user.id).await? {
        return Err(already_registered());
    }

    let booking = state
        .store
        .insert_booking(NewBooking {
            event: event.id,
            user: user.id,
            total_amount,
            number_of_tickets,
        })
        .await?;

    info!(booking_id = %booking.id, event_id = %event.id, user_id = %user.id, "Booking created");
    Ok(booking)
}

pub async fn book_ticket(
    state: &AppState,
    user: &AuthUser,
    event_id: Uuid,
    price: f64,
) -> AppResult<Ticket> {
    let reservation = state
        .store
        .book_ticket(NewTicket {
            event: event_id,
            attendee: user.id,
            price,
            qr_code: None,
            payment_status: TicketStatus::Paid,
        })
        .await?;

    match reservation {
        TicketReservation::Booked { ticket, event } => {
            state.cache.invalidate_events().await;
            notify_ticket_booked(state, user, &event);
            info!(
                ticket_id = %ticket.id,
                event_id = %event.id,
                remaining = event.tickets_available,
                "Ticket booked"
            );
            Ok(ticket)
        }
        TicketReservation::SoldOut => Err(sold_out()),
        TicketReservation::EventMissing => Err(event_not_found()),
    }
}

pub async fn purchase(
    state: &AppState,
    user: &AuthUser,
    event_id: Uuid,
    currency: &str,
) -> AppResult<Purchase> {
    let event = state
        .store
        .find_event(event_id)
        .await?
        .ok_or_else(event_not_found)?;
    let total_amount = total_with_tax(event.price);

    let reservation = state
        .store
        .reserve_purchase(
            NewBooking {
                event: event.id,
                user: user.id,
                total_amount,
                number_of_tickets: 1,
            },
            NewTicket {
                event: event.id,
                attendee: user.id,
                price: event.price,
                qr_code: None,
                payment_status: TicketStatus::Pending,
            },
        )
        .await?;

    let (booking, ticket, event) = match reservation {
        PurchaseReservation::Reserved {
            booking,
            ticket,
            event,
        } => (booking, ticket, event),
        PurchaseReservation::AlreadyPaid => return Err(already_registered()),
        PurchaseReservation::SoldOut => return Err(sold_out()),
        PurchaseReservation::EventMissing => return Err(event_not_found()),
    };
    state.cache.invalidate_events().await;

    let intent = match state
        .payments
        .create_payment_intent(to_minor_units(total_amount), currency)
        .await
    {
        Ok(intent) => intent,
        Err(e) => {
            warn!(booking_id = %booking.id, error = %e, "Payment intent failed, releasing reservation");
            if let Err(release) = state.store.release_purchase(booking.id).await {
                error!(
                    booking_id = %booking.id,
                    ticket_id = %ticket.id,
                    error = %release,
                    "Failed to release reservation"
                );
            }
            state.cache.invalidate_events().await;
            return Err(e.into());
        }
    };

    notify_ticket_booked(state, user, &event);
    info!(booking_id = %booking.id, ticket_id = %ticket.id, total_amount, "Purchase reserved");

    Ok(Purchase {
        booking,
        ticket,
        client_secret: intent.client_secret,
        total_amount,
    })
}

/// Меняет статус брони; отсутствующий статус оставляет текущий.
/// Билет покупки переходит в тот же статус вместе с бронью.
pub async fn update_booking_status(
    state: &AppState,
    booking: Booking,
    status: Option<BookingStatus>,
) -> AppResult<Booking> {
    let status = status.unwrap_or(booking.payment_status);
    state
        .store
        .update_booking_status(booking.id, status)
        .await?
        .ok_or_else(|| AppError::not_found("Booking not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tax_is_ten_percent() {
        assert!((total_with_tax(20.0) - 22.0).abs() < 1e-9);
        assert_eq!(total_with_tax(0.0), 0.0);
    }

    #[test]
    fn currency_defaults_to_usd() {
        assert_eq!(normalize_currency(None), "usd");
        assert_eq!(normalize_currency(Some("  ".into())), "usd");
        assert_eq!(normalize_currency(Some("EUR".into())), "eur");
    }

    proptest::proptest! {
        #[test]
        fn total_never_below_price(price in 0.0f64..1_000_000.0) {
            let total = total_with_tax(price);
            proptest::prop_assert!(total >= price);
            proptest::prop_assert!((total - price * 1.1).abs() < 1e-6);
        }
    }
}
