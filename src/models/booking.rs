use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Event, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Paid,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Paid => "Paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(BookingStatus::Pending),
            "Paid" => Some(BookingStatus::Paid),
            _ => None,
        }
    }
}

/// Запись об оплате: отдельна от самого билета.
///
/// `ticket_id` есть только у броней из покупки; статус такого билета
/// следует за статусом брони.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub event: Uuid,
    pub user: Uuid,
    pub total_amount: f64,
    pub number_of_tickets: i32,
    pub payment_status: BookingStatus,
    pub booking_date: DateTime<Utc>,
    pub ticket_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub event: Uuid,
    pub user: Uuid,
    pub total_amount: f64,
    pub number_of_tickets: i32,
}

/// Бронирование с подставленными событием и пользователем.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub event: Option<Event>,
    pub user: Option<UserProfile>,
    pub total_amount: f64,
    pub number_of_tickets: i32,
    pub payment_status: BookingStatus,
    pub booking_date: DateTime<Utc>,
    pub ticket_id: Option<Uuid>,
}

impl BookingDetails {
    pub fn new(booking: Booking, event: Option<Event>, user: Option<UserProfile>) -> Self {
        BookingDetails {
            id: booking.id,
            event,
            user,
            total_amount: booking.total_amount,
            number_of_tickets: booking.number_of_tickets,
            payment_status: booking.payment_status,
            booking_date: booking.booking_date,
            ticket_id: booking.ticket_id,
        }
    }
}
