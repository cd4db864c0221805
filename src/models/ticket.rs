use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BookingStatus, EventSummary};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Pending,
    #[default]
    Paid,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TicketStatus::Pending),
            "paid" => Some(TicketStatus::Paid),
            _ => None,
        }
    }
}

impl From<BookingStatus> for TicketStatus {
    fn from(status: BookingStatus) -> Self {
        match status {
            BookingStatus::Pending => TicketStatus::Pending,
            BookingStatus::Paid => TicketStatus::Paid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub event: Uuid,
    pub attendee: Uuid,
    pub price: f64,
    pub qr_code: Option<String>,
    pub payment_status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub event: Uuid,
    pub attendee: Uuid,
    pub price: f64,
    pub qr_code: Option<String>,
    pub payment_status: TicketStatus,
}

/// Билет пользователя вместе с краткой информацией о событии.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketWithEvent {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub event: Option<EventSummary>,
    pub attendee: Uuid,
    pub price: f64,
    pub qr_code: Option<String>,
    pub payment_status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketWithEvent {
    pub fn new(ticket: Ticket, event: Option<EventSummary>) -> Self {
        TicketWithEvent {
            id: ticket.id,
            event,
            attendee: ticket.attendee,
            price: ticket.price,
            qr_code: ticket.qr_code,
            payment_status: ticket.payment_status,
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
        }
    }
}
