use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{PurchaseReservation, Store, StoreError, StoreResult, TicketReservation};
use crate::models::{
    Booking, BookingStatus, Event, EventUpdate, Feedback, NewBooking, NewEvent, NewFeedback, NewNotification,
    NewTicket, NewUser, Notification, Role, Ticket, TicketStatus, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    tickets: Vec<Ticket>,
    bookings: Vec<Booking>,
    feedback: Vec<Feedback>,
    notifications: Vec<Notification>,
}

impl Tables {
    fn sorted_events<'a>(&self, events: impl Iterator<Item = &'a Event>) -> Vec<Event> {
        let mut out: Vec<Event> = events.cloned().collect();
        out.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
        out
    }

    // Та же логика, что и UPDATE ... WHERE tickets_available > 0 в Postgres
    fn take_ticket(&mut self, event_id: Uuid) -> Result<Event, TicketReservation> {
        let Some(event) = self.events.get_mut(&event_id) else {
            return Err(TicketReservation::EventMissing);
        };
        if event.tickets_available <= 0 {
            return Err(TicketReservation::SoldOut);
        }
        event.tickets_available -= 1;
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    fn push_ticket(&mut self, ticket: NewTicket) -> Ticket {
        let now = Utc::now();
        let ticket = Ticket {
            id: Uuid::new_v4(),
            event: ticket.event,
            attendee: ticket.attendee,
            price: ticket.price,
            qr_code: ticket.qr_code,
            payment_status: ticket.payment_status,
            created_at: now,
            updated_at: now,
        };
        self.tickets.push(ticket.clone());
        ticket
    }

    fn push_booking(&mut self, booking: NewBooking, ticket_id: Option<Uuid>) -> Booking {
        let booking = Booking {
            id: Uuid::new_v4(),
            event: booking.event,
            user: booking.user,
            total_amount: booking.total_amount,
            number_of_tickets: booking.number_of_tickets,
            payment_status: BookingStatus::Pending,
            booking_date: Utc::now(),
            ticket_id,
        };
        self.bookings.push(booking.clone());
        booking
    }

    fn has_paid_booking(&self, event: Uuid, user: Uuid) -> bool {
        self.bookings
            .iter()
            .any(|b| b.event == event && b.user == user && b.payment_status == BookingStatus::Paid)
    }
}

/// Хранилище в памяти процесса. Одна блокировка на все таблицы, поэтому
/// многошаговые операции атомарны так же, как транзакции в Postgres.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("User already exists".to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let tables = self.tables.lock().await;
        Ok(ids.iter().filter_map(|id| tables.users.get(id).cloned()).collect())
    }

    async fn list_users_except(&self, role: Role) -> StoreResult<Vec<User>> {
        let tables = self.tables.lock().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| u.role != role)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.lock().await.users.remove(&id).is_some())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_users_by_role(&self) -> StoreResult<Vec<(Role, i64)>> {
        let tables = self.tables.lock().await;
        let mut counts: HashMap<Role, i64> = HashMap::new();
        for user in tables.users.values() {
            *counts.entry(user.role).or_default() += 1;
        }
        let mut out: Vec<(Role, i64)> = counts.into_iter().collect();
        out.sort_by_key(|(role, _)| role.as_str());
        Ok(out)
    }

    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event> {
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            name: event.name,
            date: event.date,
            venue: event.venue,
            description: event.description,
            speakers: event.speakers,
            tickets_available: event.tickets_available,
            image_url: event.image_url,
            organizer: event.organizer,
            price: event.price,
            attendees: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn find_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn find_events(&self, ids: &[Uuid]) -> StoreResult<Vec<Event>> {
        let tables = self.tables.lock().await;
        Ok(ids.iter().filter_map(|id| tables.events.get(id).cloned()).collect())
    }

    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        let tables = self.tables.lock().await;
        Ok(tables.sorted_events(tables.events.values()))
    }

    async fn list_events_by_organizer(&self, organizer: Uuid) -> StoreResult<Vec<Event>> {
        let tables = self.tables.lock().await;
        Ok(tables.sorted_events(tables.events.values().filter(|e| e.organizer == organizer)))
    }

    async fn search_events(&self, keyword: &str) -> StoreResult<Vec<Event>> {
        let needle = keyword.to_lowercase();
        let tables = self.tables.lock().await;
        Ok(tables.sorted_events(
            tables
                .events
                .values()
                .filter(|e| e.name.to_lowercase().contains(&needle)),
        ))
    }

    async fn update_event(&self, id: Uuid, update: EventUpdate) -> StoreResult<Option<Event>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.events.get_mut(&id).map(|event| {
            update.apply(event);
            event.clone()
        }))
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.lock().await.events.remove(&id).is_some())
    }

    async fn add_event_attendee(&self, event_id: Uuid, user_id: Uuid) -> StoreResult<Option<Event>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.events.get_mut(&event_id).map(|event| {
            event.attendees.push(user_id);
            event.updated_at = Utc::now();
            event.clone()
        }))
    }

    async fn count_events_by_organizer(&self, organizer: Uuid) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables.events.values().filter(|e| e.organizer == organizer).count() as i64)
    }

    async fn book_ticket(&self, ticket: NewTicket) -> StoreResult<TicketReservation> {
        let mut tables = self.tables.lock().await;
        let event = match tables.take_ticket(ticket.event) {
            Ok(event) => event,
            Err(outcome) => return Ok(outcome),
        };
        let ticket = tables.push_ticket(ticket);
        Ok(TicketReservation::Booked { ticket, event })
    }

    async fn tickets_for_attendee(&self, attendee: Uuid) -> StoreResult<Vec<Ticket>> {
        let tables = self.tables.lock().await;
        Ok(tables.tickets.iter().filter(|t| t.attendee == attendee).cloned().collect())
    }

    async fn tickets_for_event(&self, event: Uuid) -> StoreResult<Vec<Ticket>> {
        let tables = self.tables.lock().await;
        Ok(tables.tickets.iter().filter(|t| t.event == event).cloned().collect())
    }

    async fn ticket_counts_by_event(&self) -> StoreResult<Vec<(Uuid, i64)>> {
        let tables = self.tables.lock().await;
        let mut order: Vec<Uuid> = Vec::new();
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for ticket in &tables.tickets {
            let count = counts.entry(ticket.event).or_insert_with(|| {
                order.push(ticket.event);
                0
            });
            *count += 1;
        }
        Ok(order.into_iter().map(|id| (id, counts[&id])).collect())
    }

    async fn count_tickets(&self) -> StoreResult<i64> {
        Ok(self.tables.lock().await.tickets.len() as i64)
    }

    async fn has_paid_booking(&self, event: Uuid, user: Uuid) -> StoreResult<bool> {
        Ok(self.tables.lock().await.has_paid_booking(event, user))
    }

    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<Booking> {
        Ok(self.tables.lock().await.push_booking(booking, None))
    }

    async fn find_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let tables = self.tables.lock().await;
        Ok(tables.bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> StoreResult<Option<Booking>> {
        let mut tables = self.tables.lock().await;
        let Some(booking) = tables.bookings.iter_mut().find(|b| b.id == id) else {
            return Ok(None);
        };
        booking.payment_status = status;
        let booking = booking.clone();

        if let Some(ticket) = booking
            .ticket_id
            .and_then(|tid| tables.tickets.iter_mut().find(|t| t.id == tid))
        {
            ticket.payment_status = TicketStatus::from(status);
            ticket.updated_at = Utc::now();
        }
        Ok(Some(booking))
    }

    async fn delete_booking(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.bookings.len();
        tables.bookings.retain(|b| b.id != id);
        Ok(tables.bookings.len() != before)
    }

    async fn list_bookings(&self) -> StoreResult<Vec<Booking>> {
        Ok(self.tables.lock().await.bookings.clone())
    }

    async fn bookings_for_user(&self, user: Uuid) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.lock().await;
        Ok(tables.bookings.iter().filter(|b| b.user == user).cloned().collect())
    }

    async fn reserve_purchase(
        &self,
        booking: NewBooking,
        ticket: NewTicket,
    ) -> StoreResult<PurchaseReservation> {
        let mut tables = self.tables.lock().await;
        if !tables.events.contains_key(&booking.event) {
            return Ok(PurchaseReservation::EventMissing);
        }
        if tables.has_paid_booking(booking.event, booking.user) {
            return Ok(PurchaseReservation::AlreadyPaid);
        }
        let event = match tables.take_ticket(ticket.event) {
            Ok(event) => event,
            Err(TicketReservation::SoldOut) => return Ok(PurchaseReservation::SoldOut),
            Err(_) => return Ok(PurchaseReservation::EventMissing),
        };
        let ticket = tables.push_ticket(ticket);
        let booking = tables.push_booking(booking, Some(ticket.id));
        Ok(PurchaseReservation::Reserved {
            booking,
            ticket,
            event,
        })
    }

    async fn release_purchase(&self, booking_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let Some(pos) = tables
            .bookings
            .iter()
            .position(|b| b.id == booking_id && b.payment_status == BookingStatus::Pending)
        else {
            return Ok(false);
        };
        let booking = tables.bookings.remove(pos);

        let Some(ticket_id) = booking.ticket_id else {
            return Ok(true);
        };
        let event_id = tables.tickets.iter().find(|t| t.id == ticket_id).map(|t| t.event);
        tables.tickets.retain(|t| t.id != ticket_id);
        if let Some(event) = event_id.and_then(|id| tables.events.get_mut(&id)) {
            event.tickets_available += 1;
            event.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn expired_pending_purchases(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bookings
            .iter()
            .filter(|b| {
                b.payment_status == BookingStatus::Pending
                    && b.ticket_id.is_some()
                    && b.booking_date <= cutoff
            })
            .map(|b| b.id)
            .collect())
    }

    async fn has_feedback(&self, event: Uuid, user: Uuid) -> StoreResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.feedback.iter().any(|f| f.event_id == event && f.user_id == user))
    }

    async fn insert_feedback(&self, feedback: NewFeedback) -> StoreResult<Feedback> {
        let mut tables = self.tables.lock().await;
        if tables
            .feedback
            .iter()
            .any(|f| f.event_id == feedback.event_id && f.user_id == feedback.user_id)
        {
            return Err(StoreError::Conflict(
                "You have already submitted feedback for this event.".to_string(),
            ));
        }
        let now = Utc::now();
        let feedback = Feedback {
            id: Uuid::new_v4(),
            event_id: feedback.event_id,
            user_id: feedback.user_id,
            feedback_text: feedback.feedback_text,
            rating: feedback.rating,
            created_at: now,
            updated_at: now,
        };
        tables.feedback.push(feedback.clone());
        Ok(feedback)
    }

    async fn feedback_for_event(&self, event: Uuid) -> StoreResult<Vec<Feedback>> {
        let tables = self.tables.lock().await;
        Ok(tables.feedback.iter().filter(|f| f.event_id == event).cloned().collect())
    }

    async fn insert_notification(&self, notification: NewNotification) -> StoreResult<Notification> {
        let now = Utc::now();
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            message: notification.message,
            event_id: notification.event_id,
            is_read: false,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn notifications_for_user(&self, user: Uuid) -> StoreResult<Vec<Notification>> {
        let tables = self.tables.lock().await;
        Ok(tables.notifications.iter().filter(|n| n.user_id == user).cloned().collect())
    }

    async fn mark_notification_read(&self, id: Uuid, user: Uuid) -> StoreResult<Option<Notification>> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user)
            .map(|n| {
                n.is_read = true;
                n.updated_at = Utc::now();
                n.clone()
            }))
    }

    async fn count_unread_notifications(&self, user: Uuid) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .notifications
            .iter()
            .filter(|n| n.user_id == user && !n.is_read)
            .count() as i64)
    }
}
