use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, Postgres, Transaction};
use uuid::Uuid;

use super::{PurchaseReservation, Store, StoreError, StoreResult, TicketReservation};
use crate::database::Database;
use crate::models::{
    Booking, BookingStatus, Event, EventUpdate, Feedback, NewBooking, NewEvent, NewFeedback, NewNotification,
    NewTicket, NewUser, Notification, Role, Speaker, Ticket, TicketStatus, User,
};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at";
const EVENT_COLUMNS: &str = "id, name, date, venue, description, speakers, tickets_available, \
     image_url, organizer_id, price, attendees, created_at, updated_at";
const BOOKING_COLUMNS: &str =
    "id, event_id, user_id, total_amount, number_of_tickets, payment_status, booking_date, ticket_id";
const TICKET_COLUMNS: &str =
    "id, event_id, attendee_id, price, qr_code, payment_status, created_at, updated_at";
const FEEDBACK_COLUMNS: &str =
    "id, event_id, user_id, feedback_text, rating, created_at, updated_at";
const NOTIFICATION_COLUMNS: &str =
    "id, user_id, message, event_id, is_read, created_at, updated_at";

/* ---------- rows ---------- */

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse().map_err(StoreError::Corrupt)?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct EventRow {
    id: Uuid,
    name: String,
    date: DateTime<Utc>,
    venue: String,
    description: Option<String>,
    speakers: Json<Vec<Speaker>>,
    tickets_available: i32,
    image_url: String,
    organizer_id: Uuid,
    price: f64,
    attendees: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            name: row.name,
            date: row.date,
            venue: row.venue,
            description: row.description,
            speakers: row.speakers.0,
            tickets_available: row.tickets_available,
            image_url: row.image_url,
            organizer: row.organizer_id,
            price: row.price,
            attendees: row.attendees,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct BookingRow {
    id: Uuid,
    event_id: Uuid,
    user_id: Uuid,
    total_amount: f64,
    number_of_tickets: i32,
    payment_status: String,
    booking_date: DateTime<Utc>,
    ticket_id: Option<Uuid>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let payment_status = BookingStatus::parse(&row.payment_status).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown booking status '{}'", row.payment_status))
        })?;
        Ok(Booking {
            id: row.id,
            event: row.event_id,
            user: row.user_id,
            total_amount: row.total_amount,
            number_of_tickets: row.number_of_tickets,
            payment_status,
            booking_date: row.booking_date,
            ticket_id: row.ticket_id,
        })
    }
}

#[derive(FromRow)]
struct TicketRow {
    id: Uuid,
    event_id: Uuid,
    attendee_id: Uuid,
    price: f64,
    qr_code: Option<String>,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = StoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        let payment_status = TicketStatus::parse(&row.payment_status).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown ticket status '{}'", row.payment_status))
        })?;
        Ok(Ticket {
            id: row.id,
            event: row.event_id,
            attendee: row.attendee_id,
            price: row.price,
            qr_code: row.qr_code,
            payment_status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct FeedbackRow {
    id: Uuid,
    event_id: Uuid,
    user_id: Uuid,
    feedback_text: String,
    rating: i16,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FeedbackRow> for Feedback {
    fn from(row: FeedbackRow) -> Self {
        Feedback {
            id: row.id,
            event_id: row.event_id,
            user_id: row.user_id,
            feedback_text: row.feedback_text,
            rating: row.rating,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    message: String,
    event_id: Option<Uuid>,
    is_read: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            user_id: row.user_id,
            message: row.message,
            event_id: row.event_id,
            is_read: row.is_read,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/* ---------- helpers ---------- */

fn conflict_on_unique(message: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::Conflict(message.to_string());
            }
        }
        StoreError::Database(err)
    }
}

fn collect<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// Экранирование спецсимволов LIKE, чтобы ключевое слово искалось буквально
fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for ch in keyword.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Postgres-реализация хранилища.
#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // Списание одного места. None - мест нет или события нет, различаем отдельным запросом
    async fn take_ticket(
        tx: &mut Transaction<'_, Postgres>,
        event_id: Uuid,
    ) -> StoreResult<Result<Event, TicketReservation>> {
        let row: Option<EventRow> = sqlx::query_as(&format!(
            "UPDATE events
             SET tickets_available = tickets_available - 1, updated_at = NOW()
             WHERE id = $1 AND tickets_available > 0
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(event_id)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(row) = row {
            return Ok(Ok(row.into()));
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM events WHERE id = $1)")
            .bind(event_id)
            .fetch_one(&mut **tx)
            .await?;

        Ok(Err(if exists {
            TicketReservation::SoldOut
        } else {
            TicketReservation::EventMissing
        }))
    }

    async fn insert_ticket(
        tx: &mut Transaction<'_, Postgres>,
        ticket: NewTicket,
    ) -> StoreResult<Ticket> {
        let row: TicketRow = sqlx::query_as(&format!(
            "INSERT INTO tickets (id, event_id, attendee_id, price, qr_code, payment_status)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {TICKET_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(ticket.event)
        .bind(ticket.attendee)
        .bind(ticket.price)
        .bind(ticket.qr_code)
        .bind(ticket.payment_status.as_str())
        .fetch_one(&mut **tx)
        .await?;
        row.try_into()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (id, name, email, password_hash, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.db.pool)
        .await
        .map_err(conflict_on_unique("User already exists"))?;
        row.try_into()
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.db.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.db.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"))
                .bind(ids)
                .fetch_all(&self.db.pool)
                .await?;
        collect(rows)
    }

    async fn list_users_except(&self, role: Role) -> StoreResult<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role <> $1 ORDER BY created_at"
        ))
        .bind(role.as_str())
        .fetch_all(&self.db.pool)
        .await?;
        collect(rows)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_users_by_role(&self) -> StoreResult<Vec<(Role, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role")
                .fetch_all(&self.db.pool)
                .await?;
        rows.into_iter()
            .map(|(role, count)| Ok((role.parse().map_err(StoreError::Corrupt)?, count)))
            .collect()
    }

    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event> {
        let row: EventRow = sqlx::query_as(&format!(
            "INSERT INTO events
                (id, name, date, venue, description, speakers, tickets_available, image_url, organizer_id, price)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&event.name)
        .bind(event.date)
        .bind(&event.venue)
        .bind(&event.description)
        .bind(Json(&event.speakers))
        .bind(event.tickets_available)
        .bind(&event.image_url)
        .bind(event.organizer)
        .bind(event.price)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        let row: Option<EventRow> =
            sqlx::query_as(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.db.pool)
                .await?;
        Ok(row.map(Event::from))
    }

    async fn find_events(&self, ids: &[Uuid]) -> StoreResult<Vec<Event>> {
        let rows: Vec<EventRow> =
            sqlx::query_as(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ANY($1)"))
                .bind(ids)
                .fetch_all(&self.db.pool)
                .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn list_events(&self) -> StoreResult<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY date, created_at"
        ))
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn list_events_by_organizer(&self, organizer: Uuid) -> StoreResult<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE organizer_id = $1 ORDER BY date, created_at"
        ))
        .bind(organizer)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn search_events(&self, keyword: &str) -> StoreResult<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE name ILIKE $1 ORDER BY date, created_at"
        ))
        .bind(like_pattern(keyword))
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn update_event(&self, id: Uuid, update: EventUpdate) -> StoreResult<Option<Event>> {
        let update = update.normalized();
        let row: Option<EventRow> = sqlx::query_as(&format!(
            "UPDATE events
             SET name = COALESCE($2, name),
                 date = COALESCE($3, date),
                 venue = COALESCE($4, venue),
                 description = COALESCE($5, description),
                 speakers = COALESCE($6, speakers),
                 tickets_available = COALESCE($7, tickets_available),
                 image_url = COALESCE($8, image_url),
                 price = COALESCE($9, price),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.date)
        .bind(update.venue)
        .bind(update.description)
        .bind(update.speakers.map(Json))
        .bind(update.tickets_available)
        .bind(update.image_url)
        .bind(update.price)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row.map(Event::from))
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.db.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_event_attendee(&self, event_id: Uuid, user_id: Uuid) -> StoreResult<Option<Event>> {
        let row: Option<EventRow> = sqlx::query_as(&format!(
            "UPDATE events
             SET attendees = array_append(attendees, $2), updated_at = NOW()
             WHERE id = $1
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row.map(Event::from))
    }

    async fn count_events_by_organizer(&self, organizer: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE organizer_id = $1")
            .bind(organizer)
            .fetch_one(&self.db.pool)
            .await?;
        Ok(count)
    }

    async fn book_ticket(&self, ticket: NewTicket) -> StoreResult<TicketReservation> {
        let mut tx = self.db.pool.begin().await?;

        let event = match Self::take_ticket(&mut tx, ticket.event).await? {
            Ok(event) => event,
            Err(outcome) => return Ok(outcome),
        };
        let ticket = Self::insert_ticket(&mut tx, ticket).await?;

        tx.commit().await?;
        Ok(TicketReservation::Booked { ticket, event })
    }

    async fn tickets_for_attendee(&self, attendee: Uuid) -> StoreResult<Vec<Ticket>> {
        let rows: Vec<TicketRow> = sqlx::query_as(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE attendee_id = $1 ORDER BY created_at"
        ))
        .bind(attendee)
        .fetch_all(&self.db.pool)
        .await?;
        collect(rows)
    }

    async fn tickets_for_event(&self, event: Uuid) -> StoreResult<Vec<Ticket>> {
        let rows: Vec<TicketRow> = sqlx::query_as(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE event_id = $1 ORDER BY created_at"
        ))
        .bind(event)
        .fetch_all(&self.db.pool)
        .await?;
        collect(rows)
    }

    async fn ticket_counts_by_event(&self) -> StoreResult<Vec<(Uuid, i64)>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT event_id, COUNT(*) FROM tickets GROUP BY event_id ORDER BY MIN(created_at)",
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows)
    }

    async fn count_tickets(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets")
            .fetch_one(&self.db.pool)
            .await?;
        Ok(count)
    }

    async fn has_paid_booking(&self, event: Uuid, user: Uuid) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM bookings WHERE event_id = $1 AND user_id = $2 AND payment_status = 'Paid')",
        )
        .bind(event)
        .bind(user)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<Booking> {
        let row: BookingRow = sqlx::query_as(&format!(
            "INSERT INTO bookings (id, event_id, user_id, total_amount, number_of_tickets)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(booking.event)
        .bind(booking.user)
        .bind(booking.total_amount)
        .bind(booking.number_of_tickets)
        .fetch_one(&self.db.pool)
        .await?;
        row.try_into()
    }

    async fn find_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.db.pool)
                .await?;
        row.map(Booking::try_from).transpose()
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> StoreResult<Option<Booking>> {
        let mut tx = self.db.pool.begin().await?;

        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "UPDATE bookings SET payment_status = $2 WHERE id = $1 RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(booking) = row.map(Booking::try_from).transpose()? else {
            return Ok(None);
        };

        if let Some(ticket_id) = booking.ticket_id {
            sqlx::query("UPDATE tickets SET payment_status = $2, updated_at = NOW() WHERE id = $1")
                .bind(ticket_id)
                .bind(TicketStatus::from(status).as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(Some(booking))
    }

    async fn delete_booking(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.db.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_bookings(&self) -> StoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY booking_date"
        ))
        .fetch_all(&self.db.pool)
        .await?;
        collect(rows)
    }

    async fn bookings_for_user(&self, user: Uuid) -> StoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY booking_date"
        ))
        .bind(user)
        .fetch_all(&self.db.pool)
        .await?;
        collect(rows)
    }

    async fn reserve_purchase(
        &self,
        booking: NewBooking,
        ticket: NewTicket,
    ) -> StoreResult<PurchaseReservation> {
        let mut tx = self.db.pool.begin().await?;

        let already_paid: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM bookings WHERE event_id = $1 AND user_id = $2 AND payment_status = 'Paid')",
        )
        .bind(booking.event)
        .bind(booking.user)
        .fetch_one(&mut *tx)
        .await?;
        if already_paid {
            return Ok(PurchaseReservation::AlreadyPaid);
        }

        let event = match Self::take_ticket(&mut tx, ticket.event).await? {
            Ok(event) => event,
            Err(TicketReservation::SoldOut) => return Ok(PurchaseReservation::SoldOut),
            Err(_) => return Ok(PurchaseReservation::EventMissing),
        };

        let ticket = Self::insert_ticket(&mut tx, ticket).await?;

        let booking: Booking = sqlx::query_as::<_, BookingRow>(&format!(
            "INSERT INTO bookings (id, event_id, user_id, total_amount, number_of_tickets, ticket_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(booking.event)
        .bind(booking.user)
        .bind(booking.total_amount)
        .bind(booking.number_of_tickets)
        .bind(ticket.id)
        .fetch_one(&mut *tx)
        .await?
        .try_into()?;

        tx.commit().await?;
        Ok(PurchaseReservation::Reserved {
            booking,
            ticket,
            event,
        })
    }

    async fn release_purchase(&self, booking_id: Uuid) -> StoreResult<bool> {
        let mut tx = self.db.pool.begin().await?;

        // Оплаченную за это время бронь не трогаем
        let deleted: Option<Option<Uuid>> = sqlx::query_scalar(
            "DELETE FROM bookings WHERE id = $1 AND payment_status = 'Pending' RETURNING ticket_id",
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(ticket_id) = deleted else {
            return Ok(false);
        };

        if let Some(ticket_id) = ticket_id {
            let event_id: Option<Uuid> =
                sqlx::query_scalar("DELETE FROM tickets WHERE id = $1 RETURNING event_id")
                    .bind(ticket_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            if let Some(event_id) = event_id {
                sqlx::query(
                    "UPDATE events SET tickets_available = tickets_available + 1, updated_at = NOW() WHERE id = $1",
                )
                .bind(event_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn expired_pending_purchases(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM bookings
             WHERE payment_status = 'Pending' AND ticket_id IS NOT NULL AND booking_date <= $1
             ORDER BY booking_date",
        )
        .bind(cutoff)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(ids)
    }

    async fn has_feedback(&self, event: Uuid, user: Uuid) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM feedback WHERE event_id = $1 AND user_id = $2)",
        )
        .bind(event)
        .bind(user)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_feedback(&self, feedback: NewFeedback) -> StoreResult<Feedback> {
        let row: FeedbackRow = sqlx::query_as(&format!(
            "INSERT INTO feedback (id, event_id, user_id, feedback_text, rating)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {FEEDBACK_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(feedback.event_id)
        .bind(feedback.user_id)
        .bind(&feedback.feedback_text)
        .bind(feedback.rating)
        .fetch_one(&self.db.pool)
        .await
        .map_err(conflict_on_unique(
            "You have already submitted feedback for this event.",
        ))?;
        Ok(row.into())
    }

    async fn feedback_for_event(&self, event: Uuid) -> StoreResult<Vec<Feedback>> {
        let rows: Vec<FeedbackRow> = sqlx::query_as(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE event_id = $1 ORDER BY created_at"
        ))
        .bind(event)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.into_iter().map(Feedback::from).collect())
    }

    async fn insert_notification(&self, notification: NewNotification) -> StoreResult<Notification> {
        let row: NotificationRow = sqlx::query_as(&format!(
            "INSERT INTO notifications (id, user_id, message, event_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(&notification.message)
        .bind(notification.event_id)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(row.into())
    }

    async fn notifications_for_user(&self, user: Uuid) -> StoreResult<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = $1 ORDER BY created_at"
        ))
        .bind(user)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn mark_notification_read(&self, id: Uuid, user: Uuid) -> StoreResult<Option<Notification>> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "UPDATE notifications SET is_read = TRUE, updated_at = NOW()
             WHERE id = $1 AND user_id = $2
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(user)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row.map(Notification::from))
    }

    async fn count_unread_notifications(&self, user: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(count)
    }
}
