//! Слой хранения.
//!
//! Контроллеры и сервисы работают только через трейт [`Store`]. В проде это
//! [`PgStore`] (Postgres через sqlx), для тестов и локального запуска без БД -
//! [`MemoryStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Booking, BookingStatus, Event, EventUpdate, Feedback, NewBooking, NewEvent, NewFeedback, NewNotification,
    NewTicket, NewUser, Notification, Role, Ticket, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Нарушено ограничение уникальности.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// В БД лежит значение, которое не удается разобрать (например, неизвестная роль).
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Результат атомарной попытки выдать билет.
#[derive(Debug, Clone)]
pub enum TicketReservation {
    Booked { ticket: Ticket, event: Event },
    SoldOut,
    EventMissing,
}

/// Результат атомарного резерва покупки (бронь + билет + списание места).
#[derive(Debug, Clone)]
pub enum PurchaseReservation {
    Reserved {
        booking: Booking,
        ticket: Ticket,
        event: Event,
    },
    AlreadyPaid,
    SoldOut,
    EventMissing,
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- users ---
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;
    async fn list_users_except(&self, role: Role) -> StoreResult<Vec<User>>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool>;
    async fn count_users_by_role(&self) -> StoreResult<Vec<(Role, i64)>>;

    // --- events ---
    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event>;
    async fn find_event(&self, id: Uuid) -> StoreResult<Option<Event>>;
    async fn find_events(&self, ids: &[Uuid]) -> StoreResult<Vec<Event>>;
    /// Все события по дате (раньше - выше).
    async fn list_events(&self) -> StoreResult<Vec<Event>>;
    async fn list_events_by_organizer(&self, organizer: Uuid) -> StoreResult<Vec<Event>>;
    /// Регистронезависимый поиск подстроки в названии.
    async fn search_events(&self, keyword: &str) -> StoreResult<Vec<Event>>;
    /// Частичное обновление одной операцией: незаданные поля (в том числе
    /// остаток мест) берутся из текущей строки, а не из ранее прочитанной копии.
    async fn update_event(&self, id: Uuid, update: EventUpdate) -> StoreResult<Option<Event>>;
    async fn delete_event(&self, id: Uuid) -> StoreResult<bool>;
    /// Добавляет участника без проверки на дубликаты.
    async fn add_event_attendee(&self, event_id: Uuid, user_id: Uuid) -> StoreResult<Option<Event>>;
    async fn count_events_by_organizer(&self, organizer: Uuid) -> StoreResult<i64>;

    // --- tickets ---
    /// Проверка наличия мест, создание билета и декремент в одной транзакции.
    async fn book_ticket(&self, ticket: NewTicket) -> StoreResult<TicketReservation>;
    async fn tickets_for_attendee(&self, attendee: Uuid) -> StoreResult<Vec<Ticket>>;
    async fn tickets_for_event(&self, event: Uuid) -> StoreResult<Vec<Ticket>>;
    async fn ticket_counts_by_event(&self) -> StoreResult<Vec<(Uuid, i64)>>;
    async fn count_tickets(&self) -> StoreResult<i64>;

    // --- bookings ---
    async fn has_paid_booking(&self, event: Uuid, user: Uuid) -> StoreResult<bool>;
    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<Booking>;
    async fn find_booking(&self, id: Uuid) -> StoreResult<Option<Booking>>;
    /// Меняет статус брони; связанный билет покупки получает тот же статус.
    async fn update_booking_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> StoreResult<Option<Booking>>;
    async fn delete_booking(&self, id: Uuid) -> StoreResult<bool>;
    async fn list_bookings(&self) -> StoreResult<Vec<Booking>>;
    async fn bookings_for_user(&self, user: Uuid) -> StoreResult<Vec<Booking>>;

    // --- purchase workflow ---
    async fn reserve_purchase(
        &self,
        booking: NewBooking,
        ticket: NewTicket,
    ) -> StoreResult<PurchaseReservation>;
    /// Компенсация: удаляет неоплаченную бронь и ее билет, возвращает место событию.
    /// `false`, если брони нет или она уже оплачена.
    async fn release_purchase(&self, booking_id: Uuid) -> StoreResult<bool>;
    /// Неоплаченные брони покупок, созданные раньше `cutoff`.
    async fn expired_pending_purchases(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Uuid>>;

    // --- feedback ---
    async fn has_feedback(&self, event: Uuid, user: Uuid) -> StoreResult<bool>;
    async fn insert_feedback(&self, feedback: NewFeedback) -> StoreResult<Feedback>;
    async fn feedback_for_event(&self, event: Uuid) -> StoreResult<Vec<Feedback>>;

    // --- notifications ---
    async fn insert_notification(&self, notification: NewNotification) -> StoreResult<Notification>;
    async fn notifications_for_user(&self, user: Uuid) -> StoreResult<Vec<Notification>>;
    async fn mark_notification_read(&self, id: Uuid, user: Uuid) -> StoreResult<Option<Notification>>;
    async fn count_unread_notifications(&self, user: Uuid) -> StoreResult<i64>;
}
