pub mod user;
pub mod event;
pub mod booking;
pub mod ticket;
pub mod feedback;
pub mod notification;

pub use user::{NewUser, Role, User, UserProfile, UserSummary};
pub use event::{Event, EventSummary, EventUpdate, NewEvent, Speaker};
pub use booking::{Booking, BookingDetails, BookingStatus, NewBooking};
pub use ticket::{NewTicket, Ticket, TicketStatus, TicketWithEvent};
pub use feedback::{Feedback, FeedbackAuthor, FeedbackView, NewFeedback};
pub use notification::{NewNotification, Notification};
