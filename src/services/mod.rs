pub mod auth;
pub mod booking;
pub mod cleanup;
pub mod mailer;
pub mod notifications;
pub mod otp;
pub mod payment;
