//! Notification adapters.
//!
//! - `LogNotificationSink` - logs notifications; default when e-mail is off
//! - `ResendNotificationSink` - delivers e-mail through the Resend API

mod log_sink;
mod resend;

pub use log_sink::LogNotificationSink;
pub use resend::ResendNotificationSink;
