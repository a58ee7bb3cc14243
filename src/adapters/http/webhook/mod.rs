//! Webhook HTTP adapter.

mod dto;
mod handlers;
mod routes;

pub use dto::{ErrorResponse, HealthResponse, WebhookAcceptedResponse};
pub use handlers::{WebhookApiError, WebhookAppState};
pub use routes::{webhook_router, webhook_routes};
