//! HTTP adapter for vendor webhooks.
//!
//! - `POST /v1/webhooks/stripe` - Stripe events
//! - `POST /v1/webhooks/radom` - Radom events
//! - `POST /v1/webhooks/ios` - App Store Server Notifications v2
//! - `POST /v1/webhooks/android` - Google Play real-time developer notifications

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::{ErrorResponse, WebhookAck};
pub use handlers::{ApiError, WebhookAppState};
pub use routes::{webhook_router, webhook_routes};
