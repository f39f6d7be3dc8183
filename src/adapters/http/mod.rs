//! HTTP adapters - Webhook ingress.

pub mod webhooks;

pub use webhooks::{webhook_router, ApiError, WebhookAppState};
