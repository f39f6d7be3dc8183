//! Axum router for vendor webhooks.

use axum::{routing::post, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{
    handle_app_store_webhook, handle_play_store_webhook, handle_radom_webhook, handle_stripe_webhook,
    WebhookAppState,
};

/// Create the webhook router.
///
/// # Routes
/// - `POST /stripe` - Stripe events, `Stripe-Signature` verified
/// - `POST /radom` - Radom events, `radom-verification-key` verified
/// - `POST /ios` - App Store Server Notifications v2 (signed JWS)
/// - `POST /android` - Google Play developer notifications via Pub/Sub push,
///   Google OIDC bearer token verified
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new()
        .route("/stripe", post(handle_stripe_webhook))
        .route("/radom", post(handle_radom_webhook))
        .route("/ios", post(handle_app_store_webhook))
        .route("/android", post(handle_play_store_webhook))
}

/// Webhook routes mounted at `/v1/webhooks`, with request tracing.
pub fn webhook_router() -> Router<WebhookAppState> {
    Router::new()
        .nest("/v1/webhooks", webhook_routes())
        .layer(TraceLayer::new_for_http())
}
