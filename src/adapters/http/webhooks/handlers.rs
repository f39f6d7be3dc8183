//! HTTP handlers for vendor webhooks.
//!
//! Each handler authenticates the request, parses the vendor payload and
//! delegates to the matching reconciliation command handler.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::IntoResponse;

use super::dto::{ErrorResponse, WebhookAck};
use crate::adapters::playstore::{PlayStoreNotificationAuthenticator, PubSubEnvelope};
use crate::adapters::radom::{RadomAuthenticator, RADOM_VERIFICATION_HEADER};
use crate::adapters::stripe::{StripeWebhookVerifier, STRIPE_SIGNATURE_HEADER};
use crate::application::handlers::reconciliation::{
    HandleAppStoreNotificationCommand, HandleAppStoreNotificationHandler, HandlePlayStoreNotificationCommand,
    HandlePlayStoreNotificationHandler, HandleRadomNotificationCommand, HandleRadomNotificationHandler,
    HandleStripeWebhookCommand, HandleStripeWebhookHandler,
};
use crate::domain::order::OrderError;
use crate::domain::reconciliation::radom::RadomNotification;
use crate::ports::{AppStoreNotificationDecoder, PlayStoreClient, RadomClient, StripeClient, UnitOfWork};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Dependencies shared by the webhook endpoints.
#[derive(Clone)]
pub struct WebhookAppState {
    pub uow: Arc<dyn UnitOfWork>,
    pub stripe: Arc<dyn StripeClient>,
    pub stripe_verifier: StripeWebhookVerifier,
    pub radom: Arc<dyn RadomClient>,
    pub radom_auth: RadomAuthenticator,
    pub app_store_decoder: Arc<dyn AppStoreNotificationDecoder>,
    pub play_store: Arc<dyn PlayStoreClient>,
    pub play_store_auth: PlayStoreNotificationAuthenticator,
}

impl WebhookAppState {
    pub fn stripe_handler(&self) -> HandleStripeWebhookHandler {
        HandleStripeWebhookHandler::new(self.uow.clone(), self.stripe.clone())
    }

    pub fn radom_handler(&self) -> HandleRadomNotificationHandler {
        HandleRadomNotificationHandler::new(self.uow.clone(), self.radom.clone())
    }

    pub fn app_store_handler(&self) -> HandleAppStoreNotificationHandler {
        HandleAppStoreNotificationHandler::new(self.uow.clone(), self.app_store_decoder.clone())
    }

    pub fn play_store_handler(&self) -> HandlePlayStoreNotificationHandler {
        HandlePlayStoreNotificationHandler::new(self.uow.clone(), self.play_store.clone())
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppStoreBody {
    signed_payload: String,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default()
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /v1/webhooks/stripe
pub async fn handle_stripe_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| OrderError::webhook_auth("missing Stripe-Signature header"))?;

    let event = state.stripe_verifier.verify(&body, signature)?;
    let result = state.stripe_handler().handle(HandleStripeWebhookCommand { event }).await?;

    Ok(Json(WebhookAck::from(result.outcome)))
}

/// POST /v1/webhooks/radom
pub async fn handle_radom_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    state.radom_auth.authenticate(header(&headers, RADOM_VERIFICATION_HEADER))?;

    let notification: RadomNotification =
        serde_json::from_slice(&body).map_err(|e| OrderError::malformed(format!("radom notification: {}", e)))?;
    let result = state
        .radom_handler()
        .handle(HandleRadomNotificationCommand { notification })
        .await?;

    Ok(Json(WebhookAck::from(result.outcome)))
}

/// POST /v1/webhooks/ios
pub async fn handle_app_store_webhook(
    State(state): State<WebhookAppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: AppStoreBody =
        serde_json::from_slice(&body).map_err(|e| OrderError::malformed(format!("app store body: {}", e)))?;
    let result = state
        .app_store_handler()
        .handle(HandleAppStoreNotificationCommand {
            signed_payload: body.signed_payload,
        })
        .await?;

    Ok(Json(WebhookAck::from(result.outcome)))
}

/// POST /v1/webhooks/android
pub async fn handle_play_store_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    state
        .play_store_auth
        .authenticate(header(&headers, AUTHORIZATION.as_str()))
        .await?;

    let notification = PubSubEnvelope::parse(&body)?.notification()?;
    let result = state
        .play_store_handler()
        .handle(HandlePlayStoreNotificationCommand { notification })
        .await?;

    Ok(Json(WebhookAck::from(result.outcome)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts order errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(OrderError);

impl<E> From<E> for ApiError
where
    E: Into<OrderError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(code = self.0.code(), error = %self.0, "webhook failed");
        } else {
            tracing::warn!(code = self.0.code(), error = %self.0, "webhook rejected");
        }

        let body = ErrorResponse::new(self.0.code(), self.0.message());
        (status, Json(body)).into_response()
    }
}
