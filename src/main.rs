//! SKUs webhook service.
//!
//! Loads configuration, connects to PostgreSQL and serves the vendor
//! webhook endpoints under `/v1/webhooks`.

use std::sync::Arc;

use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use skus::adapters::appstore::{DisabledNotificationDecoder, JwsNotificationDecoder};
use skus::adapters::http::{webhook_router, WebhookAppState};
use skus::adapters::playstore::{
    HttpPlayStoreClient, PlayAuthConfig, PlayStoreConfig, PlayStoreNotificationAuthenticator,
};
use skus::adapters::postgres::{run_migrations, PgUnitOfWork};
use skus::adapters::radom::{HttpRadomClient, RadomAuthenticator, RadomConfig};
use skus::adapters::stripe::{HttpStripeClient, StripeConfig, StripeWebhookVerifier};
use skus::config::AppConfig;
use skus::ports::AppStoreNotificationDecoder;
use skus::telemetry::init_tracing;

fn exposed(secret: &Option<SecretString>) -> String {
    secret
        .as_ref()
        .map(|s| s.expose_secret().clone())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    config.validate().context("validating configuration")?;
    init_tracing(&config.telemetry).context("installing tracing subscriber")?;

    info!(environment = ?config.environment, "Starting SKUs service");

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.connect_timeout())
        .connect(&config.database.url)
        .await
        .context("connecting to database")?;

    if config.database.run_migrations {
        run_migrations(&pool).await.context("running migrations")?;
        info!("Migrations applied");
    }

    let stripe = HttpStripeClient::new(
        StripeConfig::new(exposed(&config.stripe.api_key), exposed(&config.stripe.webhook_secret))
            .with_base_url(config.stripe.api_base_url.clone()),
    );
    let stripe_verifier = match (&config.stripe.webhook_secret, config.stripe.enabled) {
        (Some(secret), true) => StripeWebhookVerifier::new(secret.clone()),
        _ => {
            warn!("Stripe disabled; Stripe webhooks will be rejected");
            StripeWebhookVerifier::disabled()
        }
    };

    let radom = HttpRadomClient::new(
        RadomConfig::new(exposed(&config.radom.api_key)).with_base_url(config.radom.api_base_url.clone()),
    );
    let radom_auth = RadomAuthenticator::new(
        config.radom.enabled,
        SecretString::new(exposed(&config.radom.webhook_verification_token)),
    );

    let app_store_decoder: Arc<dyn AppStoreNotificationDecoder> =
        match (&config.app_store.notification_key_pem, config.app_store.enabled) {
            (Some(pem), true) => Arc::new(
                JwsNotificationDecoder::from_ec_pem(pem.as_bytes()).context("loading App Store key")?,
            ),
            _ => {
                warn!("App Store disabled; App Store notifications will be rejected");
                Arc::new(DisabledNotificationDecoder)
            }
        };

    if !config.play_store.enabled {
        warn!("Play Store disabled; purchase lookups will fail");
    }
    let play_store = HttpPlayStoreClient::new(
        PlayStoreConfig::new(exposed(&config.play_store.access_token))
            .with_base_url(config.play_store.api_base_url.clone()),
    );
    let play_store_auth = match (
        &config.play_store.notification_audience,
        &config.play_store.notification_service_account,
    ) {
        _ if config.play_store.notification_auth_disabled => {
            warn!("Play Store push authentication disabled; pushes are accepted unverified");
            PlayStoreNotificationAuthenticator::skip_checks()
        }
        (Some(audience), Some(service_account)) if config.play_store.enabled => {
            PlayStoreNotificationAuthenticator::google(PlayAuthConfig {
                audience: audience.clone(),
                service_account: service_account.clone(),
            })
        }
        _ => PlayStoreNotificationAuthenticator::reject_all(),
    };

    let state = WebhookAppState {
        uow: Arc::new(PgUnitOfWork::new(pool)),
        stripe: Arc::new(stripe),
        stripe_verifier,
        radom: Arc::new(radom),
        radom_auth,
        app_store_decoder,
        play_store: Arc::new(play_store),
        play_store_auth,
    };

    let app = webhook_router().with_state(state);
    let addr = config.server.socket_addr().context("resolving bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    info!(%addr, "Listening");
    axum::serve(listener, app).await.context("serving")?;

    Ok(())
}
