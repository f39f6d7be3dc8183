//! Stripe REST client.
//!
//! Implements the `StripeClient` port over Stripe's form-encoded API.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key, webhook_secret);
//! let client = HttpStripeClient::new(config);
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::vendor::{Vendor, VendorError};
use crate::ports::{CheckoutSessionRequest, StripeCheckoutSession, StripeClient, StripeSubscription};

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    pub(crate) api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    pub(crate) webhook_secret: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    pub(crate) api_base_url: String,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn webhook_secret(&self) -> &SecretString {
        &self.webhook_secret
    }
}

/// Stripe client over `reqwest`.
pub struct HttpStripeClient {
    config: StripeConfig,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeListResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
}

impl HttpStripeClient {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, VendorError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| VendorError::network(Vendor::Stripe, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(operation, status = status.as_u16(), "Stripe API call failed");
            return Err(api_error(status.as_u16(), &body));
        }

        response.json().await.map_err(|e| {
            VendorError::decode(Vendor::Stripe, format!("Failed to parse Stripe response: {}", e))
        })
    }
}

fn api_error(status: u16, body: &str) -> VendorError {
    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(parsed) => {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| format!("Stripe API error ({})", status));
            let err = VendorError::from_status(Vendor::Stripe, status, message);
            match parsed.error.code {
                Some(code) => err.with_provider_code(code),
                None => err,
            }
        }
        Err(_) => VendorError::from_status(Vendor::Stripe, status, format!("Stripe API error: {}", body)),
    }
}

/// Form fields for a subscription-mode checkout session.
fn checkout_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_string(), "subscription".to_string()),
        ("client_reference_id".to_string(), request.client_reference_id.clone()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];

    if let Some(customer) = &request.customer {
        params.push(("customer".to_string(), customer.clone()));
    } else if let Some(email) = &request.customer_email {
        params.push(("customer_email".to_string(), email.clone()));
    }

    for (i, item) in request.line_items.iter().enumerate() {
        params.push((format!("line_items[{}][price]", i), item.price.clone()));
        params.push((format!("line_items[{}][quantity]", i), item.quantity.to_string()));
    }

    if let Some(days) = request.trial_period_days.filter(|d| *d > 0) {
        params.push(("subscription_data[trial_period_days]".to_string(), days.to_string()));
    }

    if request.discounts.is_empty() {
        if request.allow_promotion_codes {
            params.push(("allow_promotion_codes".to_string(), "true".to_string()));
        }
    } else {
        for (i, coupon) in request.discounts.iter().enumerate() {
            params.push((format!("discounts[{}][coupon]", i), coupon.clone()));
        }
    }

    for (key, value) in &request.subscription_metadata {
        params.push((format!("subscription_data[metadata][{}]", key), value.clone()));
    }

    params
}

#[async_trait]
impl StripeClient for HttpStripeClient {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<StripeCheckoutSession, VendorError> {
        let builder = self
            .http_client
            .post(self.url("/v1/checkout/sessions"))
            .form(&checkout_form(&request));
        self.send("create_checkout_session", builder).await
    }

    async fn get_checkout_session(&self, session_id: &str) -> Result<StripeCheckoutSession, VendorError> {
        let builder = self
            .http_client
            .get(self.url(&format!("/v1/checkout/sessions/{}", session_id)));
        self.send("get_checkout_session", builder).await
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>, VendorError> {
        let builder = self
            .http_client
            .get(self.url("/v1/customers"))
            .query(&[("email", email), ("limit", "1")]);
        let list: StripeListResponse<StripeCustomer> = self.send("find_customer_by_email", builder).await?;
        Ok(list.data.into_iter().next().map(|c| c.id))
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<StripeSubscription, VendorError> {
        let builder = self
            .http_client
            .get(self.url(&format!("/v1/subscriptions/{}", subscription_id)));
        self.send("get_subscription", builder).await
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), VendorError> {
        let builder = self
            .http_client
            .delete(self.url(&format!("/v1/subscriptions/{}", subscription_id)));
        let _: serde_json::Value = self.send("cancel_subscription", builder).await?;
        Ok(())
    }

    async fn search_active_subscriptions(&self, order_id: &str) -> Result<Vec<StripeSubscription>, VendorError> {
        let query = format!("status:'active' AND metadata['orderID']:'{}'", order_id);
        let builder = self
            .http_client
            .get(self.url("/v1/subscriptions/search"))
            .query(&[("query", query.as_str())]);
        let list: StripeListResponse<StripeSubscription> =
            self.send("search_active_subscriptions", builder).await?;
        Ok(list.data)
    }
}
