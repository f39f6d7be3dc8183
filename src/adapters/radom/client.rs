//! Radom REST client.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::domain::reconciliation::radom::{RadomCheckoutSession, RadomSubscription};
use crate::domain::vendor::{Vendor, VendorError};
use crate::ports::{RadomCheckoutRequest, RadomClient, RadomSessionCreated};

/// Radom API configuration.
#[derive(Clone)]
pub struct RadomConfig {
    pub(crate) api_key: SecretString,
    pub(crate) api_base_url: String,
}

impl RadomConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: "https://api.radom.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Radom client over `reqwest`. Radom takes the raw API key in `Authorization`.
pub struct HttpRadomClient {
    config: RadomConfig,
    http_client: reqwest::Client,
}

impl HttpRadomClient {
    pub fn new(config: RadomConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, VendorError> {
        let response = builder
            .header("Authorization", self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| VendorError::network(Vendor::Radom, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(operation, status = status.as_u16(), "Radom API call failed");
            return Err(VendorError::from_status(
                Vendor::Radom,
                status.as_u16(),
                format!("Radom API error: {}", body),
            ));
        }

        response.json().await.map_err(|e| {
            VendorError::decode(Vendor::Radom, format!("Failed to parse Radom response: {}", e))
        })
    }
}

#[async_trait]
impl RadomClient for HttpRadomClient {
    async fn create_checkout_session(
        &self,
        request: RadomCheckoutRequest,
    ) -> Result<RadomSessionCreated, VendorError> {
        let builder = self.http_client.post(self.url("/checkout_session")).json(&request);
        self.send("create_checkout_session", builder).await
    }

    async fn get_checkout_session(&self, session_id: &str) -> Result<RadomCheckoutSession, VendorError> {
        let builder = self
            .http_client
            .get(self.url(&format!("/checkout_session/{}", session_id)));
        self.send("get_checkout_session", builder).await
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<RadomSubscription, VendorError> {
        let builder = self
            .http_client
            .get(self.url(&format!("/subscription/{}", subscription_id)));
        self.send("get_subscription", builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let client = HttpRadomClient::new(RadomConfig::new("key").with_base_url("https://radom.test/"));
        assert_eq!(client.url("/subscription/1"), "https://radom.test/subscription/1");
    }
}
