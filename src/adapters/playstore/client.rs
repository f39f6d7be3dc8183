//! Play Developer API client.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::reconciliation::play_store::SubscriptionPurchase;
use crate::domain::vendor::{Vendor, VendorError};
use crate::ports::PlayStoreClient;

#[derive(Clone)]
pub struct PlayStoreConfig {
    pub(crate) access_token: SecretString,
    pub(crate) api_base_url: String,
}

impl PlayStoreConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
            api_base_url: "https://androidpublisher.googleapis.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

pub struct HttpPlayStoreClient {
    config: PlayStoreConfig,
    http_client: reqwest::Client,
}

impl HttpPlayStoreClient {
    pub fn new(config: PlayStoreConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn purchase_url(&self, package_name: &str, subscription_id: &str, purchase_token: &str) -> String {
        format!(
            "{}/androidpublisher/v3/applications/{}/purchases/subscriptions/{}/tokens/{}",
            self.config.api_base_url.trim_end_matches('/'),
            package_name,
            subscription_id,
            purchase_token
        )
    }
}

#[async_trait]
impl PlayStoreClient for HttpPlayStoreClient {
    async fn get_subscription_purchase(
        &self,
        package_name: &str,
        subscription_id: &str,
        purchase_token: &str,
    ) -> Result<SubscriptionPurchase, VendorError> {
        let response = self
            .http_client
            .get(self.purchase_url(package_name, subscription_id, purchase_token))
            .bearer_auth(self.config.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| VendorError::network(Vendor::PlayStore, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "Play Developer API call failed");
            return Err(VendorError::from_status(
                Vendor::PlayStore,
                status.as_u16(),
                format!("Play API error: {}", body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| VendorError::decode(Vendor::PlayStore, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_url_addresses_token() {
        let client = HttpPlayStoreClient::new(PlayStoreConfig::new("t").with_base_url("https://play.test/"));
        assert_eq!(
            client.purchase_url("com.brave.browser", "brave.vpn.monthly", "tok"),
            "https://play.test/androidpublisher/v3/applications/com.brave.browser/purchases/subscriptions/brave.vpn.monthly/tokens/tok"
        );
    }
}
