//! Mobile store configuration (App Store, Play Store)

use secrecy::SecretString;
use serde::Deserialize;

use super::error::ValidationError;
use super::payment::validate_base_url;

/// Which App Store receipt endpoint is tried first
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppStoreEnvironment {
    #[default]
    Production,
    Sandbox,
}

/// App Store receipts and signed notifications
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppStoreSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub environment: AppStoreEnvironment,

    /// App-specific shared secret for legacy receipt validation
    #[serde(default)]
    pub shared_secret: Option<SecretString>,

    /// PEM public key that signs App Store Server Notifications
    #[serde(default)]
    pub notification_key_pem: Option<String>,
}

impl AppStoreSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }
        match &self.notification_key_pem {
            Some(pem) if !pem.trim().is_empty() => Ok(()),
            _ => Err(ValidationError::MissingRequired("APP_STORE__NOTIFICATION_KEY_PEM")),
        }
    }
}

/// Play Developer API access
#[derive(Debug, Clone, Deserialize)]
pub struct PlayStoreSettings {
    #[serde(default)]
    pub enabled: bool,

    /// OAuth access token for the publisher API
    #[serde(default)]
    pub access_token: Option<SecretString>,

    #[serde(default = "default_play_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_package_name")]
    pub package_name: String,

    /// Audience of the Pub/Sub push OIDC token
    #[serde(default)]
    pub notification_audience: Option<String>,

    /// Service account the push subscription signs as
    #[serde(default)]
    pub notification_service_account: Option<String>,

    /// Accept pushes without checking the token. Local runs only.
    #[serde(default)]
    pub notification_auth_disabled: bool,
}

impl PlayStoreSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }
        if self.access_token.is_none() {
            return Err(ValidationError::MissingRequired("PLAY_STORE__ACCESS_TOKEN"));
        }
        if !self.notification_auth_disabled {
            if is_blank(&self.notification_audience) {
                return Err(ValidationError::MissingRequired("PLAY_STORE__NOTIFICATION_AUDIENCE"));
            }
            if is_blank(&self.notification_service_account) {
                return Err(ValidationError::MissingRequired("PLAY_STORE__NOTIFICATION_SERVICE_ACCOUNT"));
            }
        }
        validate_base_url(&self.api_base_url)
    }
}

impl Default for PlayStoreSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token: None,
            api_base_url: default_play_base_url(),
            package_name: default_package_name(),
            notification_audience: None,
            notification_service_account: None,
            notification_auth_disabled: false,
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn default_play_base_url() -> String {
    "https://androidpublisher.googleapis.com".to_string()
}

fn default_package_name() -> String {
    "com.brave.browser".to_string()
}
