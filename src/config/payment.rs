//! Payment vendor configuration (Stripe, Radom)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// Stripe API access and webhook signing
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Secret API key (sk_live_... or sk_test_...)
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Webhook signing secret (whsec_...)
    #[serde(default)]
    pub webhook_secret: Option<SecretString>,

    #[serde(default = "default_stripe_base_url")]
    pub api_base_url: String,
}

impl StripeSettings {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.api_key
            .as_ref()
            .map_or(false, |k| k.expose_secret().starts_with("sk_test_"))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(ValidationError::MissingRequired("STRIPE__API_KEY"))?;
        let webhook_secret = self
            .webhook_secret
            .as_ref()
            .ok_or(ValidationError::MissingRequired("STRIPE__WEBHOOK_SECRET"))?;

        if !api_key.expose_secret().starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !webhook_secret.expose_secret().starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        validate_base_url(&self.api_base_url)
    }
}

impl Default for StripeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            webhook_secret: None,
            api_base_url: default_stripe_base_url(),
        }
    }
}

/// Radom API access and webhook verification
#[derive(Debug, Clone, Deserialize)]
pub struct RadomSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Token Radom presents in `radom-verification-key`
    #[serde(default)]
    pub webhook_verification_token: Option<SecretString>,

    #[serde(default = "default_radom_base_url")]
    pub api_base_url: String,
}

impl RadomSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }
        if self.api_key.is_none() {
            return Err(ValidationError::MissingRequired("RADOM__API_KEY"));
        }
        if self.webhook_verification_token.is_none() {
            return Err(ValidationError::MissingRequired("RADOM__WEBHOOK_VERIFICATION_TOKEN"));
        }
        validate_base_url(&self.api_base_url)
    }
}

impl Default for RadomSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            webhook_verification_token: None,
            api_base_url: default_radom_base_url(),
        }
    }
}

pub(super) fn validate_base_url(raw: &str) -> Result<(), ValidationError> {
    match url::Url::parse(raw) {
        Ok(parsed) if parsed.scheme() == "https" || parsed.scheme() == "http" => Ok(()),
        _ => Err(ValidationError::InvalidBaseUrl(raw.to_string())),
    }
}

fn default_stripe_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_radom_base_url() -> String {
    "https://api.radom.com".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> Option<SecretString> {
        Some(SecretString::new(s.to_string()))
    }

    fn stripe() -> StripeSettings {
        StripeSettings {
            enabled: true,
            api_key: secret("sk_test_abcd1234"),
            webhook_secret: secret("whsec_xyz789"),
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_vendors_need_nothing() {
        assert!(StripeSettings::default().validate().is_ok());
        assert!(RadomSettings::default().validate().is_ok());
    }

    #[test]
    fn test_is_test_mode() {
        assert!(stripe().is_test_mode());
        let live = StripeSettings {
            api_key: secret("sk_live_xxx"),
            ..stripe()
        };
        assert!(!live.is_test_mode());
    }

    #[test]
    fn test_stripe_missing_webhook_secret() {
        let config = StripeSettings {
            webhook_secret: None,
            ..stripe()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("STRIPE__WEBHOOK_SECRET"))
        );
    }

    #[test]
    fn test_stripe_key_prefixes() {
        let config = StripeSettings {
            api_key: secret("pk_test_xxx"),
            ..stripe()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidStripeKey));

        let config = StripeSettings {
            webhook_secret: secret("secret_xxx"),
            ..stripe()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidStripeWebhookSecret));
    }

    #[test]
    fn test_stripe_valid_config() {
        assert!(stripe().validate().is_ok());
    }

    #[test]
    fn test_radom_requires_token_when_enabled() {
        let config = RadomSettings {
            enabled: true,
            api_key: secret("radom-key"),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("RADOM__WEBHOOK_VERIFICATION_TOKEN"))
        );
    }

    #[test]
    fn test_bad_base_url() {
        let config = StripeSettings {
            api_base_url: "api.stripe.com".to_string(),
            ..stripe()
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidBaseUrl(_))));
    }
}
