//! Play Store push authentication.
//!
//! Pub/Sub push subscriptions attach a Google-signed OIDC token in the
//! `Authorization: Bearer` header. The token must be addressed to our
//! audience, issued by Google, and belong to the verified push service
//! account.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Header, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::domain::order::OrderError;

pub const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Why a Play Store push was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayAuthError {
    #[error("playstore: notifications disabled")]
    Disabled,
    #[error("playstore: gcp authorization header is empty")]
    AuthHeaderEmpty,
    #[error("playstore: gcp authorization header invalid format")]
    AuthHeaderFormat,
    #[error("playstore: invalid authentication token: {0}")]
    InvalidToken(String),
    #[error("playstore: gcp invalid issuer")]
    InvalidIssuer,
    #[error("playstore: gcp invalid email")]
    InvalidEmail,
    #[error("playstore: gcp email not verified")]
    EmailNotVerified,
    #[error("playstore: signing keys unavailable: {0}")]
    KeysUnavailable(String),
}

impl From<PlayAuthError> for OrderError {
    fn from(err: PlayAuthError) -> Self {
        OrderError::webhook_auth(err.to_string())
    }
}

/// Expected identity of the push sender.
#[derive(Debug, Clone)]
pub struct PlayAuthConfig {
    pub audience: String,
    pub service_account: String,
}

#[derive(Debug, Deserialize)]
struct GoogleIdClaims {
    #[serde(default)]
    iss: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

enum KeySource {
    Static(JwkSet),
    Remote {
        url: String,
        http_client: reqwest::Client,
        cache: RwLock<Option<CachedKeys>>,
    },
}

impl KeySource {
    async fn fetch(url: &str, http_client: &reqwest::Client) -> Result<JwkSet, PlayAuthError> {
        tracing::debug!(url, "Fetching Google signing keys");
        let response = http_client
            .get(url)
            .send()
            .await
            .map_err(|e| PlayAuthError::KeysUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PlayAuthError::KeysUnavailable(format!(
                "certs endpoint returned {}",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| PlayAuthError::KeysUnavailable(e.to_string()))
    }

    /// The key for `kid`. A remote set is refetched when stale or when the
    /// kid is unknown, which covers Google's key rotation.
    async fn find(&self, kid: &str) -> Result<Jwk, PlayAuthError> {
        let unknown = || PlayAuthError::InvalidToken(format!("unknown key id {}", kid));

        let (url, http_client, cache) = match self {
            KeySource::Static(keys) => return keys.find(kid).cloned().ok_or_else(unknown),
            KeySource::Remote {
                url,
                http_client,
                cache,
            } => (url, http_client, cache),
        };

        {
            let cached = cache.read().await;
            if let Some(cached) = cached.as_ref() {
                if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                    if let Some(jwk) = cached.keys.find(kid) {
                        return Ok(jwk.clone());
                    }
                }
            }
        }

        let keys = Self::fetch(url, http_client).await?;
        let found = keys.find(kid).cloned();
        *cache.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        found.ok_or_else(unknown)
    }
}

enum Mode {
    Verify { config: PlayAuthConfig, keys: KeySource },
    SkipChecks,
    RejectAll,
}

/// Authenticates Play Store developer notification pushes.
#[derive(Clone)]
pub struct PlayStoreNotificationAuthenticator {
    mode: Arc<Mode>,
}

impl PlayStoreNotificationAuthenticator {
    /// Verifies against Google's published signing keys.
    pub fn google(config: PlayAuthConfig) -> Self {
        Self::with_jwks_url(config, GOOGLE_CERTS_URL)
    }

    pub fn with_jwks_url(config: PlayAuthConfig, url: impl Into<String>) -> Self {
        let keys = KeySource::Remote {
            url: url.into(),
            http_client: reqwest::Client::new(),
            cache: RwLock::new(None),
        };
        Self {
            mode: Arc::new(Mode::Verify { config, keys }),
        }
    }

    /// Verifies against a fixed key set.
    pub fn with_keys(config: PlayAuthConfig, keys: JwkSet) -> Self {
        Self {
            mode: Arc::new(Mode::Verify {
                config,
                keys: KeySource::Static(keys),
            }),
        }
    }

    /// Accepts every push. Only for local runs without Pub/Sub.
    pub fn skip_checks() -> Self {
        Self {
            mode: Arc::new(Mode::SkipChecks),
        }
    }

    /// Rejects every push; installed when the Play Store is not configured.
    pub fn reject_all() -> Self {
        Self {
            mode: Arc::new(Mode::RejectAll),
        }
    }

    /// Checks the raw `Authorization` header value.
    pub async fn authenticate(&self, authorization: &str) -> Result<(), PlayAuthError> {
        let (config, keys) = match self.mode.as_ref() {
            Mode::SkipChecks => return Ok(()),
            Mode::RejectAll => return Err(PlayAuthError::Disabled),
            Mode::Verify { config, keys } => (config, keys),
        };

        if authorization.is_empty() {
            return Err(PlayAuthError::AuthHeaderEmpty);
        }
        let token = bearer_token(authorization)?;

        let header = decode_header(token).map_err(|e| PlayAuthError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| PlayAuthError::InvalidToken("missing kid".to_string()))?;
        let jwk = keys.find(kid).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| PlayAuthError::InvalidToken(e.to_string()))?;
        let algorithm = signing_algorithm(&header, &jwk)?;

        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[&config.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let claims = decode::<GoogleIdClaims>(token, &key, &validation)
            .map_err(|e| {
                tracing::warn!(error = %e, "Play Store push token rejected");
                PlayAuthError::InvalidToken(e.to_string())
            })?
            .claims;

        if !GOOGLE_ISSUERS.contains(&claims.iss.as_str()) {
            return Err(PlayAuthError::InvalidIssuer);
        }
        if claims.email.as_deref() != Some(config.service_account.as_str()) {
            return Err(PlayAuthError::InvalidEmail);
        }
        if claims.email_verified != Some(true) {
            return Err(PlayAuthError::EmailNotVerified);
        }
        Ok(())
    }
}

fn bearer_token(authorization: &str) -> Result<&str, PlayAuthError> {
    match authorization.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() && !token.contains(' ') => {
            Ok(token)
        }
        _ => Err(PlayAuthError::AuthHeaderFormat),
    }
}

/// The header algorithm, which must agree with the key's declared one.
fn signing_algorithm(header: &Header, jwk: &Jwk) -> Result<Algorithm, PlayAuthError> {
    let declared = match jwk.common.key_algorithm {
        None => return Ok(header.alg),
        Some(KeyAlgorithm::RS256) => Algorithm::RS256,
        Some(KeyAlgorithm::RS384) => Algorithm::RS384,
        Some(KeyAlgorithm::RS512) => Algorithm::RS512,
        Some(KeyAlgorithm::ES256) => Algorithm::ES256,
        Some(KeyAlgorithm::ES384) => Algorithm::ES384,
        Some(other) => return Err(PlayAuthError::InvalidToken(format!("unsupported key algorithm {:?}", other))),
    };
    if declared != header.alg {
        return Err(PlayAuthError::InvalidToken("algorithm does not match key".to_string()));
    }
    Ok(declared)
}
