//! Signed App Store notification decoding.
//!
//! `signedPayload` and the nested `signedTransactionInfo` are ES256 JWS
//! tokens. Both are verified against the configured Apple public key.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;

use crate::domain::order::OrderError;
use crate::domain::reconciliation::app_store::{AppStoreNotification, AppStorePayload, AppStoreTransaction};
use crate::ports::AppStoreNotificationDecoder;

/// Decodes v2 server notifications with a fixed ES256 key.
pub struct JwsNotificationDecoder {
    key: DecodingKey,
    validation: Validation,
}

impl JwsNotificationDecoder {
    /// Builds a decoder from a PEM-encoded EC public key.
    pub fn from_ec_pem(pem: &[u8]) -> Result<Self, OrderError> {
        let key = DecodingKey::from_ec_pem(pem)
            .map_err(|e| OrderError::webhook_auth(format!("app store key: {}", e)))?;
        Ok(Self::new(key))
    }

    pub fn new(key: DecodingKey) -> Self {
        let mut validation = Validation::new(Algorithm::ES256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        Self { key, validation }
    }

    fn verify<T: DeserializeOwned>(&self, what: &str, token: &str) -> Result<T, OrderError> {
        decode::<T>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!(error = %e, what, "App Store JWS rejected");
                OrderError::webhook_auth(format!("{}: {}", what, e))
            })
    }
}

impl AppStoreNotificationDecoder for JwsNotificationDecoder {
    fn decode(&self, signed_payload: &str) -> Result<AppStoreNotification, OrderError> {
        let payload: AppStorePayload = self.verify("signedPayload", signed_payload)?;
        let transaction: AppStoreTransaction =
            self.verify("signedTransactionInfo", &payload.data.signed_transaction_info)?;

        Ok(AppStoreNotification {
            notification_type: payload.notification_type,
            subtype: payload.subtype,
            notification_uuid: payload.notification_uuid,
            transaction,
        })
    }
}

/// Rejects every notification; installed when App Store is not configured.
pub struct DisabledNotificationDecoder;

impl AppStoreNotificationDecoder for DisabledNotificationDecoder {
    fn decode(&self, _signed_payload: &str) -> Result<AppStoreNotification, OrderError> {
        Err(OrderError::webhook_auth("app store notifications disabled"))
    }
}
