//! App Store server notifications (v2), after JWS decoding.

use serde::Deserialize;

use super::{OrderLocator, ReconciliationIntent, Renewal};
use crate::domain::foundation::Timestamp;
use crate::domain::order::OrderError;

pub const DID_RENEW: &str = "DID_RENEW";
pub const SUBSCRIBED: &str = "SUBSCRIBED";
pub const SUBTYPE_BILLING_RECOVERY: &str = "BILLING_RECOVERY";
pub const SUBTYPE_RESUBSCRIBE: &str = "RESUBSCRIBE";

/// Decoded `signedPayload`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStorePayload {
    pub notification_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default, rename = "notificationUUID")]
    pub notification_uuid: Option<String>,
    pub data: AppStorePayloadData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStorePayloadData {
    #[serde(default)]
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    pub signed_transaction_info: String,
    #[serde(default)]
    pub signed_renewal_info: Option<String>,
}

/// Decoded `signedTransactionInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStoreTransaction {
    pub original_transaction_id: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub expires_date: Option<i64>,
}

/// A notification with its transaction decoded.
#[derive(Debug, Clone)]
pub struct AppStoreNotification {
    pub notification_type: String,
    pub subtype: Option<String>,
    pub notification_uuid: Option<String>,
    pub transaction: AppStoreTransaction,
}

impl AppStoreNotification {
    pub fn should_renew(&self) -> bool {
        let subtype = self.subtype.as_deref().unwrap_or("");
        match self.notification_type.as_str() {
            DID_RENEW => subtype.is_empty() || subtype == SUBTYPE_BILLING_RECOVERY,
            SUBSCRIBED => subtype == SUBTYPE_RESUBSCRIBE,
            _ => false,
        }
    }

    pub fn effect(&self) -> &'static str {
        if self.should_renew() {
            "renew"
        } else {
            "skip"
        }
    }

    pub fn intent(&self, now: Timestamp) -> Result<Option<ReconciliationIntent>, OrderError> {
        if !self.should_renew() {
            return Ok(None);
        }

        let expires_at = self
            .transaction
            .expires_date
            .and_then(Timestamp::from_unix_millis)
            .ok_or_else(|| OrderError::malformed("app store transaction without expiresDate"))?;

        Ok(Some(ReconciliationIntent::Renew(Renewal {
            order: OrderLocator::ExternalId(self.transaction.original_transaction_id.clone()),
            subscription_id: None,
            period_start: None,
            expires_at,
            paid_at: now,
        })))
    }
}
