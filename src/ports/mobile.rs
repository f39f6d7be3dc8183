//! Mobile store ports: Play Developer API, receipt verification and App
//! Store notification decoding.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;
use crate::domain::order::OrderError;
use crate::domain::reconciliation::app_store::AppStoreNotification;
use crate::domain::reconciliation::play_store::SubscriptionPurchase;
use crate::domain::vendor::{Vendor, VendorError};

#[async_trait]
pub trait PlayStoreClient: Send + Sync {
    async fn get_subscription_purchase(
        &self,
        package_name: &str,
        subscription_id: &str,
        purchase_token: &str,
    ) -> Result<SubscriptionPurchase, VendorError>;
}

/// A receipt posted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRequest {
    #[serde(rename = "type")]
    pub vendor: Vendor,
    /// Android package name; empty for iOS.
    #[serde(default)]
    pub package: String,
    /// Store product id the client claims to have bought.
    #[serde(default)]
    pub subscription_id: String,
    /// Base64 App Store receipt, or Play purchase token.
    pub raw_receipt: String,
}

/// Entitlement data extracted from a verified receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedReceipt {
    pub product_id: String,
    /// App Store original transaction id, or Play purchase token.
    pub external_id: String,
    pub expires_at: Timestamp,
}

/// Validates receipts with the issuing store.
#[async_trait]
pub trait ReceiptVerifier: Send + Sync {
    async fn verify(&self, request: &ReceiptRequest) -> Result<VerifiedReceipt, VendorError>;
}

/// Verifies and decodes a signed App Store notification payload.
pub trait AppStoreNotificationDecoder: Send + Sync {
    fn decode(&self, signed_payload: &str) -> Result<AppStoreNotification, OrderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_ports_are_object_safe() {
        fn _play(_c: &dyn PlayStoreClient) {}
        fn _verifier(_v: &dyn ReceiptVerifier) {}
        fn _decoder(_d: &dyn AppStoreNotificationDecoder) {}
    }

    #[test]
    fn receipt_request_reads_vendor_from_type() {
        let req: ReceiptRequest = serde_json::from_value(serde_json::json!({
            "type": "android",
            "package": "com.brave.browser",
            "subscription_id": "brave.vpn.monthly",
            "raw_receipt": "token"
        }))
        .unwrap();
        assert_eq!(req.vendor, Vendor::PlayStore);
    }
}
