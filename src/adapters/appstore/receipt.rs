//! App Store receipt validation through `verifyReceipt`.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;
use crate::domain::vendor::{Vendor, VendorError, VendorErrorCode};
use crate::ports::VerifiedReceipt;

pub const APP_STORE_PRODUCTION_URL: &str = "https://buy.itunes.apple.com/verifyReceipt";
pub const APP_STORE_SANDBOX_URL: &str = "https://sandbox.itunes.apple.com/verifyReceipt";

/// Status Apple answers when a sandbox receipt hits production.
const STATUS_SANDBOX_RECEIPT: i64 = 21007;

#[derive(Debug, Serialize)]
struct VerifyReceiptRequest<'a> {
    #[serde(rename = "receipt-data")]
    receipt_data: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(rename = "exclude-old-transactions")]
    exclude_old_transactions: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyReceiptResponse {
    status: i64,
    #[serde(default)]
    receipt: Option<ReceiptBody>,
}

#[derive(Debug, Deserialize)]
struct ReceiptBody {
    #[serde(default)]
    in_app: Vec<InAppPurchase>,
}

#[derive(Debug, Deserialize)]
struct InAppPurchase {
    product_id: String,
    original_transaction_id: String,
    #[serde(default)]
    expires_date_ms: Option<String>,
}

/// Validates base64 receipts with Apple.
pub struct AppStoreReceiptVerifier {
    http_client: reqwest::Client,
    shared_secret: Option<SecretString>,
    production_url: String,
    sandbox_url: String,
}

impl AppStoreReceiptVerifier {
    pub fn new(shared_secret: Option<SecretString>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            shared_secret,
            production_url: APP_STORE_PRODUCTION_URL.to_string(),
            sandbox_url: APP_STORE_SANDBOX_URL.to_string(),
        }
    }

    pub fn with_urls(mut self, production: impl Into<String>, sandbox: impl Into<String>) -> Self {
        self.production_url = production.into();
        self.sandbox_url = sandbox.into();
        self
    }

    pub async fn verify(&self, raw_receipt: &str, product_id: &str) -> Result<VerifiedReceipt, VendorError> {
        let mut response = self.post(&self.production_url, raw_receipt).await?;
        if response.status == STATUS_SANDBOX_RECEIPT {
            tracing::debug!("sandbox receipt sent to production, retrying against sandbox");
            response = self.post(&self.sandbox_url, raw_receipt).await?;
        }
        verified_purchase(response, product_id)
    }

    async fn post(&self, url: &str, raw_receipt: &str) -> Result<VerifyReceiptResponse, VendorError> {
        let body = VerifyReceiptRequest {
            receipt_data: raw_receipt,
            password: self.shared_secret.as_ref().map(|s| s.expose_secret().as_str()),
            exclude_old_transactions: true,
        };

        let response = self
            .http_client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| VendorError::network(Vendor::AppStore, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VendorError::from_status(
                Vendor::AppStore,
                status.as_u16(),
                "verifyReceipt failed",
            ));
        }

        response
            .json()
            .await
            .map_err(|e| VendorError::decode(Vendor::AppStore, e.to_string()))
    }
}

/// Finds the purchase of `product_id` in a successful response.
pub(crate) fn verified_purchase(
    response: VerifyReceiptResponse,
    product_id: &str,
) -> Result<VerifiedReceipt, VendorError> {
    if response.status != 0 {
        return Err(VendorError::new(
            Vendor::AppStore,
            VendorErrorCode::InvalidRequest,
            format!("receipt rejected with status {}", response.status),
        ));
    }

    let in_app = response.receipt.map(|r| r.in_app).unwrap_or_default();
    if in_app.is_empty() {
        return Err(VendorError::new(
            Vendor::AppStore,
            VendorErrorCode::InvalidRequest,
            "no in app info in response",
        ));
    }

    let item = in_app
        .into_iter()
        .filter(|p| p.product_id == product_id)
        .max_by_key(|p| expires_ms(p).unwrap_or(i64::MIN))
        .ok_or_else(|| VendorError::not_found(Vendor::AppStore, "ios: purchase not found"))?;

    let expires_at = expires_ms(&item)
        .and_then(Timestamp::from_unix_millis)
        .ok_or_else(|| VendorError::decode(Vendor::AppStore, "purchase without expires_date_ms"))?;

    Ok(VerifiedReceipt {
        product_id: item.product_id,
        external_id: item.original_transaction_id,
        expires_at,
    })
}

fn expires_ms(p: &InAppPurchase) -> Option<i64> {
    p.expires_date_ms.as_deref().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(body: serde_json::Value) -> VerifyReceiptResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn picks_latest_purchase_of_requested_product() {
        let resp = response(json!({
            "status": 0,
            "receipt": {"in_app": [
                {"product_id": "braveleo.monthly", "original_transaction_id": "1", "expires_date_ms": "1000"},
                {"product_id": "bravevpn.monthly", "original_transaction_id": "2", "expires_date_ms": "9000"},
                {"product_id": "braveleo.monthly", "original_transaction_id": "1", "expires_date_ms": "5000"}
            ]}
        }));

        let receipt = verified_purchase(resp, "braveleo.monthly").unwrap();
        assert_eq!(receipt.external_id, "1");
        assert_eq!(receipt.expires_at.as_unix_millis(), 5000);
    }

    #[test]
    fn other_product_is_not_found() {
        let resp = response(json!({
            "status": 0,
            "receipt": {"in_app": [
                {"product_id": "bravevpn.monthly", "original_transaction_id": "2", "expires_date_ms": "9000"}
            ]}
        }));
        let err = verified_purchase(resp, "braveleo.monthly").unwrap_err();
        assert_eq!(err.code, VendorErrorCode::NotFound);
    }

    #[test]
    fn non_zero_status_is_rejected() {
        let err = verified_purchase(response(json!({"status": 21003})), "x").unwrap_err();
        assert_eq!(err.code, VendorErrorCode::InvalidRequest);
    }

    #[test]
    fn empty_in_app_is_rejected() {
        let err = verified_purchase(response(json!({"status": 0, "receipt": {"in_app": []}})), "x").unwrap_err();
        assert!(err.message.contains("no in app"));
    }
}
