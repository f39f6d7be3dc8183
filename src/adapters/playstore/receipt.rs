//! Play Store purchase-token validation.

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::vendor::{Vendor, VendorError, VendorErrorCode};
use crate::ports::{PlayStoreClient, VerifiedReceipt};

const PAYMENT_STATE_PENDING: i32 = 0;
const PAYMENT_STATE_PAID: i32 = 1;
const PAYMENT_STATE_TRIAL: i32 = 2;
const PAYMENT_STATE_DEFERRED: i32 = 3;

/// Accepts tokens whose subscription is paid (or in trial) and unexpired.
pub struct PlayStoreReceiptVerifier {
    client: Arc<dyn PlayStoreClient>,
}

impl PlayStoreReceiptVerifier {
    pub fn new(client: Arc<dyn PlayStoreClient>) -> Self {
        Self { client }
    }

    pub async fn verify(
        &self,
        package_name: &str,
        subscription_id: &str,
        purchase_token: &str,
        now: Timestamp,
    ) -> Result<VerifiedReceipt, VendorError> {
        let purchase = self
            .client
            .get_subscription_purchase(package_name, subscription_id, purchase_token)
            .await?;

        let expires_at = purchase
            .expires_at()
            .ok_or_else(|| rejected("purchase without expiry"))?;
        if expires_at.is_before(&now) {
            return Err(rejected("purchase expired"));
        }

        match purchase.payment_state {
            Some(PAYMENT_STATE_PAID) | Some(PAYMENT_STATE_TRIAL) => Ok(VerifiedReceipt {
                product_id: subscription_id.to_string(),
                external_id: purchase_token.to_string(),
                expires_at,
            }),
            Some(PAYMENT_STATE_PENDING) => Err(rejected("purchase is pending")),
            Some(PAYMENT_STATE_DEFERRED) => Err(rejected("purchase is deferred")),
            None => Err(rejected("no payment state")),
            Some(_) => Err(rejected("purchase status is unknown")),
        }
    }
}

fn rejected(reason: &str) -> VendorError {
    VendorError::new(Vendor::PlayStore, VendorErrorCode::InvalidRequest, reason)
}
