//! Receipt verification dispatch.
//!
//! - `StoreReceiptVerifier` routes a receipt to the App Store or Play Store
//!   verifier for its vendor
//! - `MockReceiptVerifier` answers from a table keyed by raw receipt

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::adapters::appstore::AppStoreReceiptVerifier;
use crate::adapters::playstore::PlayStoreReceiptVerifier;
use crate::domain::foundation::Timestamp;
use crate::domain::vendor::{Vendor, VendorError, VendorErrorCode};
use crate::ports::{ReceiptRequest, ReceiptVerifier, VerifiedReceipt};

/// Verifier over the configured mobile stores.
#[derive(Default)]
pub struct StoreReceiptVerifier {
    app_store: Option<AppStoreReceiptVerifier>,
    play_store: Option<PlayStoreReceiptVerifier>,
}

impl StoreReceiptVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app_store(mut self, verifier: AppStoreReceiptVerifier) -> Self {
        self.app_store = Some(verifier);
        self
    }

    pub fn with_play_store(mut self, verifier: PlayStoreReceiptVerifier) -> Self {
        self.play_store = Some(verifier);
        self
    }
}

fn unconfigured(vendor: Vendor) -> VendorError {
    VendorError::new(vendor, VendorErrorCode::InvalidRequest, "receipt verification not configured")
}

#[async_trait]
impl ReceiptVerifier for StoreReceiptVerifier {
    async fn verify(&self, request: &ReceiptRequest) -> Result<VerifiedReceipt, VendorError> {
        match request.vendor {
            Vendor::AppStore => {
                let verifier = self.app_store.as_ref().ok_or_else(|| unconfigured(Vendor::AppStore))?;
                verifier.verify(&request.raw_receipt, &request.subscription_id).await
            }
            Vendor::PlayStore => {
                let verifier = self.play_store.as_ref().ok_or_else(|| unconfigured(Vendor::PlayStore))?;
                verifier
                    .verify(
                        &request.package,
                        &request.subscription_id,
                        &request.raw_receipt,
                        Timestamp::now(),
                    )
                    .await
            }
            other => Err(VendorError::new(
                other,
                VendorErrorCode::InvalidRequest,
                "vendor does not issue receipts",
            )),
        }
    }
}

#[derive(Default)]
struct MockState {
    receipts: HashMap<String, Result<VerifiedReceipt, VendorError>>,
    calls: usize,
}

/// In-process `ReceiptVerifier`.
#[derive(Clone, Default)]
pub struct MockReceiptVerifier {
    inner: Arc<Mutex<MockState>>,
}

impl MockReceiptVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn accept(&self, raw_receipt: impl Into<String>, receipt: VerifiedReceipt) {
        self.state().receipts.insert(raw_receipt.into(), Ok(receipt));
    }

    pub fn reject(&self, raw_receipt: impl Into<String>, err: VendorError) {
        self.state().receipts.insert(raw_receipt.into(), Err(err));
    }

    pub fn calls(&self) -> usize {
        self.state().calls
    }
}

#[async_trait]
impl ReceiptVerifier for MockReceiptVerifier {
    async fn verify(&self, request: &ReceiptRequest) -> Result<VerifiedReceipt, VendorError> {
        let mut state = self.state();
        state.calls += 1;
        state
            .receipts
            .get(&request.raw_receipt)
            .cloned()
            .unwrap_or_else(|| Err(VendorError::not_found(request.vendor, "unknown receipt")))
    }
}
