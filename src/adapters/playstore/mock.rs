//! Mock Play Developer API client for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::reconciliation::play_store::SubscriptionPurchase;
use crate::domain::vendor::{Vendor, VendorError};
use crate::ports::PlayStoreClient;

#[derive(Default)]
struct MockState {
    purchases: HashMap<String, SubscriptionPurchase>,
    error: Option<VendorError>,
    lookups: Vec<String>,
}

#[derive(Clone, Default)]
pub struct MockPlayStoreClient {
    inner: Arc<Mutex<MockState>>,
}

impl MockPlayStoreClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_purchase(&self, purchase_token: impl Into<String>, purchase: SubscriptionPurchase) {
        self.state().purchases.insert(purchase_token.into(), purchase);
    }

    pub fn fail_with(&self, err: VendorError) {
        self.state().error = Some(err);
    }

    /// Purchase tokens looked up so far.
    pub fn lookups(&self) -> Vec<String> {
        self.state().lookups.clone()
    }
}

#[async_trait]
impl PlayStoreClient for MockPlayStoreClient {
    async fn get_subscription_purchase(
        &self,
        _package_name: &str,
        _subscription_id: &str,
        purchase_token: &str,
    ) -> Result<SubscriptionPurchase, VendorError> {
        let mut state = self.state();
        state.lookups.push(purchase_token.to_string());
        if let Some(err) = &state.error {
            return Err(err.clone());
        }
        state
            .purchases
            .get(purchase_token)
            .cloned()
            .ok_or_else(|| VendorError::not_found(Vendor::PlayStore, format!("purchase {}", purchase_token)))
    }
}
