//! Mock Radom client for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::reconciliation::radom::{RadomCheckoutSession, RadomSubscription};
use crate::domain::vendor::{Vendor, VendorError};
use crate::ports::{RadomCheckoutRequest, RadomClient, RadomSessionCreated};

#[derive(Default)]
struct MockState {
    sessions: HashMap<String, RadomCheckoutSession>,
    subscriptions: HashMap<String, RadomSubscription>,
    created: Vec<RadomCheckoutRequest>,
    method_errors: HashMap<&'static str, VendorError>,
    call_log: Vec<(&'static str, String)>,
}

#[derive(Clone, Default)]
pub struct MockRadomClient {
    inner: Arc<Mutex<MockState>>,
}

impl MockRadomClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_session(&self, session: RadomCheckoutSession) {
        self.state().sessions.insert(session.checkout_session_id.clone(), session);
    }

    pub fn add_subscription(&self, subscription: RadomSubscription) {
        self.state().subscriptions.insert(subscription.id.clone(), subscription);
    }

    pub fn fail(&self, method: &'static str, err: VendorError) {
        self.state().method_errors.insert(method, err);
    }

    pub fn created_sessions(&self) -> Vec<RadomCheckoutRequest> {
        self.state().created.clone()
    }

    pub fn calls(&self) -> Vec<(&'static str, String)> {
        self.state().call_log.clone()
    }

    fn record(&self, method: &'static str, arg: &str) -> Result<(), VendorError> {
        let mut state = self.state();
        state.call_log.push((method, arg.to_string()));
        match state.method_errors.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RadomClient for MockRadomClient {
    async fn create_checkout_session(
        &self,
        request: RadomCheckoutRequest,
    ) -> Result<RadomSessionCreated, VendorError> {
        self.record("create_checkout_session", &request.success_url)?;
        let mut state = self.state();
        state.created.push(request);
        let id = format!("radom_cs_{}", state.created.len());
        Ok(RadomSessionCreated {
            checkout_session_url: format!("https://pay.radom.test/{}", id),
            checkout_session_id: id,
        })
    }

    async fn get_checkout_session(&self, session_id: &str) -> Result<RadomCheckoutSession, VendorError> {
        self.record("get_checkout_session", session_id)?;
        self.state()
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| VendorError::not_found(Vendor::Radom, format!("checkout session {}", session_id)))
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<RadomSubscription, VendorError> {
        self.record("get_subscription", subscription_id)?;
        self.state()
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| VendorError::not_found(Vendor::Radom, format!("subscription {}", subscription_id)))
    }
}
