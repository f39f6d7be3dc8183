//! Mock Stripe client for testing.
//!
//! Supports:
//! - Pre-configured sessions, subscriptions and customers
//! - Error injection per method
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::vendor::{Vendor, VendorError};
use crate::ports::{
    CheckoutSessionRequest, StripeCheckoutSession, StripeClient, StripeSubscription, STRIPE_RESOURCE_MISSING,
};

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: &'static str,
    pub arg: String,
}

#[derive(Default)]
struct MockState {
    sessions: HashMap<String, StripeCheckoutSession>,
    subscriptions: HashMap<String, StripeSubscription>,
    customers: HashMap<String, String>,
    active_by_order: HashMap<String, Vec<StripeSubscription>>,
    created: Vec<CheckoutSessionRequest>,
    canceled: Vec<String>,
    method_errors: HashMap<&'static str, VendorError>,
    call_log: Vec<MethodCall>,
}

/// In-process `StripeClient`.
#[derive(Clone, Default)]
pub struct MockStripeClient {
    inner: Arc<Mutex<MockState>>,
}

impl MockStripeClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration
    // ════════════════════════════════════════════════════════════════════════════

    pub fn add_session(&self, session: StripeCheckoutSession) {
        self.state().sessions.insert(session.id.clone(), session);
    }

    pub fn add_subscription(&self, subscription: StripeSubscription) {
        self.state().subscriptions.insert(subscription.id.clone(), subscription);
    }

    pub fn add_customer(&self, email: impl Into<String>, customer_id: impl Into<String>) {
        self.state().customers.insert(email.into(), customer_id.into());
    }

    /// Registers an active subscription tagged with `order_id`.
    pub fn add_active_for_order(&self, order_id: impl Into<String>, subscription: StripeSubscription) {
        self.state()
            .active_by_order
            .entry(order_id.into())
            .or_default()
            .push(subscription);
    }

    /// Makes every call to `method` fail with `err`.
    pub fn fail(&self, method: &'static str, err: VendorError) {
        self.state().method_errors.insert(method, err);
    }

    /// Makes `cancel_subscription` answer Stripe's "already gone" error.
    pub fn fail_cancel_with_resource_missing(&self) {
        self.fail(
            "cancel_subscription",
            VendorError::not_found(Vendor::Stripe, "No such subscription")
                .with_provider_code(STRIPE_RESOURCE_MISSING),
        );
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════════════════════════════════════

    pub fn created_sessions(&self) -> Vec<CheckoutSessionRequest> {
        self.state().created.clone()
    }

    pub fn canceled_subscriptions(&self) -> Vec<String> {
        self.state().canceled.clone()
    }

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    fn record(&self, method: &'static str, arg: impl Into<String>) -> Result<(), VendorError> {
        let mut state = self.state();
        state.call_log.push(MethodCall { method, arg: arg.into() });
        match state.method_errors.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StripeClient for MockStripeClient {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<StripeCheckoutSession, VendorError> {
        self.record("create_checkout_session", request.client_reference_id.clone())?;

        let mut state = self.state();
        let id = format!("cs_test_{}", state.created.len() + 1);
        let session = StripeCheckoutSession {
            id: id.clone(),
            url: Some(format!("https://checkout.stripe.com/c/pay/{}", id)),
            payment_status: "unpaid".to_string(),
            subscription: None,
            customer: request.customer.clone(),
            customer_email: request.customer_email.clone(),
            success_url: Some(request.success_url.clone()),
            cancel_url: Some(request.cancel_url.clone()),
        };
        state.created.push(request);
        state.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn get_checkout_session(&self, session_id: &str) -> Result<StripeCheckoutSession, VendorError> {
        self.record("get_checkout_session", session_id)?;
        self.state()
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| missing(session_id))
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>, VendorError> {
        self.record("find_customer_by_email", email)?;
        Ok(self.state().customers.get(email).cloned())
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<StripeSubscription, VendorError> {
        self.record("get_subscription", subscription_id)?;
        self.state()
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| missing(subscription_id))
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), VendorError> {
        self.record("cancel_subscription", subscription_id)?;
        self.state().canceled.push(subscription_id.to_string());
        Ok(())
    }

    async fn search_active_subscriptions(&self, order_id: &str) -> Result<Vec<StripeSubscription>, VendorError> {
        self.record("search_active_subscriptions", order_id)?;
        Ok(self.state().active_by_order.get(order_id).cloned().unwrap_or_default())
    }
}

fn missing(id: &str) -> VendorError {
    VendorError::not_found(Vendor::Stripe, format!("No such object: {}", id))
        .with_provider_code(STRIPE_RESOURCE_MISSING)
}
