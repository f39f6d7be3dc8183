//! Stripe API port.
//!
//! Narrow surface over the Stripe REST API: checkout sessions, customers
//! and subscriptions. Errors are [`VendorError`]s tagged with `Vendor::Stripe`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::domain::vendor::VendorError;

/// Stripe's error code for a missing object.
pub const STRIPE_RESOURCE_MISSING: &str = "resource_missing";

#[async_trait]
pub trait StripeClient: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<StripeCheckoutSession, VendorError>;

    async fn get_checkout_session(&self, session_id: &str) -> Result<StripeCheckoutSession, VendorError>;

    /// First customer registered under `email`, if any.
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<String>, VendorError>;

    async fn get_subscription(&self, subscription_id: &str) -> Result<StripeSubscription, VendorError>;

    /// Cancels immediately.
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), VendorError>;

    /// Active subscriptions whose metadata `orderID` equals `order_id`.
    async fn search_active_subscriptions(&self, order_id: &str) -> Result<Vec<StripeSubscription>, VendorError>;

    /// Whether `err` means the object is gone.
    ///
    /// Stripe sometimes answers 429 with `resource_missing` for deleted
    /// objects, so both statuses count.
    fn is_not_found(&self, err: &VendorError) -> bool {
        matches!(err.http_status, Some(404) | Some(429))
            && err.provider_code.as_deref() == Some(STRIPE_RESOURCE_MISSING)
    }
}

/// Parameters for a subscription-mode checkout session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckoutSessionRequest {
    pub client_reference_id: String,
    pub customer: Option<String>,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub line_items: Vec<CheckoutLineItem>,
    pub trial_period_days: Option<i64>,
    /// Coupon ids.
    pub discounts: Vec<String>,
    pub allow_promotion_codes: bool,
    pub subscription_metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutLineItem {
    /// Stripe price id.
    pub price: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

impl StripeCheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub current_period_start: i64,
    #[serde(default)]
    pub current_period_end: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vendor::{Vendor, VendorErrorCode};

    struct Classifier;

    #[async_trait]
    impl StripeClient for Classifier {
        async fn create_checkout_session(&self, _: CheckoutSessionRequest) -> Result<StripeCheckoutSession, VendorError> {
            unimplemented!()
        }
        async fn get_checkout_session(&self, _: &str) -> Result<StripeCheckoutSession, VendorError> {
            unimplemented!()
        }
        async fn find_customer_by_email(&self, _: &str) -> Result<Option<String>, VendorError> {
            unimplemented!()
        }
        async fn get_subscription(&self, _: &str) -> Result<StripeSubscription, VendorError> {
            unimplemented!()
        }
        async fn cancel_subscription(&self, _: &str) -> Result<(), VendorError> {
            unimplemented!()
        }
        async fn search_active_subscriptions(&self, _: &str) -> Result<Vec<StripeSubscription>, VendorError> {
            unimplemented!()
        }
    }

    fn err(status: u16, code: Option<&str>) -> VendorError {
        let e = VendorError::new(Vendor::Stripe, VendorErrorCode::NotFound, "x").with_status(status);
        match code {
            Some(c) => e.with_provider_code(c),
            None => e,
        }
    }

    #[test]
    fn not_found_requires_resource_missing() {
        assert!(Classifier.is_not_found(&err(404, Some("resource_missing"))));
        assert!(Classifier.is_not_found(&err(429, Some("resource_missing"))));
        assert!(!Classifier.is_not_found(&err(404, None)));
        assert!(!Classifier.is_not_found(&err(429, Some("rate_limit"))));
        assert!(!Classifier.is_not_found(&err(500, Some("resource_missing"))));
    }

    #[test]
    fn stripe_client_is_object_safe() {
        fn _accepts_dyn(_client: &dyn StripeClient) {}
    }
}
