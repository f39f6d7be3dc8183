//! Stripe Checkout sessions bound to an order.
//!
//! - `create_stripe_session` builds and opens a subscription-mode session
//! - `UpdateOrderStripeSessionHandler` replaces an expired session, or
//!   renews the order when the expired session turns out to be paid

use std::collections::BTreeMap;
use std::sync::Arc;

use url::Url;

use crate::application::handlers::order::lifecycle::load_order;
use crate::application::handlers::reconciliation::apply_intent;
use crate::domain::foundation::{OrderId, Timestamp};
use crate::domain::order::{keys, MetadataValue, Order, OrderError};
use crate::domain::reconciliation::stripe::STRIPE_GRACE_HOURS;
use crate::domain::reconciliation::{Applied, OrderLocator, ReconciliationIntent, Renewal};
use crate::domain::vendor::Vendor;
use crate::ports::{
    in_transaction, CheckoutLineItem, CheckoutSessionRequest, StripeCheckoutSession, StripeClient, UnitOfWork,
};

/// Subscription metadata key Stripe events carry the order id under.
pub const STRIPE_ORDER_ID_KEY: &str = "orderID";

/// Who the session is opened for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripeCustomer {
    pub customer: Option<String>,
    pub email: Option<String>,
}

impl StripeCustomer {
    /// Customer and email recorded on an earlier session.
    pub fn from_session(session: &StripeCheckoutSession) -> Self {
        Self {
            customer: session.customer.clone(),
            email: session.customer_email.clone(),
        }
    }
}

/// Everything a new session needs besides the order.
#[derive(Debug, Clone, Default)]
pub struct StripeSessionParams {
    pub customer: StripeCustomer,
    pub success_url: String,
    pub cancel_url: String,
    pub trial_days: i64,
    pub discounts: Vec<String>,
}

/// Resolves the customer: an explicit id wins, then a customer already
/// registered under `email`, then the bare email.
pub async fn resolve_customer(
    stripe: &dyn StripeClient,
    customer_id: Option<&str>,
    email: Option<&str>,
) -> StripeCustomer {
    if let Some(id) = customer_id.filter(|id| !id.is_empty()) {
        return StripeCustomer {
            customer: Some(id.to_string()),
            email: None,
        };
    }

    let Some(email) = email.filter(|e| !e.is_empty()) else {
        return StripeCustomer::default();
    };

    match stripe.find_customer_by_email(email).await {
        Ok(Some(customer)) => StripeCustomer {
            customer: Some(customer),
            email: None,
        },
        Ok(None) => StripeCustomer {
            customer: None,
            email: Some(email.to_string()),
        },
        Err(err) => {
            tracing::warn!(error = %err, "stripe customer lookup failed, falling back to email");
            StripeCustomer {
                customer: None,
                email: Some(email.to_string()),
            }
        }
    }
}

/// Appends `order_id=<id>` to a redirect url.
pub fn with_order_id(raw: &str, order_id: OrderId) -> Result<String, OrderError> {
    let mut url = Url::parse(raw).map_err(|e| OrderError::InvalidUrl(format!("{}: {}", raw, e)))?;
    url.query_pairs_mut().append_pair("order_id", &order_id.to_string());
    Ok(url.into())
}

/// Session parameters for `order`.
pub fn checkout_request(order: &Order, params: StripeSessionParams) -> Result<CheckoutSessionRequest, OrderError> {
    let line_items = order
        .items
        .iter()
        .map(|item| {
            let price = item.stripe_price_id().ok_or_else(|| {
                OrderError::invalid_order_request(format!("item {} has no stripe price", item.sku_variant))
            })?;
            Ok(CheckoutLineItem {
                price: price.to_string(),
                quantity: i64::from(item.quantity),
            })
        })
        .collect::<Result<Vec<_>, OrderError>>()?;

    if line_items.is_empty() {
        return Err(OrderError::InvalidOrderNoItems);
    }

    let mut subscription_metadata = BTreeMap::new();
    subscription_metadata.insert(STRIPE_ORDER_ID_KEY.to_string(), order.id.to_string());

    Ok(CheckoutSessionRequest {
        client_reference_id: order.id.to_string(),
        customer: params.customer.customer,
        customer_email: params.customer.email,
        success_url: params.success_url,
        cancel_url: params.cancel_url,
        line_items,
        trial_period_days: (params.trial_days > 0).then_some(params.trial_days),
        allow_promotion_codes: params.discounts.is_empty(),
        discounts: params.discounts,
        subscription_metadata,
    })
}

/// Opens a checkout session for `order`.
pub async fn create_stripe_session(
    stripe: &dyn StripeClient,
    order: &Order,
    params: StripeSessionParams,
) -> Result<StripeCheckoutSession, OrderError> {
    let request = checkout_request(order, params)?;
    stripe.create_checkout_session(request).await.map_err(|e| {
        tracing::error!(order_id = %order.id, error = %e, "failed to create stripe checkout session");
        OrderError::from(e)
    })
}

// ════════════════════════════════════════════════════════════════════════════
// UpdateOrderStripeSession
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct UpdateOrderStripeSessionCommand {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOrderStripeSessionResult {
    /// No expired session to replace.
    Unchanged,
    Recreated { session_id: String },
    /// The expired session had been paid; the order was renewed instead.
    Renewed(Applied),
}

pub struct UpdateOrderStripeSessionHandler {
    uow: Arc<dyn UnitOfWork>,
    stripe: Arc<dyn StripeClient>,
}

impl UpdateOrderStripeSessionHandler {
    pub fn new(uow: Arc<dyn UnitOfWork>, stripe: Arc<dyn StripeClient>) -> Self {
        Self { uow, stripe }
    }

    pub async fn handle(
        &self,
        cmd: UpdateOrderStripeSessionCommand,
    ) -> Result<UpdateOrderStripeSessionResult, OrderError> {
        let order_id = cmd.order_id;

        // 1. Load the order and its expired session, if any
        let (order, expired) = in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move {
                let order = load_order(repos, order_id).await?;
                let expired = repos.orders().get_expired_checkout_session_id(order_id).await?;
                Ok::<_, OrderError>((order, expired))
            })
        })
        .await?;

        let Some(old_session_id) = expired else {
            return Ok(UpdateOrderStripeSessionResult::Unchanged);
        };

        // 2. Fetch the old session
        let old = self.stripe.get_checkout_session(&old_session_id).await?;

        // 3. Paid after all: renew from its subscription
        if old.is_paid() {
            let applied = self.renew_from_session(order_id, &old).await?;
            return Ok(UpdateOrderStripeSessionResult::Renewed(applied));
        }

        // 4. Replace it
        let params = StripeSessionParams {
            customer: StripeCustomer::from_session(&old),
            success_url: old
                .success_url
                .clone()
                .ok_or_else(|| OrderError::invalid_vendor_data("stripe session without success_url"))?,
            cancel_url: old
                .cancel_url
                .clone()
                .ok_or_else(|| OrderError::invalid_vendor_data("stripe session without cancel_url"))?,
            trial_days: order.trial_days(),
            discounts: Vec::new(),
        };
        let session = create_stripe_session(self.stripe.as_ref(), &order, params).await?;

        let session_id = session.id.clone();
        in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move {
                repos
                    .orders()
                    .append_metadata(order_id, keys::STRIPE_CHECKOUT_SESSION_ID, MetadataValue::from(session_id))
                    .await?;
                Ok::<_, OrderError>(())
            })
        })
        .await?;

        tracing::info!(
            order_id = %order_id,
            old_session_id = %old_session_id,
            session_id = %session.id,
            "stripe checkout session recreated"
        );
        Ok(UpdateOrderStripeSessionResult::Recreated { session_id: session.id })
    }

    async fn renew_from_session(&self, order_id: OrderId, session: &StripeCheckoutSession) -> Result<Applied, OrderError> {
        let subscription_id = session
            .subscription
            .as_deref()
            .ok_or_else(|| OrderError::invalid_vendor_data("paid stripe session without subscription"))?;
        let subscription = self.stripe.get_subscription(subscription_id).await?;

        let period_end = Some(subscription.current_period_end)
            .filter(|end| *end != 0)
            .and_then(Timestamp::from_unix_secs)
            .ok_or(OrderError::InvalidSubPeriod)?;

        let intent = ReconciliationIntent::Renew(Renewal {
            order: OrderLocator::Id(order_id),
            subscription_id: Some(subscription.id.clone()),
            period_start: Timestamp::from_unix_secs(subscription.current_period_start),
            expires_at: period_end.plus_hours(STRIPE_GRACE_HOURS),
            paid_at: Timestamp::now(),
        });

        in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move { apply_intent(repos, Vendor::Stripe, &intent).await })
        })
        .await
    }
}
