//! SetOrderTrialDaysHandler - Changes an order's trial length.
//!
//! A pending order gets a fresh Stripe checkout session carrying the new
//! trial; the old session keeps the trial it was opened with.

use std::sync::Arc;

use super::lifecycle::load_order;
use crate::application::handlers::checkout::{create_stripe_session, StripeCustomer, StripeSessionParams};
use crate::domain::foundation::{OrderId, Timestamp};
use crate::domain::order::{keys, MetadataValue, OrderError};
use crate::ports::{in_transaction, StripeClient, UnitOfWork};

#[derive(Debug, Clone)]
pub struct SetOrderTrialDaysCommand {
    pub order_id: OrderId,
    pub trial_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOrderTrialDaysResult {
    pub order_id: OrderId,
    /// The replacement checkout session, when one was opened.
    pub checkout_session_id: Option<String>,
}

pub struct SetOrderTrialDaysHandler {
    uow: Arc<dyn UnitOfWork>,
    stripe: Arc<dyn StripeClient>,
}

impl SetOrderTrialDaysHandler {
    pub fn new(uow: Arc<dyn UnitOfWork>, stripe: Arc<dyn StripeClient>) -> Self {
        Self { uow, stripe }
    }

    pub async fn handle(&self, cmd: SetOrderTrialDaysCommand) -> Result<SetOrderTrialDaysResult, OrderError> {
        if cmd.trial_days < 0 {
            return Err(OrderError::invalid_order_request("trial days must not be negative"));
        }
        let order_id = cmd.order_id;
        let days = cmd.trial_days;
        let now = Timestamp::now();

        // 1. Store the new trial length
        let mut order = in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move {
                let order = load_order(repos, order_id).await?;
                repos.orders().set_trial_days(order_id, days).await?;
                Ok::<_, OrderError>(order)
            })
        })
        .await?;
        order.trial_days = Some(days);

        let unchanged = SetOrderTrialDaysResult {
            order_id,
            checkout_session_id: None,
        };

        // 2. Paid orders keep their subscription as is
        if order.is_paid(now) && !order.is_expired(now) {
            return Ok(unchanged);
        }

        // 3. Reopen checkout with the new trial
        let old_id = order
            .metadata
            .stripe_checkout_session_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(OrderError::NoStripeCheckoutSessionId)?;
        let old = self.stripe.get_checkout_session(&old_id).await?;

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
            trial_days: days,
            discounts: Vec::new(),
        };
        let session = create_stripe_session(self.stripe.as_ref(), &order, params).await?;

        // 4. Record the new session
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

        tracing::info!(order_id = %order_id, trial_days = days, session_id = %session.id, "trial days updated");

        Ok(SetOrderTrialDaysResult {
            order_id,
            checkout_session_id: Some(session.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::adapters::stripe::MockStripeClient;
    use crate::domain::order::{test_support, CredentialType, Order, OrderStatus, STRIPE_ITEM_ID_KEY};
    use crate::ports::StripeCheckoutSession;

    fn pending_order() -> Order {
        let mut order = test_support::order(OrderStatus::Pending);
        let mut item = test_support::item(order.id, CredentialType::TimeLimitedV2, 1);
        item.metadata.insert(STRIPE_ITEM_ID_KEY.to_string(), "price_vpn".to_string());
        order.items = vec![item];
        order
    }

    fn old_session() -> StripeCheckoutSession {
        StripeCheckoutSession {
            id: "cs_old".to_string(),
            url: None,
            payment_status: "unpaid".to_string(),
            subscription: None,
            customer: None,
            customer_email: Some("buyer@brave.com".to_string()),
            success_url: Some("https://account.brave.com/ok".to_string()),
            cancel_url: Some("https://account.brave.com/cancel".to_string()),
        }
    }

    async fn setup(order: Order) -> (InMemoryStore, MockStripeClient, SetOrderTrialDaysHandler) {
        let store = InMemoryStore::new();
        store.seed(order).await;
        let stripe = MockStripeClient::new();
        stripe.add_session(old_session());
        let handler = SetOrderTrialDaysHandler::new(Arc::new(store.clone()), Arc::new(stripe.clone()));
        (store, stripe, handler)
    }

    #[tokio::test]
    async fn pending_order_gets_new_session_with_trial() {
        let mut order = pending_order();
        order.metadata.stripe_checkout_session_id = Some("cs_old".to_string());
        let id = order.id;
        let (store, stripe, handler) = setup(order).await;

        let result = handler
            .handle(SetOrderTrialDaysCommand { order_id: id, trial_days: 7 })
            .await
            .unwrap();

        let created = stripe.created_sessions();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].trial_period_days, Some(7));
        assert_eq!(created[0].customer_email.as_deref(), Some("buyer@brave.com"));

        let stored = store.order(id).await.unwrap();
        assert_eq!(stored.trial_days, Some(7));
        assert_eq!(stored.metadata.stripe_checkout_session_id, result.checkout_session_id);
    }

    #[tokio::test]
    async fn pending_order_without_session_fails() {
        let order = pending_order();
        let id = order.id;
        let (_, _, handler) = setup(order).await;

        let err = handler
            .handle(SetOrderTrialDaysCommand { order_id: id, trial_days: 7 })
            .await
            .unwrap_err();
        assert_eq!(err, OrderError::NoStripeCheckoutSessionId);
    }

    #[tokio::test]
    async fn paid_order_only_stores_the_trial() {
        let mut order = pending_order();
        order.status = OrderStatus::Paid;
        order.expires_at = Some(Timestamp::now().plus_days(10));
        let id = order.id;
        let (store, stripe, handler) = setup(order).await;

        let result = handler
            .handle(SetOrderTrialDaysCommand { order_id: id, trial_days: 14 })
            .await
            .unwrap();

        assert_eq!(result.checkout_session_id, None);
        assert!(stripe.calls().is_empty());
        assert_eq!(store.order(id).await.unwrap().trial_days, Some(14));
    }

    #[tokio::test]
    async fn negative_trial_is_rejected() {
        let (_, _, handler) = setup(pending_order()).await;
        let err = handler
            .handle(SetOrderTrialDaysCommand { order_id: OrderId::new(), trial_days: -1 })
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidOrderRequest(_)));
    }
}
