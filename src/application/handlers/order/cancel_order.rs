//! CancelOrderHandler - Cancels an order and any Stripe subscription billing it.
//!
//! Mobile orders are only canceled locally; the stores own their billing.

use std::sync::Arc;

use super::lifecycle::{cancel, load_order, locate_order};
use crate::domain::foundation::OrderId;
use crate::domain::order::{keys, MetadataValue, Order, OrderError};
use crate::domain::reconciliation::OrderLocator;
use crate::ports::{in_transaction, StripeClient, UnitOfWork};

#[derive(Debug, Clone)]
pub struct CancelOrderCommand {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOrderResult {
    pub order_id: OrderId,
    /// Stripe subscriptions canceled, or found already gone.
    pub canceled_subscriptions: Vec<String>,
    /// False when the order was already canceled.
    pub status_changed: bool,
}

pub struct CancelOrderHandler {
    uow: Arc<dyn UnitOfWork>,
    stripe: Arc<dyn StripeClient>,
}

impl CancelOrderHandler {
    pub fn new(uow: Arc<dyn UnitOfWork>, stripe: Arc<dyn StripeClient>) -> Self {
        Self { uow, stripe }
    }

    pub async fn handle(&self, cmd: CancelOrderCommand) -> Result<CancelOrderResult, OrderError> {
        let order_id = cmd.order_id;

        // 1. Load
        let order = in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move { load_order(repos, order_id).await })
        })
        .await?;

        // 2. Stop billing at the vendor
        let (canceled, discovered) = self.cancel_at_stripe(&order).await?;

        // 3. Cancel locally
        let status_changed = in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move {
                let order = locate_order(repos, &OrderLocator::Id(order_id)).await?;
                if let Some(sub_id) = discovered {
                    repos
                        .orders()
                        .append_metadata(order_id, keys::STRIPE_SUBSCRIPTION_ID, MetadataValue::from(sub_id))
                        .await?;
                }
                cancel(repos, &order).await
            })
        })
        .await?;

        tracing::info!(
            order_id = %order_id,
            canceled_subscriptions = ?canceled,
            status_changed,
            "order canceled"
        );

        Ok(CancelOrderResult {
            order_id,
            canceled_subscriptions: canceled,
            status_changed,
        })
    }

    /// Returns the subscriptions handled, and the id to record when it was
    /// found by search rather than read from metadata.
    async fn cancel_at_stripe(&self, order: &Order) -> Result<(Vec<String>, Option<String>), OrderError> {
        if let Some(sub_id) = order.metadata.stripe_subscription_id.as_deref() {
            self.cancel_subscription(order.id, sub_id).await?;
            return Ok((vec![sub_id.to_string()], None));
        }

        if order.is_ios() || order.is_android() {
            return Ok((Vec::new(), None));
        }

        let active = self.stripe.search_active_subscriptions(&order.id.to_string()).await?;
        let mut canceled = Vec::with_capacity(active.len());
        for sub in &active {
            self.cancel_subscription(order.id, &sub.id).await?;
            canceled.push(sub.id.clone());
        }

        let discovered = canceled.last().cloned();
        Ok((canceled, discovered))
    }

    async fn cancel_subscription(&self, order_id: OrderId, sub_id: &str) -> Result<(), OrderError> {
        match self.stripe.cancel_subscription(sub_id).await {
            Ok(()) => Ok(()),
            Err(e) if self.stripe.is_not_found(&e) => {
                tracing::warn!(
                    order_id = %order_id,
                    subscription_id = sub_id,
                    "stripe subscription already gone"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(order_id = %order_id, subscription_id = sub_id, error = %e, "failed to cancel stripe subscription");
                Err(e.into())
            }
        }
    }
}
