//! HandleStripeWebhookHandler - Applies a verified Stripe event.
//!
//! `invoice.paid` renews, `invoice.payment_failed` counts a failure and
//! `customer.subscription.deleted` cancels. A paid invoice that carries
//! monthly-to-annual linkage also retires the superseded subscription and
//! order once the renewal has committed.

use std::sync::Arc;

use super::apply_intent::{apply_intent, ReconciliationOutcome};
use crate::application::handlers::order::lifecycle::{cancel, locate_order};
use crate::domain::foundation::Timestamp;
use crate::domain::order::OrderError;
use crate::domain::reconciliation::stripe::{LinkedSubscription, StripeEvent, StripeNotification};
use crate::domain::reconciliation::{Applied, OrderLocator};
use crate::domain::vendor::Vendor;
use crate::ports::{in_transaction, StripeClient, UnitOfWork};

/// Command carrying an event whose signature was already verified.
#[derive(Debug, Clone)]
pub struct HandleStripeWebhookCommand {
    pub event: StripeEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleStripeWebhookResult {
    pub event_id: String,
    pub outcome: ReconciliationOutcome,
    /// Whether a superseded monthly subscription was retired.
    pub superseded_canceled: bool,
}

pub struct HandleStripeWebhookHandler {
    uow: Arc<dyn UnitOfWork>,
    stripe: Arc<dyn StripeClient>,
}

impl HandleStripeWebhookHandler {
    pub fn new(uow: Arc<dyn UnitOfWork>, stripe: Arc<dyn StripeClient>) -> Self {
        Self { uow, stripe }
    }

    pub async fn handle(&self, cmd: HandleStripeWebhookCommand) -> Result<HandleStripeWebhookResult, OrderError> {
        let event_id = cmd.event.id.clone();

        // 1. Narrow the event and map it to an intent
        let notification = StripeNotification::from_event(&cmd.event)?;
        let intent = match notification.intent(Timestamp::now())? {
            Some(intent) => intent,
            None => {
                tracing::debug!(
                    event_id = %event_id,
                    event_type = %notification.event_type(),
                    "stripe event skipped"
                );
                return Ok(HandleStripeWebhookResult {
                    event_id,
                    outcome: ReconciliationOutcome::Skipped("unhandled_event_type"),
                    superseded_canceled: false,
                });
            }
        };

        // 2. Validate linkage before writing anything
        let linked = notification.linked_subscription()?;

        // 3. Apply in one transaction
        let applied = in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move { apply_intent(repos, Vendor::Stripe, &intent).await })
        })
        .await?;

        // 4. Retire the superseded monthly subscription
        let superseded_canceled = match linked {
            Some(linked) if applied == Applied::Renewed => {
                self.retire_superseded(&event_id, linked).await?;
                true
            }
            _ => false,
        };

        Ok(HandleStripeWebhookResult {
            event_id,
            outcome: ReconciliationOutcome::Applied(applied),
            superseded_canceled,
        })
    }

    async fn retire_superseded(&self, event_id: &str, linked: LinkedSubscription) -> Result<(), OrderError> {
        if let Err(err) = self.stripe.cancel_subscription(&linked.stripe_subscription_id).await {
            if !self.stripe.is_not_found(&err) {
                tracing::error!(
                    event_id = %event_id,
                    stripe_subscription_id = %linked.stripe_subscription_id,
                    error = %err,
                    "failed to cancel superseded subscription"
                );
                return Err(err.into());
            }
            tracing::warn!(
                event_id = %event_id,
                stripe_subscription_id = %linked.stripe_subscription_id,
                "superseded subscription already gone"
            );
        }

        let old_order = linked.order_id;
        in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move {
                let order = locate_order(repos, &OrderLocator::Id(old_order)).await?;
                cancel(repos, &order).await
            })
        })
        .await?;

        tracing::info!(
            event_id = %event_id,
            order_id = %old_order,
            coupon_id = %linked.coupon_id,
            "superseded order canceled"
        );
        Ok(())
    }
}
