//! HandleRadomNotificationHandler - Applies an authenticated Radom webhook.

use std::sync::Arc;

use super::apply_intent::{apply_intent, ReconciliationOutcome};
use crate::domain::foundation::Timestamp;
use crate::domain::order::OrderError;
use crate::domain::reconciliation::radom::{RadomAction, RadomNotification};
use crate::domain::reconciliation::{Applied, OrderLocator, ReconciliationIntent};
use crate::domain::vendor::Vendor;
use crate::ports::{in_transaction, RadomClient, UnitOfWork};

#[derive(Debug, Clone)]
pub struct HandleRadomNotificationCommand {
    pub notification: RadomNotification,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleRadomNotificationResult {
    pub event_type: String,
    pub outcome: ReconciliationOutcome,
}

/// New subscriptions and payments are renewed from the subscription as the
/// Radom API reports it; cancellations and expiries cancel; payment attempt
/// failures are logged only.
pub struct HandleRadomNotificationHandler {
    uow: Arc<dyn UnitOfWork>,
    radom: Arc<dyn RadomClient>,
}

impl HandleRadomNotificationHandler {
    pub fn new(uow: Arc<dyn UnitOfWork>, radom: Arc<dyn RadomClient>) -> Self {
        Self { uow, radom }
    }

    pub async fn handle(
        &self,
        cmd: HandleRadomNotificationCommand,
    ) -> Result<HandleRadomNotificationResult, OrderError> {
        let event_type = cmd.notification.event_type.clone();

        // 1. Decide what the notification asks for
        let intent = match cmd.notification.action()? {
            RadomAction::NewSubscription { order_id, subscription_id } => {
                self.renewal(OrderLocator::Id(order_id), &subscription_id).await?
            }
            RadomAction::Payment { subscription_id } => {
                self.renewal(OrderLocator::RadomSubscription(subscription_id.clone()), &subscription_id)
                    .await?
            }
            RadomAction::Apply(intent) => intent,
            RadomAction::Informational { subscription_id } => {
                tracing::info!(
                    event_type = %event_type,
                    subscription_id = %subscription_id,
                    "radom payment notice"
                );
                return Ok(HandleRadomNotificationResult {
                    event_type,
                    outcome: ReconciliationOutcome::Skipped("informational"),
                });
            }
        };

        // 2. Apply
        let applied: Applied = in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move { apply_intent(repos, Vendor::Radom, &intent).await })
        })
        .await?;

        Ok(HandleRadomNotificationResult {
            event_type,
            outcome: ReconciliationOutcome::Applied(applied),
        })
    }

    async fn renewal(&self, order: OrderLocator, subscription_id: &str) -> Result<ReconciliationIntent, OrderError> {
        let subscription = self.radom.get_subscription(subscription_id).await.map_err(|e| {
            tracing::error!(error = %e, subscription_id, "radom subscription lookup failed");
            OrderError::from(e)
        })?;
        subscription.renewal(order, Timestamp::now())
    }
}
