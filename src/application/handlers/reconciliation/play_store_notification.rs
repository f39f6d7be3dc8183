//! HandlePlayStoreNotificationHandler - Applies a Google Play real-time developer notification.
//!
//! Renewal notifications carry no expiry, so the purchase is fetched from
//! the Play Developer API before the transaction opens.

use std::sync::Arc;

use super::apply_intent::{apply_intent, ReconciliationOutcome};
use crate::domain::foundation::Timestamp;
use crate::domain::order::OrderError;
use crate::domain::reconciliation::play_store::{
    notification_cutoff, renewal_for_purchase, DeveloperNotification, PlayStoreAction,
};
use crate::domain::reconciliation::{Applied, ReconciliationIntent};
use crate::domain::vendor::Vendor;
use crate::ports::{in_transaction, PlayStoreClient, UnitOfWork};

#[derive(Debug, Clone)]
pub struct HandlePlayStoreNotificationCommand {
    pub notification: DeveloperNotification,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlePlayStoreNotificationResult {
    pub outcome: ReconciliationOutcome,
}

pub struct HandlePlayStoreNotificationHandler {
    uow: Arc<dyn UnitOfWork>,
    play: Arc<dyn PlayStoreClient>,
    cutoff: Timestamp,
}

impl HandlePlayStoreNotificationHandler {
    pub fn new(uow: Arc<dyn UnitOfWork>, play: Arc<dyn PlayStoreClient>) -> Self {
        Self {
            uow,
            play,
            cutoff: notification_cutoff(),
        }
    }

    /// Overrides the earliest event time that is still acted on.
    pub fn with_cutoff(mut self, cutoff: Timestamp) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub async fn handle(
        &self,
        cmd: HandlePlayStoreNotificationCommand,
    ) -> Result<HandlePlayStoreNotificationResult, OrderError> {
        let skipped = |reason: &'static str| -> Result<HandlePlayStoreNotificationResult, OrderError> {
            tracing::debug!(
                package_name = %cmd.notification.package_name,
                event_time_millis = cmd.notification.event_time_millis,
                reason,
                "play store notification skipped"
            );
            Ok(HandlePlayStoreNotificationResult {
                outcome: ReconciliationOutcome::Skipped(reason),
            })
        };

        // 1. Decide what the notification asks for
        let intent = match cmd.notification.action(self.cutoff) {
            PlayStoreAction::Skip(reason) => return skipped(reason),
            PlayStoreAction::Apply(intent) => intent,
            PlayStoreAction::FetchAndRenew {
                package_name,
                subscription_id,
                purchase_token,
            } => {
                // 2. Fetch the current purchase state
                let purchase = self
                    .play
                    .get_subscription_purchase(&package_name, &subscription_id, &purchase_token)
                    .await
                    .map_err(|e| {
                        tracing::error!(error = %e, package_name = %package_name, "play purchase lookup failed");
                        OrderError::from(e)
                    })?;

                match renewal_for_purchase(&purchase_token, &purchase, Timestamp::now())? {
                    Some(intent) => intent,
                    None => return skipped("payment_pending"),
                }
            }
        };

        // 3. Apply
        let applied = self.apply(intent).await?;
        Ok(HandlePlayStoreNotificationResult {
            outcome: ReconciliationOutcome::Applied(applied),
        })
    }

    async fn apply(&self, intent: ReconciliationIntent) -> Result<Applied, OrderError> {
        in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move { apply_intent(repos, Vendor::PlayStore, &intent).await })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::adapters::playstore::MockPlayStoreClient;
    use crate::domain::foundation::OrderId;
    use crate::domain::order::{test_support, OrderStatus};
    use crate::domain::reconciliation::play_store::SubscriptionPurchase;
    use crate::domain::vendor::VendorError;
    use serde_json::{json, Value};

    const TOKEN: &str = "purchase-token-1";

    fn notification(body: Value) -> DeveloperNotification {
        serde_json::from_value(body).unwrap()
    }

    fn subscription(kind: i32) -> DeveloperNotification {
        notification(json!({
            "version": "1.0",
            "packageName": "com.brave.browser",
            "eventTimeMillis": Timestamp::now().as_unix_millis().to_string(),
            "subscriptionNotification": {
                "version": "1.0",
                "notificationType": kind,
                "purchaseToken": TOKEN,
                "subscriptionId": "brave.vpn.monthly"
            }
        }))
    }

    async fn setup(status: OrderStatus) -> (InMemoryStore, MockPlayStoreClient, OrderId, HandlePlayStoreNotificationHandler) {
        let store = InMemoryStore::new();
        let mut order = test_support::order(status);
        order.metadata.external_id = Some(TOKEN.to_string());
        order.metadata.vendor = Some(Vendor::PlayStore);
        let id = order.id;
        store.seed(order).await;

        let play = MockPlayStoreClient::new();
        let handler = HandlePlayStoreNotificationHandler::new(Arc::new(store.clone()), Arc::new(play.clone()));
        (store, play, id, handler)
    }

    // ════════════════════════════════════════════════════════════════
    // Renewals
    // ════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn renewed_fetches_purchase_and_adds_grace_day() {
        let (store, play, id, handler) = setup(OrderStatus::Paid).await;
        let expiry = Timestamp::now().plus_days(30);
        play.set_purchase(
            TOKEN,
            SubscriptionPurchase {
                expiry_time_millis: Some(expiry.as_unix_millis()),
                payment_state: Some(1),
                auto_renewing: Some(true),
            },
        );

        let result = handler
            .handle(HandlePlayStoreNotificationCommand { notification: subscription(2) })
            .await
            .unwrap();

        assert_eq!(result.outcome, ReconciliationOutcome::Applied(Applied::Renewed));
        assert_eq!(play.lookups(), vec![TOKEN.to_string()]);
        let order = store.order(id).await.unwrap();
        assert_eq!(
            order.expires_at.unwrap().as_unix_millis(),
            expiry.plus_days(1).as_unix_millis()
        );
    }

    #[tokio::test]
    async fn pending_payment_is_skipped() {
        let (store, play, id, handler) = setup(OrderStatus::Paid).await;
        play.set_purchase(
            TOKEN,
            SubscriptionPurchase {
                expiry_time_millis: Some(Timestamp::now().plus_days(30).as_unix_millis()),
                payment_state: Some(0),
                auto_renewing: Some(true),
            },
        );

        let result = handler
            .handle(HandlePlayStoreNotificationCommand { notification: subscription(2) })
            .await
            .unwrap();

        assert_eq!(result.outcome, ReconciliationOutcome::Skipped("payment_pending"));
        assert!(store.pay_history(id).await.is_empty());
    }

    #[tokio::test]
    async fn lookup_failure_writes_nothing() {
        let (store, play, id, handler) = setup(OrderStatus::Paid).await;
        play.fail_with(VendorError::network(Vendor::PlayStore, "timeout"));

        let err = handler
            .handle(HandlePlayStoreNotificationCommand { notification: subscription(2) })
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(store.pay_history(id).await.is_empty());
    }

    // ════════════════════════════════════════════════════════════════
    // Cancellations and skips
    // ════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn canceled_notification_cancels_without_lookup() {
        let (store, play, id, handler) = setup(OrderStatus::Paid).await;

        handler
            .handle(HandlePlayStoreNotificationCommand { notification: subscription(3) })
            .await
            .unwrap();

        assert!(play.lookups().is_empty());
        assert_eq!(store.order(id).await.unwrap().status, OrderStatus::Canceled);
    }

    #[tokio::test]
    async fn voided_subscription_cancels() {
        let (store, _, id, handler) = setup(OrderStatus::Paid).await;
        let ntf = notification(json!({
            "packageName": "com.brave.browser",
            "eventTimeMillis": Timestamp::now().as_unix_millis(),
            "voidedPurchaseNotification": {
                "purchaseToken": TOKEN,
                "orderId": "GPA.1234",
                "productType": 1
            }
        }));

        handler.handle(HandlePlayStoreNotificationCommand { notification: ntf }).await.unwrap();
        assert_eq!(store.order(id).await.unwrap().status, OrderStatus::Canceled);
    }

    #[tokio::test]
    async fn events_before_cutoff_are_skipped() {
        let (store, _, id, handler) = setup(OrderStatus::Paid).await;
        let handler = handler.with_cutoff(Timestamp::now().plus_days(1));

        let result = handler
            .handle(HandlePlayStoreNotificationCommand { notification: subscription(3) })
            .await
            .unwrap();

        assert_eq!(result.outcome, ReconciliationOutcome::Skipped("before_cutoff"));
        assert_eq!(store.order(id).await.unwrap().status, OrderStatus::Paid);
    }
}
