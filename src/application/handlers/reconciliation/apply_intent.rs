//! Applies a vendor-agnostic reconciliation intent to its order.

use crate::application::handlers::order::lifecycle::{
    accepts_renewal, cancel, claim_subscription, locate_order, renew_with_expiry_and_paid_time,
    reset_payment_failures,
};
use crate::domain::order::OrderError;
use crate::domain::reconciliation::{Applied, ReconciliationIntent};
use crate::domain::vendor::Vendor;
use crate::ports::RepositorySet;

/// What a webhook handler did with one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    Applied(Applied),
    /// Acknowledged without touching any order.
    Skipped(&'static str),
}

/// Runs `intent` against the order it locates.
///
/// Must be called inside a transaction: the order row is locked first and
/// every write shares the caller's scope.
pub async fn apply_intent(
    repos: &mut dyn RepositorySet,
    vendor: Vendor,
    intent: &ReconciliationIntent,
) -> Result<Applied, OrderError> {
    // 1. Lock the order
    let order = locate_order(repos, intent.order()).await?;

    // 2. Drive the state machine
    match intent {
        ReconciliationIntent::Renew(renewal) => {
            if !accepts_renewal(&order) {
                tracing::warn!(
                    order_id = %order.id,
                    vendor = %vendor,
                    "renewal for canceled order ignored"
                );
                return Ok(Applied::AlreadyCanceled);
            }

            renew_with_expiry_and_paid_time(repos, order.id, renewal.expires_at, renewal.paid_at).await?;
            claim_subscription(repos, &order, vendor, renewal.subscription_id.as_deref()).await?;
            reset_payment_failures(repos, order.id).await?;

            tracing::info!(
                order_id = %order.id,
                vendor = %vendor,
                expires_at = %renewal.expires_at,
                "order renewed"
            );
            Ok(Applied::Renewed)
        }
        ReconciliationIntent::Cancel(_) => {
            if !cancel(repos, &order).await? {
                tracing::debug!(order_id = %order.id, vendor = %vendor, "order already canceled");
                return Ok(Applied::AlreadyCanceled);
            }
            // Radom keeps a failure streak per subscription; other vendors
            // leave the counter as history.
            if vendor == Vendor::Radom {
                reset_payment_failures(repos, order.id).await?;
            }

            tracing::info!(order_id = %order.id, vendor = %vendor, "order canceled");
            Ok(Applied::Canceled)
        }
        ReconciliationIntent::RecordFailure(failure) => {
            repos.orders().increment_num_pay_failed(order.id).await?;
            claim_subscription(repos, &order, vendor, failure.subscription_id.as_deref()).await?;

            tracing::warn!(order_id = %order.id, vendor = %vendor, "payment failure recorded");
            Ok(Applied::FailureRecorded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::foundation::{OrderId, Timestamp};
    use crate::domain::order::{test_support, Order, OrderStatus};
    use crate::domain::reconciliation::{Cancellation, OrderLocator, PaymentFailure, Renewal};
    use crate::ports::in_transaction;

    async fn run(store: &InMemoryStore, vendor: Vendor, intent: ReconciliationIntent) -> Result<Applied, OrderError> {
        in_transaction(store, move |repos| {
            Box::pin(async move { apply_intent(repos, vendor, &intent).await })
        })
        .await
    }

    async fn seeded(order: Order) -> (InMemoryStore, OrderId) {
        let store = InMemoryStore::new();
        let id = order.id;
        store.seed(order).await;
        (store, id)
    }

    fn renewal(id: OrderId, sub: &str, expires_at: Timestamp) -> ReconciliationIntent {
        ReconciliationIntent::Renew(Renewal {
            order: OrderLocator::Id(id),
            subscription_id: Some(sub.to_string()),
            period_start: None,
            expires_at,
            paid_at: Timestamp::now(),
        })
    }

    // ════════════════════════════════════════════════════════════════
    // Renew
    // ════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn renew_marks_paid_and_resets_failures() {
        let mut order = test_support::order(OrderStatus::Pending);
        order.metadata.num_payment_failed = Some(3);
        let (store, id) = seeded(order).await;
        let expires = Timestamp::now().plus_days(31);

        let applied = run(&store, Vendor::Stripe, renewal(id, "sub_1", expires)).await.unwrap();

        assert_eq!(applied, Applied::Renewed);
        let order = store.order(id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.expires_at, Some(expires));
        assert_eq!(order.metadata.num_payment_failed, Some(0));
        assert_eq!(order.metadata.stripe_subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(store.pay_history(id).await.len(), 1);
    }

    #[tokio::test]
    async fn renew_of_canceled_order_writes_nothing() {
        let (store, id) = seeded(test_support::order(OrderStatus::Canceled)).await;

        let applied = run(&store, Vendor::Stripe, renewal(id, "sub_1", Timestamp::now().plus_days(1)))
            .await
            .unwrap();

        assert_eq!(applied, Applied::AlreadyCanceled);
        let order = store.order(id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Canceled);
        assert_eq!(order.expires_at, None);
        assert!(store.pay_history(id).await.is_empty());
    }

    #[tokio::test]
    async fn renew_of_missing_order_is_not_found() {
        let store = InMemoryStore::new();
        let err = run(&store, Vendor::Stripe, renewal(OrderId::new(), "sub_1", Timestamp::now()))
            .await
            .unwrap_err();
        assert_eq!(err, OrderError::OrderNotFound);
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_partial_renewal() {
        let (store, id) = seeded(test_support::order(OrderStatus::Pending)).await;
        store.fail_next_commit();

        let result = run(&store, Vendor::Stripe, renewal(id, "sub_1", Timestamp::now().plus_days(1))).await;

        assert!(result.is_err());
        let order = store.order(id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(store.pay_history(id).await.is_empty());
    }

    // ════════════════════════════════════════════════════════════════
    // Cancel
    // ════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn cancel_is_idempotent_under_redelivery() {
        let (store, id) = seeded(test_support::order(OrderStatus::Paid)).await;
        let intent = ReconciliationIntent::Cancel(Cancellation {
            order: OrderLocator::Id(id),
            subscription_id: None,
        });

        assert_eq!(run(&store, Vendor::Stripe, intent.clone()).await.unwrap(), Applied::Canceled);
        assert_eq!(run(&store, Vendor::Stripe, intent).await.unwrap(), Applied::AlreadyCanceled);
        assert_eq!(store.order(id).await.unwrap().status, OrderStatus::Canceled);
    }

    fn cancellation(id: OrderId) -> ReconciliationIntent {
        ReconciliationIntent::Cancel(Cancellation {
            order: OrderLocator::Id(id),
            subscription_id: None,
        })
    }

    #[tokio::test]
    async fn radom_cancel_resets_failures() {
        let mut order = test_support::order(OrderStatus::Paid);
        order.metadata.num_payment_failed = Some(2);
        let (store, id) = seeded(order).await;

        assert_eq!(run(&store, Vendor::Radom, cancellation(id)).await.unwrap(), Applied::Canceled);

        assert_eq!(store.order(id).await.unwrap().metadata.num_payment_failed, Some(0));
    }

    #[tokio::test]
    async fn stripe_cancel_keeps_failure_count() {
        let mut order = test_support::order(OrderStatus::Paid);
        order.metadata.num_payment_failed = Some(2);
        let (store, id) = seeded(order).await;

        assert_eq!(run(&store, Vendor::Stripe, cancellation(id)).await.unwrap(), Applied::Canceled);

        let order = store.order(id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Canceled);
        assert_eq!(order.metadata.num_payment_failed, Some(2));
    }

    #[tokio::test]
    async fn cancel_by_external_id() {
        let mut order = test_support::order(OrderStatus::Paid);
        order.metadata.external_id = Some("token-1".to_string());
        let (store, id) = seeded(order).await;

        let intent = ReconciliationIntent::Cancel(Cancellation {
            order: OrderLocator::ExternalId("token-1".to_string()),
            subscription_id: None,
        });
        assert_eq!(run(&store, Vendor::PlayStore, intent).await.unwrap(), Applied::Canceled);
        assert_eq!(store.order(id).await.unwrap().status, OrderStatus::Canceled);
    }

    // ════════════════════════════════════════════════════════════════
    // RecordFailure
    // ════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn failures_accumulate() {
        let (store, id) = seeded(test_support::order(OrderStatus::Paid)).await;
        let intent = ReconciliationIntent::RecordFailure(PaymentFailure {
            order: OrderLocator::Id(id),
            subscription_id: Some("sub_1".to_string()),
        });

        run(&store, Vendor::Stripe, intent.clone()).await.unwrap();
        run(&store, Vendor::Stripe, intent).await.unwrap();

        let order = store.order(id).await.unwrap();
        assert_eq!(order.metadata.num_payment_failed, Some(2));
        assert_eq!(order.status, OrderStatus::Paid);
    }
}
