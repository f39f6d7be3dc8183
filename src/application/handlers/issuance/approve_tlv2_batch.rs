//! ApproveTlv2BatchHandler - Gatekeeper for time-limited-v2 signing requests.
//!
//! The guard and the submission-log insert share one transaction, with the
//! order row locked, so two identical requests cannot both pass.

use std::sync::Arc;

use super::resolve_item;
use crate::application::handlers::order::lifecycle::locate_order;
use crate::domain::foundation::{ErrorCode, OrderId, OrderItemId, Timestamp};
use crate::domain::issuance::{check_num_blinded_creds, check_tlv2_batch, Tlv2Submission, MAX_TLV2_BATCHES};
use crate::domain::order::{CredentialType, OrderError};
use crate::domain::reconciliation::OrderLocator;
use crate::ports::{in_transaction, UnitOfWork};

#[derive(Debug, Clone)]
pub struct ApproveTlv2BatchCommand {
    pub order_id: OrderId,
    /// Falls back to the order's first item when absent.
    pub item_id: Option<OrderItemId>,
    pub request_id: String,
    pub blinded_creds: Vec<String>,
    pub valid_from: Timestamp,
    pub valid_to: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveTlv2BatchResult {
    pub item_id: OrderItemId,
    /// Batches the item already held in the window before this one.
    pub batches_in_window: i64,
}

pub struct ApproveTlv2BatchHandler {
    uow: Arc<dyn UnitOfWork>,
}

impl ApproveTlv2BatchHandler {
    pub fn new(uow: Arc<dyn UnitOfWork>) -> Self {
        Self { uow }
    }

    pub async fn handle(&self, cmd: ApproveTlv2BatchCommand) -> Result<ApproveTlv2BatchResult, OrderError> {
        if !cmd.valid_from.is_before(&cmd.valid_to) {
            return Err(OrderError::invalid_order_request("valid_from must precede valid_to"));
        }
        let Some(first_blinded_cred) = cmd.blinded_creds.first().cloned() else {
            return Err(OrderError::invalid_order_request("no blinded credentials"));
        };
        let order_id = cmd.order_id;
        let request_id = cmd.request_id.clone();
        let now = Timestamp::now();

        let result = in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move {
                // 1. Lock the order; it must be paid
                let mut order = locate_order(repos, &OrderLocator::Id(cmd.order_id)).await?;
                order.items = repos.items().find_by_order_id(cmd.order_id).await?;
                if !order.is_paid(now) {
                    return Err(OrderError::OrderNotPaid);
                }

                // 2. Pick the item and check the request size
                let item = resolve_item(&order, cmd.item_id)?.clone();
                if item.credential_type != CredentialType::TimeLimitedV2 {
                    return Err(OrderError::UnsupportedCredType);
                }
                check_num_blinded_creds(&order, &item, cmd.blinded_creds.len())?;

                // 3. Duplicate and window checks
                let report = repos
                    .tlv2()
                    .get_cred_submission_report(order.id, item.id, &cmd.request_id, &first_blinded_cred)
                    .await?;
                let batches_in_window = repos
                    .tlv2()
                    .uniq_batches(order.id, item.id, cmd.valid_from, cmd.valid_to)
                    .await?;
                check_tlv2_batch(&item, report, batches_in_window)?;

                // 4. Log the submission
                let submission = Tlv2Submission {
                    order_id: order.id,
                    item_id: item.id,
                    request_id: cmd.request_id,
                    valid_from: cmd.valid_from,
                    valid_to: cmd.valid_to,
                    first_blinded_cred,
                    blinded_creds: cmd.blinded_creds,
                };
                repos.tlv2().insert_submission(&submission).await.map_err(|e| {
                    if e.code == ErrorCode::Conflict {
                        OrderError::CredsAlreadySubmitted
                    } else {
                        OrderError::from(e)
                    }
                })?;

                Ok(ApproveTlv2BatchResult {
                    item_id: item.id,
                    batches_in_window,
                })
            })
        })
        .await;

        match &result {
            Ok(approved) => tracing::info!(
                order_id = %order_id,
                item_id = %approved.item_id,
                request_id = %request_id,
                batches_in_window = approved.batches_in_window,
                limit = MAX_TLV2_BATCHES,
                "tlv2 batch approved"
            ),
            Err(err) if err.is_already_satisfied() => {
                tracing::debug!(order_id = %order_id, request_id = %request_id, "tlv2 batch already submitted")
            }
            Err(err) => tracing::warn!(order_id = %order_id, request_id = %request_id, error = %err, "tlv2 batch rejected"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::order::{test_support, MetadataValue, Order, OrderStatus};

    fn paid_tlv2_order() -> (Order, OrderItemId) {
        let mut order = test_support::order(OrderStatus::Paid);
        order.metadata.set("numPerInterval", MetadataValue::Int(2));
        order.metadata.set("numIntervals", MetadataValue::Int(3));
        let item = test_support::item(order.id, CredentialType::TimeLimitedV2, 1);
        let item_id = item.id;
        order.items = vec![item];
        (order, item_id)
    }

    fn command(order_id: OrderId, request_id: &str, first: &str, day: i64) -> ApproveTlv2BatchCommand {
        let start = Timestamp::from_unix_secs(1_900_000_000).unwrap().plus_days(day);
        ApproveTlv2BatchCommand {
            order_id,
            item_id: None,
            request_id: request_id.to_string(),
            blinded_creds: vec![first.to_string(), format!("{}-2", first)],
            valid_from: start,
            valid_to: start.plus_days(1),
        }
    }

    async fn setup(order: Order) -> (InMemoryStore, ApproveTlv2BatchHandler) {
        let store = InMemoryStore::new();
        store.seed(order).await;
        let handler = ApproveTlv2BatchHandler::new(Arc::new(store.clone()));
        (store, handler)
    }

    // ════════════════════════════════════════════════════════════════
    // Approval
    // ════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn first_batch_is_approved_and_logged() {
        let (order, item_id) = paid_tlv2_order();
        let id = order.id;
        let (store, handler) = setup(order).await;

        let result = handler.handle(command(id, "req-1", "cred-a", 0)).await.unwrap();

        assert_eq!(result.item_id, item_id);
        assert_eq!(result.batches_in_window, 0);
        let log = store.submissions().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].first_blinded_cred, "cred-a");
    }

    #[tokio::test]
    async fn same_request_again_is_already_submitted() {
        let (order, _) = paid_tlv2_order();
        let id = order.id;
        let (store, handler) = setup(order).await;

        handler.handle(command(id, "req-1", "cred-a", 0)).await.unwrap();
        let err = handler.handle(command(id, "req-1", "cred-a", 0)).await.unwrap_err();

        assert_eq!(err, OrderError::CredsAlreadySubmitted);
        assert!(err.is_already_satisfied());
        assert_eq!(store.submissions().await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_identical_batches_pass_the_guard_once() {
        let (order, _) = paid_tlv2_order();
        let id = order.id;
        let (store, handler) = setup(order).await;
        let other = ApproveTlv2BatchHandler::new(Arc::new(store.clone()));

        let (a, b) = tokio::join!(
            handler.handle(command(id, "req-1", "cred-a", 0)),
            other.handle(command(id, "req-1", "cred-a", 0)),
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| r.as_ref().err() == Some(&OrderError::CredsAlreadySubmitted)));
        assert_eq!(store.submissions().await.len(), 1);
    }

    #[tokio::test]
    async fn different_request_same_creds_is_mismatch() {
        let (order, _) = paid_tlv2_order();
        let id = order.id;
        let (_, handler) = setup(order).await;

        handler.handle(command(id, "req-1", "cred-a", 0)).await.unwrap();
        let err = handler.handle(command(id, "req-2", "cred-a", 0)).await.unwrap_err();

        assert_eq!(err, OrderError::CredsAlreadySubmittedMismatch);
    }

    #[tokio::test]
    async fn window_full_after_ten_batches() {
        let (order, _) = paid_tlv2_order();
        let id = order.id;
        let (_, handler) = setup(order).await;

        for n in 0..MAX_TLV2_BATCHES {
            handler
                .handle(command(id, &format!("req-{}", n), &format!("cred-{}", n), 0))
                .await
                .unwrap();
        }
        let err = handler.handle(command(id, "req-x", "cred-x", 0)).await.unwrap_err();
        assert_eq!(err, OrderError::CredsAlreadyExist);

        // The next day's window is empty.
        handler.handle(command(id, "req-y", "cred-y", 1)).await.unwrap();
    }

    // ════════════════════════════════════════════════════════════════
    // Preconditions
    // ════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unpaid_order_is_rejected() {
        let (mut order, _) = paid_tlv2_order();
        order.status = OrderStatus::Pending;
        let id = order.id;
        let (_, handler) = setup(order).await;

        let err = handler.handle(command(id, "req-1", "cred-a", 0)).await.unwrap_err();
        assert_eq!(err, OrderError::OrderNotPaid);
    }

    #[tokio::test]
    async fn single_use_item_is_unsupported() {
        let mut order = test_support::order(OrderStatus::Paid);
        order.items = vec![test_support::item(order.id, CredentialType::SingleUse, 5)];
        let id = order.id;
        let (_, handler) = setup(order).await;

        let err = handler.handle(command(id, "req-1", "cred-a", 0)).await.unwrap_err();
        assert_eq!(err, OrderError::UnsupportedCredType);
    }

    #[tokio::test]
    async fn oversized_request_is_rejected() {
        let (order, _) = paid_tlv2_order();
        let id = order.id;
        let (_, handler) = setup(order).await;

        let mut cmd = command(id, "req-1", "cred-a", 0);
        cmd.blinded_creds = (0..7).map(|n| format!("cred-{}", n)).collect();

        let err = handler.handle(cmd).await.unwrap_err();
        assert_eq!(err, OrderError::InvalidNCredsTlv2);
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let (order, _) = paid_tlv2_order();
        let id = order.id;
        let (_, handler) = setup(order).await;

        let mut cmd = command(id, "req-1", "cred-a", 0);
        cmd.item_id = Some(OrderItemId::new());

        let err = handler.handle(cmd).await.unwrap_err();
        assert_eq!(err, OrderError::OrderItemNotFound);
    }
}
