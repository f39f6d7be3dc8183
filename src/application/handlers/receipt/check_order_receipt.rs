//! CheckOrderReceiptHandler - Which order a receipt belongs to.

use std::sync::Arc;

use super::mobile_order::verify_receipt;
use crate::domain::foundation::OrderId;
use crate::domain::order::OrderError;
use crate::ports::{in_transaction, ReceiptRequest, ReceiptVerifier, UnitOfWork};

#[derive(Debug, Clone)]
pub struct CheckOrderReceiptQuery {
    /// The order the client believes owns the receipt.
    pub order_id: OrderId,
    pub request: ReceiptRequest,
}

pub struct CheckOrderReceiptHandler {
    uow: Arc<dyn UnitOfWork>,
    verifier: Arc<dyn ReceiptVerifier>,
}

impl CheckOrderReceiptHandler {
    pub fn new(uow: Arc<dyn UnitOfWork>, verifier: Arc<dyn ReceiptVerifier>) -> Self {
        Self { uow, verifier }
    }

    /// Returns the owning order id when it matches the query's.
    pub async fn handle(&self, query: CheckOrderReceiptQuery) -> Result<OrderId, OrderError> {
        let receipt = verify_receipt(self.verifier.as_ref(), &query.request).await?;

        let owner = in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move {
                repos
                    .orders()
                    .get_by_external_id(&receipt.external_id)
                    .await?
                    .map(|order| order.id)
                    .ok_or(OrderError::OrderNotFound)
            })
        })
        .await?;

        if owner != query.order_id {
            tracing::warn!(order_id = %query.order_id, owner = %owner, "receipt belongs to another order");
            return Err(OrderError::NoMatchOrderReceipt);
        }
        Ok(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::adapters::receipt::MockReceiptVerifier;
    use crate::domain::foundation::Timestamp;
    use crate::domain::order::{keys, test_support, MetadataValue, OrderStatus};
    use crate::domain::vendor::Vendor;
    use crate::ports::VerifiedReceipt;

    async fn setup() -> (OrderId, CheckOrderReceiptHandler) {
        let store = InMemoryStore::new();
        let mut order = test_support::order(OrderStatus::Paid);
        order.metadata.set(keys::EXTERNAL_ID, MetadataValue::from("token-1"));
        let id = order.id;
        store.seed(order).await;

        let verifier = MockReceiptVerifier::new();
        for (raw, ext) in [("token-1", "token-1"), ("token-2", "token-2")] {
            verifier.accept(
                raw,
                VerifiedReceipt {
                    product_id: "brave.vpn.monthly".to_string(),
                    external_id: ext.to_string(),
                    expires_at: Timestamp::now().plus_days(30),
                },
            );
        }
        (id, CheckOrderReceiptHandler::new(Arc::new(store), Arc::new(verifier)))
    }

    fn query(order_id: OrderId, raw: &str) -> CheckOrderReceiptQuery {
        CheckOrderReceiptQuery {
            order_id,
            request: ReceiptRequest {
                vendor: Vendor::PlayStore,
                package: "com.brave.browser".to_string(),
                subscription_id: "brave.vpn.monthly".to_string(),
                raw_receipt: raw.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn matching_order_is_returned() {
        let (id, handler) = setup().await;
        assert_eq!(handler.handle(query(id, "token-1")).await, Ok(id));
    }

    #[tokio::test]
    async fn other_order_is_no_match() {
        let (_, handler) = setup().await;
        let err = handler.handle(query(OrderId::new(), "token-1")).await.unwrap_err();
        assert_eq!(err, OrderError::NoMatchOrderReceipt);
    }

    #[tokio::test]
    async fn unrecorded_receipt_is_not_found() {
        let (id, handler) = setup().await;
        let err = handler.handle(query(id, "token-2")).await.unwrap_err();
        assert_eq!(err, OrderError::OrderNotFound);
    }
}
