//! CreateOrderFromReceiptHandler - Strict creation from a mobile receipt.
//!
//! Unlike `SubmitReceipt` this never renews: a receipt whose external id is
//! already recorded fails with the owning order's id.

use std::sync::Arc;

use super::mobile_order::{retry_on_external_id_race, verify_receipt, MobileOrder, ReceiptTxError};
use crate::domain::catalog::{Environment, MobileCatalog};
use crate::domain::foundation::{OrderId, Timestamp};
use crate::domain::order::OrderError;
use crate::ports::{in_transaction, ReceiptRequest, ReceiptVerifier, UnitOfWork};

#[derive(Debug, Clone)]
pub struct CreateOrderFromReceiptCommand {
    pub request: ReceiptRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrderFromReceiptResult {
    pub order_id: OrderId,
}

pub struct CreateOrderFromReceiptHandler {
    uow: Arc<dyn UnitOfWork>,
    verifier: Arc<dyn ReceiptVerifier>,
    catalog: MobileCatalog,
}

impl CreateOrderFromReceiptHandler {
    pub fn new(uow: Arc<dyn UnitOfWork>, verifier: Arc<dyn ReceiptVerifier>, env: Environment) -> Self {
        Self {
            uow,
            verifier,
            catalog: MobileCatalog::new(env),
        }
    }

    pub async fn handle(&self, cmd: CreateOrderFromReceiptCommand) -> Result<CreateOrderFromReceiptResult, OrderError> {
        let vendor = cmd.request.vendor;
        let now = Timestamp::now();

        let receipt = verify_receipt(self.verifier.as_ref(), &cmd.request).await?;
        let mobile_order = MobileOrder::build(&self.catalog, vendor, &receipt, now)?;

        let uow = self.uow.as_ref();
        let order_id = retry_on_external_id_race(move || {
            let external_id = receipt.external_id.clone();
            let mobile_order = mobile_order.clone();
            in_transaction(uow, move |repos| {
                Box::pin(async move {
                    if let Some(existing) = repos.orders().get_by_external_id(&external_id).await? {
                        return Err(ReceiptTxError::from(OrderError::OrderExistsForReceipt(existing.id)));
                    }
                    mobile_order.insert(repos, now).await
                })
            })
        })
        .await?;

        tracing::info!(order_id = %order_id, vendor = %vendor, "order created from receipt");
        Ok(CreateOrderFromReceiptResult { order_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::adapters::receipt::MockReceiptVerifier;
    use crate::domain::vendor::Vendor;
    use crate::ports::VerifiedReceipt;

    fn command(vendor: Vendor) -> CreateOrderFromReceiptCommand {
        CreateOrderFromReceiptCommand {
            request: ReceiptRequest {
                vendor,
                package: String::new(),
                subscription_id: "braveleo.monthly".to_string(),
                raw_receipt: "r-1".to_string(),
            },
        }
    }

    fn handler() -> (InMemoryStore, CreateOrderFromReceiptHandler) {
        let store = InMemoryStore::new();
        let verifier = MockReceiptVerifier::new();
        verifier.accept(
            "r-1",
            VerifiedReceipt {
                product_id: "braveleo.monthly".to_string(),
                external_id: "otx-1".to_string(),
                expires_at: Timestamp::now().plus_days(30),
            },
        );
        let handler =
            CreateOrderFromReceiptHandler::new(Arc::new(store.clone()), Arc::new(verifier), Environment::Development);
        (store, handler)
    }

    #[tokio::test]
    async fn creates_leo_order_with_leo_quota() {
        let (store, handler) = handler();

        let result = handler.handle(command(Vendor::AppStore)).await.unwrap();

        let order = store.order(result.order_id).await.unwrap();
        assert_eq!(order.metadata.num_per_interval, Some(192));
        assert_eq!(order.metadata.payment_processor, Some(Vendor::AppStore));
    }

    #[tokio::test]
    async fn second_create_reports_existing_order() {
        let (_, handler) = handler();
        let first = handler.handle(command(Vendor::AppStore)).await.unwrap();

        let err = handler.handle(command(Vendor::AppStore)).await.unwrap_err();

        assert_eq!(err, OrderError::OrderExistsForReceipt(first.order_id));
        assert_eq!(err.http_status(), 409);
    }

    #[tokio::test]
    async fn lost_insert_race_reports_existing_order() {
        let (store, handler) = handler();
        let first = handler.handle(command(Vendor::AppStore)).await.unwrap();
        store.miss_next_external_id_lookup();

        let err = handler.handle(command(Vendor::AppStore)).await.unwrap_err();

        assert_eq!(err, OrderError::OrderExistsForReceipt(first.order_id));
    }

    #[tokio::test]
    async fn radom_is_not_a_receipt_vendor() {
        let (_, handler) = handler();
        let err = handler.handle(command(Vendor::Radom)).await.unwrap_err();
        assert_eq!(err, OrderError::InvalidVendor("radom".to_string()));
    }
}
