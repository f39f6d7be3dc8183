//! SubmitReceiptHandler - Creates or renews an order from a mobile receipt.

use std::sync::Arc;

use super::mobile_order::{retry_on_external_id_race, verify_receipt, MobileOrder, ReceiptTxError};
use crate::application::handlers::reconciliation::apply_intent;
use crate::domain::catalog::{Environment, MobileCatalog};
use crate::domain::foundation::{OrderId, Timestamp};
use crate::domain::order::OrderError;
use crate::domain::reconciliation::{Applied, OrderLocator, ReconciliationIntent, Renewal};
use crate::ports::{in_transaction, ReceiptRequest, ReceiptVerifier, UnitOfWork};

#[derive(Debug, Clone)]
pub struct SubmitReceiptCommand {
    pub request: ReceiptRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptOutcome {
    Created,
    /// The receipt's external id was already recorded on an order.
    Renewed(Applied),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceiptResult {
    pub order_id: OrderId,
    pub external_id: String,
    pub outcome: ReceiptOutcome,
}

pub struct SubmitReceiptHandler {
    uow: Arc<dyn UnitOfWork>,
    verifier: Arc<dyn ReceiptVerifier>,
    catalog: MobileCatalog,
}

impl SubmitReceiptHandler {
    pub fn new(uow: Arc<dyn UnitOfWork>, verifier: Arc<dyn ReceiptVerifier>, env: Environment) -> Self {
        Self {
            uow,
            verifier,
            catalog: MobileCatalog::new(env),
        }
    }

    pub async fn handle(&self, cmd: SubmitReceiptCommand) -> Result<SubmitReceiptResult, OrderError> {
        let vendor = cmd.request.vendor;
        let now = Timestamp::now();

        // 1. Verify with the store
        let receipt = verify_receipt(self.verifier.as_ref(), &cmd.request).await?;

        // 2. Map the product before touching storage
        let mobile_order = MobileOrder::build(&self.catalog, vendor, &receipt, now)?;

        // 3. Renew the order owning the external id, or create one
        let external_id = receipt.external_id.clone();
        let uow = self.uow.as_ref();
        let (order_id, outcome) = retry_on_external_id_race(move || {
            let receipt = receipt.clone();
            let mobile_order = mobile_order.clone();
            in_transaction(uow, move |repos| {
                Box::pin(async move {
                    if let Some(existing) = repos.orders().get_by_external_id(&receipt.external_id).await? {
                        let intent = ReconciliationIntent::Renew(Renewal {
                            order: OrderLocator::ExternalId(receipt.external_id),
                            subscription_id: None,
                            period_start: None,
                            expires_at: receipt.expires_at,
                            paid_at: now,
                        });
                        let applied = apply_intent(repos, vendor, &intent).await?;
                        return Ok::<_, ReceiptTxError>((existing.id, ReceiptOutcome::Renewed(applied)));
                    }

                    let id = mobile_order.insert(repos, now).await?;
                    Ok((id, ReceiptOutcome::Created))
                })
            })
        })
        .await?;

        tracing::info!(
            order_id = %order_id,
            vendor = %vendor,
            outcome = ?outcome,
            "receipt submitted"
        );

        Ok(SubmitReceiptResult {
            order_id,
            external_id,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::adapters::receipt::MockReceiptVerifier;
    use crate::domain::order::OrderStatus;
    use crate::domain::vendor::{Vendor, VendorError};
    use crate::ports::VerifiedReceipt;

    fn request(vendor: Vendor, raw: &str) -> SubmitReceiptCommand {
        SubmitReceiptCommand {
            request: ReceiptRequest {
                vendor,
                package: "com.brave.browser".to_string(),
                subscription_id: "brave.vpn.monthly".to_string(),
                raw_receipt: raw.to_string(),
            },
        }
    }

    fn setup() -> (InMemoryStore, MockReceiptVerifier, SubmitReceiptHandler) {
        let store = InMemoryStore::new();
        let verifier = MockReceiptVerifier::new();
        let handler = SubmitReceiptHandler::new(
            Arc::new(store.clone()),
            Arc::new(verifier.clone()),
            Environment::Development,
        );
        (store, verifier, handler)
    }

    fn accept(verifier: &MockReceiptVerifier, raw: &str, external_id: &str, expires_at: Timestamp) {
        verifier.accept(
            raw,
            VerifiedReceipt {
                product_id: "brave.vpn.monthly".to_string(),
                external_id: external_id.to_string(),
                expires_at,
            },
        );
    }

    #[tokio::test]
    async fn first_receipt_creates_paid_order() {
        let (store, verifier, handler) = setup();
        let expires = Timestamp::now().plus_days(30);
        accept(&verifier, "token-1", "token-1", expires);

        let result = handler.handle(request(Vendor::PlayStore, "token-1")).await.unwrap();

        assert_eq!(result.outcome, ReceiptOutcome::Created);
        let order = store.order(result.order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.expires_at, Some(expires));
        assert_eq!(order.metadata.external_id.as_deref(), Some("token-1"));
        assert_eq!(order.metadata.vendor, Some(Vendor::PlayStore));
        assert_eq!(order.items.len(), 1);
        assert_eq!(store.pay_history(result.order_id).await.len(), 1);
    }

    #[tokio::test]
    async fn known_receipt_renews_same_order() {
        let (store, verifier, handler) = setup();
        accept(&verifier, "r-1", "otx-1", Timestamp::now().plus_days(30));
        let first = handler.handle(request(Vendor::AppStore, "r-1")).await.unwrap();

        let later = Timestamp::now().plus_days(60);
        accept(&verifier, "r-2", "otx-1", later);
        let second = handler.handle(request(Vendor::AppStore, "r-2")).await.unwrap();

        assert_eq!(second.order_id, first.order_id);
        assert_eq!(second.outcome, ReceiptOutcome::Renewed(Applied::Renewed));
        let order = store.order(first.order_id).await.unwrap();
        assert_eq!(order.expires_at, Some(later));
        assert_eq!(store.pay_history(first.order_id).await.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_first_submission_renews_the_winner() {
        let (store, verifier, handler) = setup();
        accept(&verifier, "r-1", "otx-1", Timestamp::now().plus_days(30));
        let first = handler.handle(request(Vendor::AppStore, "r-1")).await.unwrap();

        // The second submission's lookup misses the first order, so its
        // insert collides on the external id and the retry renews instead.
        let later = Timestamp::now().plus_days(60);
        accept(&verifier, "r-2", "otx-1", later);
        store.miss_next_external_id_lookup();
        let second = handler.handle(request(Vendor::AppStore, "r-2")).await.unwrap();

        assert_eq!(second.order_id, first.order_id);
        assert_eq!(second.outcome, ReceiptOutcome::Renewed(Applied::Renewed));
        assert_eq!(store.order(first.order_id).await.unwrap().expires_at, Some(later));
        assert_eq!(store.pay_history(first.order_id).await.len(), 2);
    }

    #[tokio::test]
    async fn rejected_receipt_writes_nothing() {
        let (store, verifier, handler) = setup();
        verifier.reject("bad", VendorError::from_status(Vendor::AppStore, 400, "status 21003"));

        let err = handler.handle(request(Vendor::AppStore, "bad")).await.unwrap_err();

        assert!(matches!(err, OrderError::Vendor(_)));
        let mut tx = crate::ports::UnitOfWork::begin(&store).await.unwrap();
        assert!(tx.repositories().orders().get_by_external_id("bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unmapped_product_is_invalid() {
        let (_, verifier, handler) = setup();
        verifier.accept(
            "r-1",
            VerifiedReceipt {
                product_id: "com.example.other".to_string(),
                external_id: "otx-9".to_string(),
                expires_at: Timestamp::now().plus_days(30),
            },
        );

        let err = handler.handle(request(Vendor::AppStore, "r-1")).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidMobileProduct { .. }));
    }
}
