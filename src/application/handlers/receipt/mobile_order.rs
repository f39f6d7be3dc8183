//! Shared steps of the receipt handlers.

use std::future::Future;

use crate::application::handlers::order::lifecycle::renew_with_expiry_and_paid_time;
use crate::domain::catalog::MobileCatalog;
use crate::domain::foundation::{DomainError, ErrorCode, OrderId, Timestamp};
use crate::domain::order::{
    keys, new_order_items, num_intervals_for, num_per_interval_for, MetadataValue, NewOrder, OrderError,
    OrderItem, OrderStatus, DEFAULT_MERCHANT_ID,
};
use crate::domain::vendor::Vendor;
use crate::ports::{ReceiptRequest, ReceiptVerifier, RepositorySet, VerifiedReceipt};

/// Validates `request` with its store. Only mobile vendors issue receipts.
pub(crate) async fn verify_receipt(
    verifier: &dyn ReceiptVerifier,
    request: &ReceiptRequest,
) -> Result<VerifiedReceipt, OrderError> {
    if !request.vendor.is_mobile() {
        return Err(OrderError::InvalidVendor(request.vendor.to_string()));
    }

    verifier.verify(request).await.map_err(|e| {
        tracing::warn!(vendor = %request.vendor, error = %e, "receipt verification failed");
        OrderError::from(e)
    })
}

/// A paid order for a verified receipt, ready to insert.
#[derive(Clone)]
pub(crate) struct MobileOrder {
    pub new_order: NewOrder,
    pub items: Vec<OrderItem>,
    pub expires_at: Timestamp,
}

impl MobileOrder {
    pub(crate) fn build(
        catalog: &MobileCatalog,
        vendor: Vendor,
        receipt: &VerifiedReceipt,
        now: Timestamp,
    ) -> Result<Self, OrderError> {
        let req = catalog.order_request_for_product(&receipt.product_id)?;
        let items = new_order_items(&req, now)?;
        let mut new_order = NewOrder::for_items(
            DEFAULT_MERCHANT_ID,
            &req.currency,
            &req.payment_methods,
            &items,
            OrderStatus::Paid,
        )?;

        let md = &mut new_order.metadata;
        md.set(keys::EXTERNAL_ID, MetadataValue::from(receipt.external_id.as_str()));
        md.set(keys::PAYMENT_PROCESSOR, MetadataValue::from(vendor.as_str()));
        md.set(keys::VENDOR, MetadataValue::from(vendor.as_str()));
        let num_intervals = num_intervals_for(&items);
        if num_intervals > 0 {
            md.set(keys::NUM_INTERVALS, MetadataValue::Int(num_intervals));
        }
        md.set(keys::NUM_PER_INTERVAL, MetadataValue::Int(num_per_interval_for(&items)));

        Ok(Self {
            new_order,
            items,
            expires_at: receipt.expires_at,
        })
    }

    /// Inserts the order and records its first payment.
    ///
    /// Fails `ExternalIdTaken` when another transaction already inserted an
    /// order for the same external id.
    pub(crate) async fn insert(self, repos: &mut dyn RepositorySet, now: Timestamp) -> Result<OrderId, ReceiptTxError> {
        let order = repos
            .orders()
            .create(&self.new_order, &self.items)
            .await
            .map_err(|e| {
                if e.code == ErrorCode::Conflict {
                    ReceiptTxError::ExternalIdTaken
                } else {
                    ReceiptTxError::Order(e.into())
                }
            })?;
        renew_with_expiry_and_paid_time(repos, order.id, self.expires_at, now).await?;
        Ok(order.id)
    }
}

/// Failure of a receipt transaction.
#[derive(Debug)]
pub(crate) enum ReceiptTxError {
    /// Lost the insert race on the external id.
    ExternalIdTaken,
    Order(OrderError),
}

impl From<OrderError> for ReceiptTxError {
    fn from(err: OrderError) -> Self {
        ReceiptTxError::Order(err)
    }
}

impl From<DomainError> for ReceiptTxError {
    fn from(err: DomainError) -> Self {
        ReceiptTxError::Order(err.into())
    }
}

impl From<ReceiptTxError> for OrderError {
    fn from(err: ReceiptTxError) -> Self {
        match err {
            ReceiptTxError::ExternalIdTaken => OrderError::repository("order for external id inserted concurrently"),
            ReceiptTxError::Order(err) => err,
        }
    }
}

/// Runs `attempt` and, if it lost the insert race, runs it once more so it
/// sees the order that won.
pub(crate) async fn retry_on_external_id_race<T, F, Fut>(mut attempt: F) -> Result<T, OrderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ReceiptTxError>>,
{
    match attempt().await {
        Err(ReceiptTxError::ExternalIdTaken) => {
            tracing::info!("order for receipt inserted concurrently, retrying");
            Ok(attempt().await?)
        }
        other => Ok(other?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::receipt::MockReceiptVerifier;
    use crate::domain::catalog::Environment;

    fn receipt(product_id: &str) -> VerifiedReceipt {
        VerifiedReceipt {
            product_id: product_id.to_string(),
            external_id: "tok-1".to_string(),
            expires_at: Timestamp::now().plus_days(30),
        }
    }

    #[test]
    fn mobile_order_is_paid_usd_with_vendor_tags() {
        let catalog = MobileCatalog::new(Environment::Development);
        let built = MobileOrder::build(&catalog, Vendor::PlayStore, &receipt("brave.vpn.monthly"), Timestamp::now())
            .unwrap();

        assert_eq!(built.new_order.status, OrderStatus::Paid);
        assert_eq!(built.new_order.currency, "USD");
        let md = &built.new_order.metadata;
        assert_eq!(md.external_id.as_deref(), Some("tok-1"));
        assert_eq!(md.payment_processor, Some(Vendor::PlayStore));
        assert_eq!(md.vendor, Some(Vendor::PlayStore));
        assert_eq!(md.num_per_interval, Some(2));
    }

    #[test]
    fn unknown_product_is_rejected() {
        let catalog = MobileCatalog::new(Environment::Development);
        let err = MobileOrder::build(&catalog, Vendor::AppStore, &receipt("brave.unknown"), Timestamp::now())
            .err()
            .unwrap();
        assert!(matches!(err, OrderError::InvalidMobileProduct { .. }));
    }

    #[tokio::test]
    async fn stripe_receipts_never_reach_the_verifier() {
        let verifier = MockReceiptVerifier::new();
        let request = ReceiptRequest {
            vendor: Vendor::Stripe,
            package: String::new(),
            subscription_id: String::new(),
            raw_receipt: "r".to_string(),
        };

        let err = verify_receipt(&verifier, &request).await.unwrap_err();

        assert_eq!(err, OrderError::InvalidVendor("stripe".to_string()));
        assert_eq!(verifier.calls(), 0);
    }
}
