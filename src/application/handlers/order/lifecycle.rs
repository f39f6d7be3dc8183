//! Order state-machine operations that run inside a transaction.
//!
//! Every handler that mutates an order goes through these functions so the
//! renew and cancel rules live in one place.

use crate::domain::foundation::{OrderId, StateMachine, Timestamp};
use crate::domain::order::{keys, subscription_id_key, MetadataValue, Order, OrderError, OrderStatus};
use crate::domain::reconciliation::OrderLocator;
use crate::domain::vendor::Vendor;
use crate::ports::RepositorySet;

/// Row-locks the order `locator` points at.
pub async fn locate_order(repos: &mut dyn RepositorySet, locator: &OrderLocator) -> Result<Order, OrderError> {
    let found = match locator {
        OrderLocator::Id(id) => repos.orders().get_for_update(*id).await?,
        OrderLocator::ExternalId(ext) => repos.orders().get_by_external_id(ext).await?,
        OrderLocator::RadomSubscription(sub) => repos.orders().get_by_radom_subscription_id(sub).await?,
    };
    found.ok_or(OrderError::OrderNotFound)
}

/// Loads an order together with its items.
pub async fn load_order(repos: &mut dyn RepositorySet, id: OrderId) -> Result<Order, OrderError> {
    let mut order = repos.orders().get(id).await?.ok_or(OrderError::OrderNotFound)?;
    order.items = repos.items().find_by_order_id(id).await?;
    Ok(order)
}

/// Marks the order paid through `expires_at` and logs the payment.
///
/// All four writes share the caller's transaction.
pub async fn renew_with_expiry_and_paid_time(
    repos: &mut dyn RepositorySet,
    id: OrderId,
    expires_at: Timestamp,
    paid_at: Timestamp,
) -> Result<(), OrderError> {
    repos.orders().set_status(id, OrderStatus::Paid).await?;
    repos.orders().set_expires_at(id, expires_at).await?;
    repos.orders().set_last_paid_at(id, paid_at).await?;
    repos.pay_history().insert(id, paid_at).await?;
    Ok(())
}

/// Whether a renewal may touch `order` at all.
pub fn accepts_renewal(order: &Order) -> bool {
    order.status.can_transition_to(&OrderStatus::Paid)
}

/// Cancels the order. Returns false, without writing, if it already was.
pub async fn cancel(repos: &mut dyn RepositorySet, order: &Order) -> Result<bool, OrderError> {
    if order.status == OrderStatus::Canceled {
        return Ok(false);
    }
    repos.orders().set_status(order.id, OrderStatus::Canceled).await?;
    Ok(true)
}

pub async fn reset_payment_failures(repos: &mut dyn RepositorySet, id: OrderId) -> Result<(), OrderError> {
    repos
        .orders()
        .append_metadata(id, keys::NUM_PAYMENT_FAILED, MetadataValue::Int(0))
        .await?;
    Ok(())
}

/// Records `vendor`'s subscription id and processor tag on the order.
///
/// Skipped when another vendor owns the order's billing, and when the
/// stored id already matches.
pub async fn claim_subscription(
    repos: &mut dyn RepositorySet,
    order: &Order,
    vendor: Vendor,
    subscription_id: Option<&str>,
) -> Result<(), OrderError> {
    let Some(sub_id) = subscription_id.filter(|s| !s.is_empty()) else {
        return Ok(());
    };

    if !order.metadata.can_claim_processor(vendor) {
        tracing::warn!(
            order_id = %order.id,
            vendor = %vendor,
            owner = ?order.metadata.billing_vendor(),
            "subscription belongs to another vendor, leaving tags untouched"
        );
        return Ok(());
    }

    if !order.metadata.should_update_subscription_id(vendor, sub_id) {
        return Ok(());
    }

    if let Some(key) = subscription_id_key(vendor) {
        repos.orders().append_metadata(order.id, key, MetadataValue::from(sub_id)).await?;
    }
    repos
        .orders()
        .append_metadata(order.id, keys::PAYMENT_PROCESSOR, MetadataValue::from(vendor.as_str()))
        .await?;
    Ok(())
}
