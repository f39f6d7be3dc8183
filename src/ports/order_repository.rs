//! Order persistence ports.
//!
//! Every method runs inside the transaction that produced the repository
//! (see [`super::UnitOfWork`]), so implementations take `&mut self`.
//!
//! # Errors
//!
//! Writes that match no row fail with `ErrorCode::NoRowsChanged`.
//! Storage failures are `ErrorCode::DatabaseError`.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OrderId, OrderItemId, Timestamp};
use crate::domain::issuance::{CredSubmissionReport, Tlv2Submission};
use crate::domain::order::{MetadataValue, NewOrder, Order, OrderItem, OrderStatus};

/// Orders table.
#[async_trait]
pub trait OrderRepository: Send {
    /// Loads an order without its items.
    async fn get(&mut self, id: OrderId) -> Result<Option<Order>, DomainError>;

    /// Loads and row-locks an order without its items.
    async fn get_for_update(&mut self, id: OrderId) -> Result<Option<Order>, DomainError>;

    /// Row-locks the order whose metadata `externalID` equals `external_id`.
    async fn get_by_external_id(&mut self, external_id: &str) -> Result<Option<Order>, DomainError>;

    /// Row-locks the order whose metadata `radomSubscriptionId` equals `sub_id`.
    async fn get_by_radom_subscription_id(&mut self, sub_id: &str) -> Result<Option<Order>, DomainError>;

    /// `stripeCheckoutSessionId` of a pending order last updated over an hour ago.
    async fn get_expired_checkout_session_id(&mut self, id: OrderId) -> Result<Option<String>, DomainError>;

    /// Inserts the order and its items; returns the stored order with items.
    async fn create(&mut self, order: &NewOrder, items: &[OrderItem]) -> Result<Order, DomainError>;

    async fn set_status(&mut self, id: OrderId, status: OrderStatus) -> Result<(), DomainError>;

    async fn set_expires_at(&mut self, id: OrderId, expires_at: Timestamp) -> Result<(), DomainError>;

    async fn set_last_paid_at(&mut self, id: OrderId, paid_at: Timestamp) -> Result<(), DomainError>;

    async fn set_trial_days(&mut self, id: OrderId, days: i64) -> Result<(), DomainError>;

    /// Last-write-wins update of one metadata key.
    async fn append_metadata(&mut self, id: OrderId, key: &str, value: MetadataValue) -> Result<(), DomainError>;

    /// Adds one to `numPaymentFailed`, treating a missing value as zero.
    async fn increment_num_pay_failed(&mut self, id: OrderId) -> Result<(), DomainError>;
}

/// Order items table.
#[async_trait]
pub trait OrderItemRepository: Send {
    async fn find_by_order_id(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>, DomainError>;
}

/// Append-only log of payments per order.
#[async_trait]
pub trait PayHistoryRepository: Send {
    async fn insert(&mut self, order_id: OrderId, paid_at: Timestamp) -> Result<(), DomainError>;
}

/// Time-limited-v2 submission log.
#[async_trait]
pub trait Tlv2Repository: Send {
    /// Whether `first_blinded_cred` was submitted for the item, and under which request.
    async fn get_cred_submission_report(
        &mut self,
        order_id: OrderId,
        item_id: OrderItemId,
        request_id: &str,
        first_blinded_cred: &str,
    ) -> Result<CredSubmissionReport, DomainError>;

    /// Distinct batches whose validity overlaps `[from, to)`.
    async fn uniq_batches(
        &mut self,
        order_id: OrderId,
        item_id: OrderItemId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<i64, DomainError>;

    async fn insert_submission(&mut self, submission: &Tlv2Submission) -> Result<(), DomainError>;
}
