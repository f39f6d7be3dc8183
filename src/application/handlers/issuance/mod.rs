//! Issuance handlers - The credential issuance guard at the signing boundary.
//!
//! ## Commands
//! - Approving a time-limited-v2 batch and logging its submission
//!
//! ## Queries
//! - Distinct batches an item holds in a window
//! - Quota check for a signing request

mod approve_tlv2_batch;
mod check_blinded_creds;
mod uniq_batches;

use crate::domain::foundation::OrderItemId;
use crate::domain::order::{Order, OrderError, OrderItem};

// Commands
pub use approve_tlv2_batch::{ApproveTlv2BatchCommand, ApproveTlv2BatchHandler, ApproveTlv2BatchResult};

// Queries
pub use check_blinded_creds::{CheckBlindedCredsHandler, CheckBlindedCredsQuery};
pub use uniq_batches::{UniqBatchesHandler, UniqBatchesQuery, UniqBatchesResult};

/// The requested item, or the order's first item for legacy callers that
/// send none.
fn resolve_item(order: &Order, item_id: Option<OrderItemId>) -> Result<&OrderItem, OrderError> {
    match item_id {
        Some(id) => order.has_item(id).ok_or(OrderError::OrderItemNotFound),
        None => order.items.first().ok_or(OrderError::InvalidOrderNoItems),
    }
}
