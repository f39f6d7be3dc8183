//! UniqBatchesHandler - How many time-limited-v2 batches an item holds now.

use std::sync::Arc;

use super::resolve_item;
use crate::application::handlers::order::lifecycle::load_order;
use crate::domain::foundation::{OrderId, OrderItemId, Timestamp};
use crate::domain::issuance::MAX_TLV2_BATCHES;
use crate::domain::order::{CredentialType, OrderError};
use crate::ports::{in_transaction, UnitOfWork};

#[derive(Debug, Clone)]
pub struct UniqBatchesQuery {
    pub order_id: OrderId,
    pub item_id: Option<OrderItemId>,
    pub from: Timestamp,
    pub to: Timestamp,
}

impl UniqBatchesQuery {
    /// Batches valid at this instant.
    pub fn now(order_id: OrderId, item_id: Option<OrderItemId>) -> Self {
        let now = Timestamp::now();
        Self {
            order_id,
            item_id,
            from: now,
            to: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqBatchesResult {
    pub limit: i64,
    pub count: i64,
}

pub struct UniqBatchesHandler {
    uow: Arc<dyn UnitOfWork>,
}

impl UniqBatchesHandler {
    pub fn new(uow: Arc<dyn UnitOfWork>) -> Self {
        Self { uow }
    }

    pub async fn handle(&self, query: UniqBatchesQuery) -> Result<UniqBatchesResult, OrderError> {
        let now = Timestamp::now();
        in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move {
                let order = load_order(repos, query.order_id).await?;
                if !order.is_paid(now) {
                    return Err(OrderError::OrderNotPaid);
                }

                let item = resolve_item(&order, query.item_id)?;
                if item.credential_type != CredentialType::TimeLimitedV2 {
                    return Err(OrderError::UnsupportedCredType);
                }

                let count = repos
                    .tlv2()
                    .uniq_batches(order.id, item.id, query.from, query.to)
                    .await?;
                Ok(UniqBatchesResult {
                    limit: MAX_TLV2_BATCHES,
                    count,
                })
            })
        })
        .await
    }
}
