//! CheckBlindedCredsHandler - Quota check for a signing request of any credential type.

use std::sync::Arc;

use super::resolve_item;
use crate::application::handlers::order::lifecycle::load_order;
use crate::domain::foundation::{OrderId, OrderItemId, Timestamp};
use crate::domain::issuance::check_num_blinded_creds;
use crate::domain::order::OrderError;
use crate::ports::{in_transaction, UnitOfWork};

#[derive(Debug, Clone)]
pub struct CheckBlindedCredsQuery {
    pub order_id: OrderId,
    pub item_id: Option<OrderItemId>,
    pub num_creds: usize,
}

pub struct CheckBlindedCredsHandler {
    uow: Arc<dyn UnitOfWork>,
}

impl CheckBlindedCredsHandler {
    pub fn new(uow: Arc<dyn UnitOfWork>) -> Self {
        Self { uow }
    }

    /// `Ok(())` when the request fits the item's quota.
    pub async fn handle(&self, query: CheckBlindedCredsQuery) -> Result<(), OrderError> {
        let now = Timestamp::now();
        in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move {
                let order = load_order(repos, query.order_id).await?;
                if !order.is_paid(now) {
                    return Err(OrderError::OrderNotPaid);
                }
                let item = resolve_item(&order, query.item_id)?;
                check_num_blinded_creds(&order, item, query.num_creds)
            })
        })
        .await
    }
}
