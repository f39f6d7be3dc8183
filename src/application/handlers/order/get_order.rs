//! GetOrderHandler - Query handler for an order and its items.

use std::sync::Arc;

use super::lifecycle::load_order;
use crate::domain::foundation::OrderId;
use crate::domain::order::{Order, OrderError};
use crate::ports::{in_transaction, UnitOfWork};

#[derive(Debug, Clone)]
pub struct GetOrderQuery {
    pub order_id: OrderId,
}

pub struct GetOrderHandler {
    uow: Arc<dyn UnitOfWork>,
}

impl GetOrderHandler {
    pub fn new(uow: Arc<dyn UnitOfWork>) -> Self {
        Self { uow }
    }

    pub async fn handle(&self, query: GetOrderQuery) -> Result<Order, OrderError> {
        let order_id = query.order_id;
        in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move { load_order(repos, order_id).await })
        })
        .await
    }
}
