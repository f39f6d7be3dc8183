//! In-memory implementation of the unit of work and order repositories.
//!
//! Useful for:
//! - Handler and integration tests
//! - Local development without a database
//!
//! A transaction holds the store lock for its whole lifetime, which
//! serializes transactions the way row locks do for a single order. Writes
//! go to a working copy that replaces the shared state on commit, so a
//! failed or dropped transaction leaves no trace.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::foundation::{DomainError, ErrorCode, OrderId, OrderItemId, Timestamp};
use crate::domain::issuance::{CredSubmissionReport, Tlv2Submission};
use crate::domain::order::{keys, MetadataValue, NewOrder, Order, OrderItem, OrderStatus};
use crate::ports::{
    OrderItemRepository, OrderRepository, PayHistoryRepository, RepositorySet, Tlv2Repository,
    TransactionScope, UnitOfWork,
};

/// Everything the store holds.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub orders: HashMap<OrderId, Order>,
    pub items: HashMap<OrderId, Vec<OrderItem>>,
    pub pay_history: Vec<(OrderId, Timestamp)>,
    pub tlv2: Vec<Tlv2Submission>,
}

#[derive(Debug, Default)]
struct Faults {
    pay_history_insert: AtomicBool,
    commit: AtomicBool,
    external_id_lookup: AtomicBool,
}

/// In-memory order store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    faults: Arc<Faults>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an order and its items as-is.
    pub async fn seed(&self, order: Order) {
        let mut state = self.state.lock().await;
        let mut order = order;
        let items = std::mem::take(&mut order.items);
        state.items.insert(order.id, items);
        state.orders.insert(order.id, order);
    }

    /// The stored order with its items.
    pub async fn order(&self, id: OrderId) -> Option<Order> {
        let state = self.state.lock().await;
        state.orders.get(&id).map(|order| with_items(&state, order))
    }

    /// Payment times recorded for an order, oldest first.
    pub async fn pay_history(&self, id: OrderId) -> Vec<Timestamp> {
        let state = self.state.lock().await;
        state
            .pay_history
            .iter()
            .filter(|(order_id, _)| *order_id == id)
            .map(|(_, paid_at)| *paid_at)
            .collect()
    }

    pub async fn submissions(&self) -> Vec<Tlv2Submission> {
        self.state.lock().await.tlv2.clone()
    }

    /// Overrides `updated_at`, e.g. to age a checkout session.
    pub async fn set_updated_at(&self, id: OrderId, updated_at: Timestamp) {
        if let Some(order) = self.state.lock().await.orders.get_mut(&id) {
            order.updated_at = updated_at;
        }
    }

    /// Makes the next payment-history insert fail.
    pub fn fail_next_pay_history_insert(&self) {
        self.faults.pay_history_insert.store(true, Ordering::SeqCst);
    }

    /// Makes the next commit fail.
    pub fn fail_next_commit(&self) {
        self.faults.commit.store(true, Ordering::SeqCst);
    }

    /// Makes the next external id lookup miss, as if the owning order were
    /// inserted by a transaction that has not committed yet.
    pub fn miss_next_external_id_lookup(&self) {
        self.faults.external_id_lookup.store(true, Ordering::SeqCst);
    }
}

fn with_items(state: &StoreState, order: &Order) -> Order {
    let mut order = order.clone();
    order.items = state.items.get(&order.id).cloned().unwrap_or_default();
    order
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, DomainError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            working,
            faults: self.faults.clone(),
        }))
    }
}

/// An open in-memory transaction.
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
    faults: Arc<Faults>,
}

impl InMemoryTransaction {
    fn order_mut(&mut self, operation: &str, id: OrderId) -> Result<&mut Order, DomainError> {
        self.working
            .orders
            .get_mut(&id)
            .ok_or_else(|| DomainError::new(ErrorCode::NoRowsChanged, format!("{}: no order {}", operation, id)))
    }

    fn find_order(&self, pred: impl Fn(&Order) -> bool) -> Option<Order> {
        self.working.orders.values().find(|o| pred(o)).cloned()
    }
}

#[async_trait]
impl OrderRepository for InMemoryTransaction {
    async fn get(&mut self, id: OrderId) -> Result<Option<Order>, DomainError> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn get_for_update(&mut self, id: OrderId) -> Result<Option<Order>, DomainError> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn get_by_external_id(&mut self, external_id: &str) -> Result<Option<Order>, DomainError> {
        if self.faults.external_id_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.find_order(|o| o.metadata.external_id.as_deref() == Some(external_id)))
    }

    async fn get_by_radom_subscription_id(&mut self, sub_id: &str) -> Result<Option<Order>, DomainError> {
        Ok(self.find_order(|o| o.metadata.radom_subscription_id.as_deref() == Some(sub_id)))
    }

    async fn get_expired_checkout_session_id(&mut self, id: OrderId) -> Result<Option<String>, DomainError> {
        let cutoff = Timestamp::now().plus_hours(-1);
        Ok(self
            .working
            .orders
            .get(&id)
            .filter(|o| o.status == OrderStatus::Pending && o.updated_at.is_before(&cutoff))
            .and_then(|o| o.metadata.stripe_checkout_session_id.clone())
            .filter(|s| !s.is_empty()))
    }

    async fn create(&mut self, new: &NewOrder, items: &[OrderItem]) -> Result<Order, DomainError> {
        if self.working.orders.contains_key(&new.id) {
            return Err(DomainError::new(ErrorCode::Conflict, format!("order {} exists", new.id)));
        }
        if let Some(external_id) = new.metadata.external_id.as_deref() {
            if self.find_order(|o| o.metadata.external_id.as_deref() == Some(external_id)).is_some() {
                return Err(DomainError::new(ErrorCode::Conflict, "order already exists for external id"));
            }
        }

        let now = Timestamp::now();
        let order = Order {
            id: new.id,
            created_at: now,
            updated_at: now,
            currency: new.currency.clone(),
            total_price: new.total_price,
            merchant_id: new.merchant_id.clone(),
            location: new.location.clone(),
            status: new.status,
            allowed_payment_methods: new.allowed_payment_methods.clone(),
            metadata: new.metadata.clone(),
            valid_for_secs: new.valid_for_secs,
            last_paid_at: None,
            expires_at: None,
            trial_days: None,
            items: Vec::new(),
        };

        let stored_items: Vec<OrderItem> = items
            .iter()
            .cloned()
            .map(|mut item| {
                item.order_id = new.id;
                item.issuer_config = None;
                item
            })
            .collect();

        self.working.items.insert(new.id, stored_items.clone());
        self.working.orders.insert(new.id, order.clone());

        Ok(Order { items: stored_items, ..order })
    }

    async fn set_status(&mut self, id: OrderId, status: OrderStatus) -> Result<(), DomainError> {
        let order = self.order_mut("set order status", id)?;
        order.status = status;
        order.updated_at = Timestamp::now();
        Ok(())
    }

    async fn set_expires_at(&mut self, id: OrderId, expires_at: Timestamp) -> Result<(), DomainError> {
        let order = self.order_mut("set order expiry", id)?;
        order.expires_at = Some(expires_at);
        order.updated_at = Timestamp::now();
        Ok(())
    }

    async fn set_last_paid_at(&mut self, id: OrderId, paid_at: Timestamp) -> Result<(), DomainError> {
        self.order_mut("set order last paid", id)?.last_paid_at = Some(paid_at);
        Ok(())
    }

    async fn set_trial_days(&mut self, id: OrderId, days: i64) -> Result<(), DomainError> {
        let order = self.order_mut("set order trial days", id)?;
        order.trial_days = Some(days);
        order.updated_at = Timestamp::now();
        Ok(())
    }

    async fn append_metadata(&mut self, id: OrderId, key: &str, value: MetadataValue) -> Result<(), DomainError> {
        let order = self.order_mut("append order metadata", id)?;
        order.metadata.set(key, value);
        order.updated_at = Timestamp::now();
        Ok(())
    }

    async fn increment_num_pay_failed(&mut self, id: OrderId) -> Result<(), DomainError> {
        let order = self.order_mut("increment payment failures", id)?;
        let next = order.metadata.num_payment_failed.unwrap_or(0) + 1;
        order.metadata.set(keys::NUM_PAYMENT_FAILED, MetadataValue::Int(next));
        order.updated_at = Timestamp::now();
        Ok(())
    }
}

#[async_trait]
impl OrderItemRepository for InMemoryTransaction {
    async fn find_by_order_id(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>, DomainError> {
        Ok(self.working.items.get(&order_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl PayHistoryRepository for InMemoryTransaction {
    async fn insert(&mut self, order_id: OrderId, paid_at: Timestamp) -> Result<(), DomainError> {
        if self.faults.pay_history_insert.swap(false, Ordering::SeqCst) {
            return Err(DomainError::database("insert payment history", "injected failure"));
        }
        self.working.pay_history.push((order_id, paid_at));
        Ok(())
    }
}

#[async_trait]
impl Tlv2Repository for InMemoryTransaction {
    async fn get_cred_submission_report(
        &mut self,
        order_id: OrderId,
        item_id: OrderItemId,
        request_id: &str,
        first_blinded_cred: &str,
    ) -> Result<CredSubmissionReport, DomainError> {
        let mut report = CredSubmissionReport::default();
        for s in self.working.tlv2.iter().filter(|s| {
            s.order_id == order_id && s.item_id == item_id && s.first_blinded_cred == first_blinded_cred
        }) {
            report.submitted = true;
            if s.request_id != request_id {
                report.req_id_mismatch = true;
            }
        }
        Ok(report)
    }

    async fn uniq_batches(
        &mut self,
        order_id: OrderId,
        item_id: OrderItemId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<i64, DomainError> {
        let mut requests: Vec<&str> = self
            .working
            .tlv2
            .iter()
            .filter(|s| s.order_id == order_id && s.item_id == item_id)
            .filter(|s| !s.valid_from.is_after(&to) && s.valid_to.is_after(&from))
            .map(|s| s.request_id.as_str())
            .collect();
        requests.sort_unstable();
        requests.dedup();
        Ok(requests.len() as i64)
    }

    async fn insert_submission(&mut self, submission: &Tlv2Submission) -> Result<(), DomainError> {
        let duplicate = self.working.tlv2.iter().any(|s| {
            s.item_id == submission.item_id && s.first_blinded_cred == submission.first_blinded_cred
        });
        if duplicate {
            return Err(DomainError::new(ErrorCode::Conflict, "credentials already submitted"));
        }
        self.working.tlv2.push(submission.clone());
        Ok(())
    }
}

impl RepositorySet for InMemoryTransaction {
    fn orders(&mut self) -> &mut dyn OrderRepository {
        self
    }

    fn items(&mut self) -> &mut dyn OrderItemRepository {
        self
    }

    fn pay_history(&mut self) -> &mut dyn PayHistoryRepository {
        self
    }

    fn tlv2(&mut self) -> &mut dyn Tlv2Repository {
        self
    }
}

#[async_trait]
impl TransactionScope for InMemoryTransaction {
    fn repositories(&mut self) -> &mut dyn RepositorySet {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        if self.faults.commit.swap(false, Ordering::SeqCst) {
            return Err(DomainError::database("commit transaction", "injected failure"));
        }
        let InMemoryTransaction { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        Ok(())
    }
}
