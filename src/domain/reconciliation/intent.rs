//! Vendor-agnostic reconciliation intents.

use crate::domain::foundation::{OrderId, Timestamp};

/// How an intent addresses its order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderLocator {
    /// Our order id, carried in vendor metadata.
    Id(OrderId),
    /// A vendor purchase token or original transaction id stored as `externalID`.
    ExternalId(String),
    /// A Radom subscription id stored as `radomSubscriptionId`.
    RadomSubscription(String),
}

impl std::fmt::Display for OrderLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderLocator::Id(id) => write!(f, "order:{}", id),
            OrderLocator::ExternalId(id) => write!(f, "external:{}", id),
            OrderLocator::RadomSubscription(id) => write!(f, "radom_sub:{}", id),
        }
    }
}

/// A paid billing period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renewal {
    pub order: OrderLocator,
    pub subscription_id: Option<String>,
    pub period_start: Option<Timestamp>,
    /// End of entitlement, grace included.
    pub expires_at: Timestamp,
    pub paid_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    pub order: OrderLocator,
    pub subscription_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentFailure {
    pub order: OrderLocator,
    pub subscription_id: Option<String>,
}

/// What a vendor notification asks the order state machine to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationIntent {
    Renew(Renewal),
    Cancel(Cancellation),
    RecordFailure(PaymentFailure),
}

impl ReconciliationIntent {
    pub fn order(&self) -> &OrderLocator {
        match self {
            ReconciliationIntent::Renew(r) => &r.order,
            ReconciliationIntent::Cancel(c) => &c.order,
            ReconciliationIntent::RecordFailure(f) => &f.order,
        }
    }

    pub fn subscription_id(&self) -> Option<&str> {
        match self {
            ReconciliationIntent::Renew(r) => r.subscription_id.as_deref(),
            ReconciliationIntent::Cancel(c) => c.subscription_id.as_deref(),
            ReconciliationIntent::RecordFailure(f) => f.subscription_id.as_deref(),
        }
    }

    /// Short name for logs.
    pub fn effect(&self) -> &'static str {
        match self {
            ReconciliationIntent::Renew(_) => "renew",
            ReconciliationIntent::Cancel(_) => "cancel",
            ReconciliationIntent::RecordFailure(_) => "record_payment_failure",
        }
    }
}

/// Result of applying an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Renewed,
    Canceled,
    FailureRecorded,
    /// The order was already canceled; nothing was written.
    AlreadyCanceled,
}
