//! Radom webhook notifications and subscription state.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use super::{Cancellation, OrderLocator, ReconciliationIntent, Renewal};
use crate::domain::foundation::{OrderId, Timestamp};
use crate::domain::order::OrderError;

/// Checkout-session metadata key that carries our order id.
pub const BRAVE_ORDER_ID_KEY: &str = "brave_order_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadomKeyValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadomNotification {
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub event_data: Option<RadomEventData>,
    #[serde(default)]
    pub radom_data: Option<RadomData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadomEventData {
    #[serde(default)]
    pub new_subscription: Option<SubscriptionRef>,
    #[serde(default)]
    pub subscription_payment: Option<SubscriptionPayment>,
    #[serde(default)]
    pub subscription_cancelled: Option<SubscriptionRef>,
    #[serde(default)]
    pub subscription_expired: Option<SubscriptionRef>,
    #[serde(default)]
    pub subscription_payment_attempt_failure: Option<SubscriptionRef>,
    #[serde(default)]
    pub subscription_payment_overdue: Option<SubscriptionRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRef {
    pub subscription_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPayment {
    #[serde(default)]
    pub radom_data: Option<RadomData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadomData {
    #[serde(default)]
    pub checkout_session: Option<RadomSessionRef>,
    #[serde(default)]
    pub subscription: Option<SubscriptionRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadomSessionRef {
    pub checkout_session_id: String,
    #[serde(default)]
    pub metadata: Vec<RadomKeyValue>,
}

/// What a Radom notification asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadomAction {
    /// Fetch the subscription and renew the order named in the session metadata.
    NewSubscription { order_id: OrderId, subscription_id: String },
    /// Fetch the subscription and renew the order that already holds it.
    Payment { subscription_id: String },
    Apply(ReconciliationIntent),
    /// Payment attempt failures and overdue notices.
    Informational { subscription_id: String },
}

impl RadomNotification {
    pub fn action(&self) -> Result<RadomAction, OrderError> {
        let unknown = || OrderError::UnknownAction(self.event_type.clone());
        let data = self.event_data.as_ref().ok_or_else(unknown)?;

        if let Some(new) = &data.new_subscription {
            return Ok(RadomAction::NewSubscription {
                order_id: self.order_id()?,
                subscription_id: new.subscription_id.clone(),
            });
        }

        if let Some(payment) = &data.subscription_payment {
            let sub = payment
                .radom_data
                .as_ref()
                .and_then(|d| d.subscription.as_ref())
                .ok_or_else(|| OrderError::malformed("radom payment without subscription data"))?;
            return Ok(RadomAction::Payment { subscription_id: sub.subscription_id.clone() });
        }

        if let Some(sub) = data.subscription_cancelled.as_ref().or(data.subscription_expired.as_ref()) {
            return Ok(RadomAction::Apply(ReconciliationIntent::Cancel(Cancellation {
                order: OrderLocator::RadomSubscription(sub.subscription_id.clone()),
                subscription_id: Some(sub.subscription_id.clone()),
            })));
        }

        if let Some(sub) = data
            .subscription_payment_attempt_failure
            .as_ref()
            .or(data.subscription_payment_overdue.as_ref())
        {
            return Ok(RadomAction::Informational { subscription_id: sub.subscription_id.clone() });
        }

        Err(unknown())
    }

    /// Order id from the checkout session metadata of a new subscription.
    pub fn order_id(&self) -> Result<OrderId, OrderError> {
        let session = self
            .radom_data
            .as_ref()
            .and_then(|d| d.checkout_session.as_ref())
            .ok_or_else(|| OrderError::malformed("radom new subscription without checkout session"))?;

        session
            .metadata
            .iter()
            .find(|kv| kv.key == BRAVE_ORDER_ID_KEY)
            .ok_or(OrderError::OrderIdMissing)?
            .value
            .parse::<OrderId>()
            .map_err(|e| OrderError::malformed(format!("{}: {}", BRAVE_ORDER_ID_KEY, e)))
    }
}

/// Subscription as returned by the Radom API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadomSubscription {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub next_billing_date_at: String,
    #[serde(default)]
    pub payments: Vec<RadomPayment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RadomPayment {
    pub date: String,
}

impl RadomSubscription {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    pub fn next_billing_date(&self) -> Result<Timestamp, OrderError> {
        parse_rfc3339(&self.next_billing_date_at)
    }

    /// Date of the most recent payment, if any.
    pub fn last_paid(&self) -> Result<Option<Timestamp>, OrderError> {
        self.payments.last().map(|p| parse_rfc3339(&p.date)).transpose()
    }

    /// Renewal of `order` through this subscription's current period.
    pub fn renewal(&self, order: OrderLocator, now: Timestamp) -> Result<ReconciliationIntent, OrderError> {
        Ok(ReconciliationIntent::Renew(Renewal {
            order,
            subscription_id: Some(self.id.clone()),
            period_start: None,
            expires_at: self.next_billing_date()?,
            paid_at: self.last_paid()?.unwrap_or(now),
        }))
    }
}

/// Checkout session as returned by the Radom API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadomCheckoutSession {
    pub checkout_session_id: String,
    pub session_status: String,
    #[serde(default)]
    pub subscription_ids: Vec<String>,
}

impl RadomCheckoutSession {
    pub fn is_success(&self) -> bool {
        self.session_status == "success"
    }

    pub fn is_expired(&self) -> bool {
        self.session_status == "expired"
    }

    /// The single subscription a successful session created.
    pub fn subscription_id(&self) -> Result<&str, OrderError> {
        match self.subscription_ids.as_slice() {
            [id] => Ok(id),
            ids => Err(OrderError::RadomInvalidNumAssocSubs(ids.len())),
        }
    }
}

fn parse_rfc3339(raw: &str) -> Result<Timestamp, OrderError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| Timestamp::from(dt.with_timezone(&chrono::Utc)))
        .map_err(|e| OrderError::invalid_vendor_data(format!("radom date '{}': {}", raw, e)))
}
