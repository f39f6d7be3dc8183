//! Stripe webhook events mapped to reconciliation intents.

use serde::Deserialize;
use std::collections::HashMap;

use super::{Cancellation, OrderLocator, PaymentFailure, ReconciliationIntent, Renewal};
use crate::domain::foundation::{OrderId, Timestamp};
use crate::domain::order::OrderError;

/// Grace added to a paid invoice period.
pub const STRIPE_GRACE_HOURS: i64 = 24;

const ORDER_ID_KEY: &str = "orderID";
const UMA_ST_SUB_ID: &str = "uma__st_sub_id";
const UMA_SUB_ID: &str = "uma__sub_id";
const UMA_ORDER_ID: &str = "uma__order_id";
const UMA_COUPON_ID: &str = "uma__coupon_id";

/// A decoded Stripe event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub lines: Option<StripeList<StripeInvoiceLine>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceLine {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub period: Option<StripePeriod>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StripePeriod {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionObject {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A Stripe event narrowed to the types reconciliation acts on.
#[derive(Debug, Clone)]
pub enum StripeNotification {
    InvoicePaid(StripeInvoice),
    InvoicePaymentFailed(StripeInvoice),
    SubscriptionDeleted(StripeSubscriptionObject),
    /// Any other event type; acknowledged and skipped.
    Other(String),
}

/// Monthly-to-annual upgrade linkage found on a paid invoice.
///
/// The annual subscription replaces an older monthly one; once the new
/// order is renewed, the old Stripe subscription and order are canceled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedSubscription {
    pub stripe_subscription_id: String,
    pub subscription_id: String,
    pub order_id: OrderId,
    pub coupon_id: String,
}

impl StripeNotification {
    pub fn from_event(event: &StripeEvent) -> Result<Self, OrderError> {
        let decode_err = |e: serde_json::Error| {
            OrderError::malformed(format!("stripe {} object: {}", event.event_type, e))
        };

        match event.event_type.as_str() {
            "invoice.paid" => serde_json::from_value(event.data.object.clone())
                .map(StripeNotification::InvoicePaid)
                .map_err(decode_err),
            "invoice.payment_failed" => serde_json::from_value(event.data.object.clone())
                .map(StripeNotification::InvoicePaymentFailed)
                .map_err(decode_err),
            "customer.subscription.deleted" => serde_json::from_value(event.data.object.clone())
                .map(StripeNotification::SubscriptionDeleted)
                .map_err(decode_err),
            other => Ok(StripeNotification::Other(other.to_string())),
        }
    }

    /// The intent this notification maps to; `None` for skipped types.
    pub fn intent(&self, now: Timestamp) -> Result<Option<ReconciliationIntent>, OrderError> {
        match self {
            StripeNotification::InvoicePaid(invoice) => {
                let subscription_id = invoice_subscription(invoice)?;
                let line = first_line(invoice)?;
                let order_id = order_id_from(&line.metadata)?;

                let period = line
                    .period
                    .filter(|p| p.end != 0)
                    .ok_or(OrderError::InvalidSubPeriod)?;
                let period_end = Timestamp::from_unix_secs(period.end).ok_or(OrderError::InvalidSubPeriod)?;

                Ok(Some(ReconciliationIntent::Renew(Renewal {
                    order: OrderLocator::Id(order_id),
                    subscription_id: Some(subscription_id),
                    period_start: Timestamp::from_unix_secs(period.start),
                    expires_at: period_end.plus_hours(STRIPE_GRACE_HOURS),
                    paid_at: now,
                })))
            }
            StripeNotification::InvoicePaymentFailed(invoice) => {
                let subscription_id = invoice_subscription(invoice)?;
                let line = first_line(invoice)?;
                let order_id = order_id_from(&line.metadata)?;

                Ok(Some(ReconciliationIntent::RecordFailure(PaymentFailure {
                    order: OrderLocator::Id(order_id),
                    subscription_id: Some(subscription_id),
                })))
            }
            StripeNotification::SubscriptionDeleted(sub) => {
                let order_id = order_id_from(&sub.metadata)?;
                Ok(Some(ReconciliationIntent::Cancel(Cancellation {
                    order: OrderLocator::Id(order_id),
                    subscription_id: Some(sub.id.clone()),
                })))
            }
            StripeNotification::Other(_) => Ok(None),
        }
    }

    /// Upgrade linkage carried on a paid invoice's first line, if any.
    pub fn linked_subscription(&self) -> Result<Option<LinkedSubscription>, OrderError> {
        let invoice = match self {
            StripeNotification::InvoicePaid(invoice) => invoice,
            _ => return Ok(None),
        };
        let line = first_line(invoice)?;
        let md = &line.metadata;

        let stripe_subscription_id = match md.get(UMA_ST_SUB_ID) {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        let subscription_id = md.get(UMA_SUB_ID).ok_or(OrderError::UmaSubIdMissing)?.clone();
        let order_id = md
            .get(UMA_ORDER_ID)
            .ok_or(OrderError::UmaOrderIdMissing)?
            .parse::<OrderId>()
            .map_err(|e| OrderError::malformed(format!("{}: {}", UMA_ORDER_ID, e)))?;
        let coupon_id = md.get(UMA_COUPON_ID).ok_or(OrderError::UmaCouponIdMissing)?.clone();

        Ok(Some(LinkedSubscription {
            stripe_subscription_id,
            subscription_id,
            order_id,
            coupon_id,
        }))
    }

    pub fn event_type(&self) -> &str {
        match self {
            StripeNotification::InvoicePaid(_) => "invoice.paid",
            StripeNotification::InvoicePaymentFailed(_) => "invoice.payment_failed",
            StripeNotification::SubscriptionDeleted(_) => "customer.subscription.deleted",
            StripeNotification::Other(t) => t,
        }
    }
}

fn invoice_subscription(invoice: &StripeInvoice) -> Result<String, OrderError> {
    invoice
        .subscription
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or(OrderError::NoInvoiceSub)
}

fn first_line(invoice: &StripeInvoice) -> Result<&StripeInvoiceLine, OrderError> {
    invoice
        .lines
        .as_ref()
        .and_then(|l| l.data.first())
        .ok_or(OrderError::NoInvoiceLines)
}

fn order_id_from(metadata: &HashMap<String, String>) -> Result<OrderId, OrderError> {
    metadata
        .get(ORDER_ID_KEY)
        .ok_or(OrderError::OrderIdMissing)?
        .parse::<OrderId>()
        .map_err(|e| OrderError::malformed(format!("{}: {}", ORDER_ID_KEY, e)))
}
