//! Google Play real-time developer notifications.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Deserializer};

use super::{Cancellation, OrderLocator, ReconciliationIntent, Renewal};
use crate::domain::foundation::Timestamp;
use crate::domain::order::OrderError;

/// Subscription notification type: renewed.
pub const SUBSCRIPTION_RENEWED: i32 = 2;
/// Subscription notification type: canceled.
pub const SUBSCRIPTION_CANCELED: i32 = 3;
/// Voided purchase product type for subscriptions.
pub const VOIDED_PRODUCT_TYPE_SUBSCRIPTION: i32 = 1;
/// Grace added to a purchase's expiry.
pub const PLAY_GRACE_DAYS: i64 = 1;

/// Notifications older than this are ignored.
pub fn notification_cutoff() -> Timestamp {
    Timestamp::from_datetime(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().unwrap_or_default())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeveloperNotification {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub package_name: String,
    #[serde(deserialize_with = "de_int_string")]
    pub event_time_millis: i64,
    #[serde(default)]
    pub subscription_notification: Option<SubscriptionNotification>,
    #[serde(default)]
    pub voided_purchase_notification: Option<VoidedPurchaseNotification>,
    #[serde(default)]
    pub test_notification: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionNotification {
    pub notification_type: i32,
    pub purchase_token: String,
    #[serde(default)]
    pub subscription_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoidedPurchaseNotification {
    pub purchase_token: String,
    #[serde(default)]
    pub order_id: String,
    pub product_type: i32,
}

/// Purchase state from the Play Developer API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPurchase {
    #[serde(default, deserialize_with = "de_opt_int_string")]
    pub expiry_time_millis: Option<i64>,
    #[serde(default)]
    pub payment_state: Option<i32>,
    #[serde(default)]
    pub auto_renewing: Option<bool>,
}

impl SubscriptionPurchase {
    /// 0 is payment pending, 3 is pending deferred upgrade.
    pub fn is_paid(&self) -> bool {
        !matches!(self.payment_state, Some(0) | Some(3))
    }

    pub fn expires_at(&self) -> Option<Timestamp> {
        self.expiry_time_millis.and_then(Timestamp::from_unix_millis)
    }
}

/// What a developer notification asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayStoreAction {
    /// Fetch the purchase and renew if it is paid.
    FetchAndRenew {
        package_name: String,
        subscription_id: String,
        purchase_token: String,
    },
    Apply(ReconciliationIntent),
    Skip(&'static str),
}

impl DeveloperNotification {
    pub fn event_time(&self) -> Option<Timestamp> {
        Timestamp::from_unix_millis(self.event_time_millis)
    }

    pub fn action(&self, cutoff: Timestamp) -> PlayStoreAction {
        match self.event_time() {
            Some(t) if !t.is_before(&cutoff) => {}
            _ => return PlayStoreAction::Skip("before_cutoff"),
        }

        if let Some(sub) = &self.subscription_notification {
            return match sub.notification_type {
                SUBSCRIPTION_RENEWED => PlayStoreAction::FetchAndRenew {
                    package_name: self.package_name.clone(),
                    subscription_id: sub.subscription_id.clone(),
                    purchase_token: sub.purchase_token.clone(),
                },
                SUBSCRIPTION_CANCELED => PlayStoreAction::Apply(cancel(&sub.purchase_token)),
                _ => PlayStoreAction::Skip("unhandled_subscription_type"),
            };
        }

        if let Some(voided) = &self.voided_purchase_notification {
            if voided.product_type == VOIDED_PRODUCT_TYPE_SUBSCRIPTION {
                return PlayStoreAction::Apply(cancel(&voided.purchase_token));
            }
            return PlayStoreAction::Skip("voided_one_time_product");
        }

        PlayStoreAction::Skip("no_subscription_data")
    }
}

fn cancel(purchase_token: &str) -> ReconciliationIntent {
    ReconciliationIntent::Cancel(Cancellation {
        order: OrderLocator::ExternalId(purchase_token.to_string()),
        subscription_id: None,
    })
}

/// Renewal for a fetched purchase; `None` while payment is pending.
pub fn renewal_for_purchase(
    purchase_token: &str,
    purchase: &SubscriptionPurchase,
    now: Timestamp,
) -> Result<Option<ReconciliationIntent>, OrderError> {
    if !purchase.is_paid() {
        return Ok(None);
    }

    let expires = purchase
        .expires_at()
        .ok_or_else(|| OrderError::invalid_vendor_data("play purchase without expiryTimeMillis"))?;

    Ok(Some(ReconciliationIntent::Renew(Renewal {
        order: OrderLocator::ExternalId(purchase_token.to_string()),
        subscription_id: None,
        period_start: None,
        expires_at: expires.plus_days(PLAY_GRACE_DAYS),
        paid_at: now,
    })))
}

// Google encodes int64 fields as JSON strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

fn de_int_string<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    match IntOrString::deserialize(d)? {
        IntOrString::Int(v) => Ok(v),
        IntOrString::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn de_opt_int_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    match Option::<IntOrString>::deserialize(d)? {
        None => Ok(None),
        Some(IntOrString::Int(v)) => Ok(Some(v)),
        Some(IntOrString::Str(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
