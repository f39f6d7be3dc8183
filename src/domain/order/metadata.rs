//! Typed order metadata.
//!
//! Orders carry a JSON metadata blob. Every key the system itself reads
//! or writes has a named, typed field here. Anything else lands in
//! [`OrderMetadata::extra`] untouched.
//!
//! Numbers are canonically `i64`. JSON numbers with a fraction are
//! truncated on the way in. A known numeric key holding a non-number
//! is parked in `extra` so the typed accessor can report it as invalid
//! rather than guessing a value.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::OrderError;
use crate::domain::vendor::Vendor;

/// Metadata key names as stored.
pub mod keys {
    pub const STRIPE_SUBSCRIPTION_ID: &str = "stripeSubscriptionId";
    pub const STRIPE_CHECKOUT_SESSION_ID: &str = "stripeCheckoutSessionId";
    pub const RADOM_CHECKOUT_SESSION_ID: &str = "radomCheckoutSessionId";
    pub const RADOM_SUBSCRIPTION_ID: &str = "radomSubscriptionId";
    pub const PAYMENT_PROCESSOR: &str = "paymentProcessor";
    pub const VENDOR: &str = "vendor";
    pub const EXTERNAL_ID: &str = "externalID";
    pub const NUM_PAYMENT_FAILED: &str = "numPaymentFailed";
    pub const NUM_PER_INTERVAL: &str = "numPerInterval";
    pub const NUM_INTERVALS: &str = "numIntervals";
}

/// A metadata value accepted by `AppendMetadata`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Text(String),
    Int(i64),
}

impl MetadataValue {
    /// Converts an incoming JSON value.
    ///
    /// Strings and numbers are accepted. Anything else is
    /// `InvalidOrderMetadataType`.
    pub fn from_json(key: &str, value: &Value) -> Result<Self, OrderError> {
        match value {
            Value::String(s) => Ok(MetadataValue::Text(s.clone())),
            Value::Number(_) => json_to_i64(value)
                .map(MetadataValue::Int)
                .ok_or_else(|| OrderError::invalid_metadata_type(key)),
            _ => Err(OrderError::invalid_metadata_type(key)),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            MetadataValue::Text(s) => Value::String(s.clone()),
            MetadataValue::Int(n) => Value::from(*n),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Text(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::Text(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        MetadataValue::Int(n)
    }
}

fn json_to_i64(value: &Value) -> Option<i64> {
    let n = value.as_number()?;
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

/// Order metadata with typed access to every known key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderMetadata {
    pub stripe_subscription_id: Option<String>,
    pub stripe_checkout_session_id: Option<String>,
    pub radom_checkout_session_id: Option<String>,
    pub radom_subscription_id: Option<String>,
    pub payment_processor: Option<Vendor>,
    pub vendor: Option<Vendor>,
    pub external_id: Option<String>,
    pub num_payment_failed: Option<i64>,
    pub num_per_interval: Option<i64>,
    pub num_intervals: Option<i64>,
    /// Keys the system does not interpret, plus unparseable values of known keys.
    pub extra: BTreeMap<String, Value>,
}

impl OrderMetadata {
    /// Builds metadata from a stored JSON object. Never fails.
    pub fn from_json_map(map: &Map<String, Value>) -> Self {
        let mut md = OrderMetadata::default();
        for (key, value) in map {
            md.set_json(key, value);
        }
        md
    }

    /// Builds metadata from an arbitrary JSON value; non-objects give empty metadata.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::from_json_map(map),
            _ => Self::default(),
        }
    }

    /// Last-write-wins update of a single key.
    pub fn set(&mut self, key: &str, value: MetadataValue) {
        self.set_json(key, &value.to_json());
    }

    fn set_json(&mut self, key: &str, value: &Value) {
        self.extra.remove(key);
        match key {
            keys::STRIPE_SUBSCRIPTION_ID => self.stripe_subscription_id = text_of(value),
            keys::STRIPE_CHECKOUT_SESSION_ID => self.stripe_checkout_session_id = text_of(value),
            keys::RADOM_CHECKOUT_SESSION_ID => self.radom_checkout_session_id = text_of(value),
            keys::RADOM_SUBSCRIPTION_ID => self.radom_subscription_id = text_of(value),
            keys::EXTERNAL_ID => self.external_id = text_of(value),
            keys::PAYMENT_PROCESSOR => {
                self.payment_processor = self.parse_or_park(key, value, parse_vendor)
            }
            keys::VENDOR => self.vendor = self.parse_or_park(key, value, parse_vendor),
            keys::NUM_PAYMENT_FAILED => {
                self.num_payment_failed = self.parse_or_park(key, value, json_to_i64)
            }
            keys::NUM_PER_INTERVAL => {
                self.num_per_interval = self.parse_or_park(key, value, json_to_i64)
            }
            keys::NUM_INTERVALS => self.num_intervals = self.parse_or_park(key, value, json_to_i64),
            _ => {
                self.extra.insert(key.to_string(), value.clone());
            }
        }
    }

    fn parse_or_park<T>(&mut self, key: &str, value: &Value, parse: fn(&Value) -> Option<T>) -> Option<T> {
        let parsed = parse(value);
        if parsed.is_none() && !value.is_null() {
            self.extra.insert(key.to_string(), value.clone());
        }
        parsed
    }

    /// Serializes back to the stored JSON object.
    pub fn to_json_map(&self) -> Map<String, Value> {
        let mut map: Map<String, Value> = self
            .extra
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let texts = [
            (keys::STRIPE_SUBSCRIPTION_ID, &self.stripe_subscription_id),
            (keys::STRIPE_CHECKOUT_SESSION_ID, &self.stripe_checkout_session_id),
            (keys::RADOM_CHECKOUT_SESSION_ID, &self.radom_checkout_session_id),
            (keys::RADOM_SUBSCRIPTION_ID, &self.radom_subscription_id),
            (keys::EXTERNAL_ID, &self.external_id),
        ];
        for (key, value) in texts {
            if let Some(v) = value {
                map.insert(key.to_string(), Value::String(v.clone()));
            }
        }

        for (key, value) in [
            (keys::PAYMENT_PROCESSOR, self.payment_processor),
            (keys::VENDOR, self.vendor),
        ] {
            if let Some(v) = value {
                map.insert(key.to_string(), Value::String(v.as_str().to_string()));
            }
        }

        for (key, value) in [
            (keys::NUM_PAYMENT_FAILED, self.num_payment_failed),
            (keys::NUM_PER_INTERVAL, self.num_per_interval),
            (keys::NUM_INTERVALS, self.num_intervals),
        ] {
            if let Some(v) = value {
                map.insert(key.to_string(), Value::from(v));
            }
        }

        map
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.to_json_map())
    }

    /// `numPerInterval`, required for time-limited-v2 issuance.
    pub fn num_per_interval(&self) -> Result<i64, OrderError> {
        required_int(
            self.num_per_interval,
            self.extra.contains_key(keys::NUM_PER_INTERVAL),
            OrderError::NumPerIntervalNotSet,
            OrderError::InvalidNumPerInterval,
        )
    }

    /// `numIntervals`, required for time-limited-v2 issuance.
    pub fn num_intervals(&self) -> Result<i64, OrderError> {
        required_int(
            self.num_intervals,
            self.extra.contains_key(keys::NUM_INTERVALS),
            OrderError::NumIntervalsNotSet,
            OrderError::InvalidNumIntervals,
        )
    }

    /// True when `vendor` may write the payment-processor tags.
    ///
    /// Tags are claimed by the first vendor that writes them and only that
    /// vendor's reconciliation may rewrite them.
    pub fn can_claim_processor(&self, vendor: Vendor) -> bool {
        let processor_ok = self.payment_processor.map_or(true, |p| p == vendor);
        let vendor_ok = self.vendor.map_or(true, |v| v == vendor);
        processor_ok && vendor_ok
    }

    /// The stored subscription id for `vendor`, if that vendor tracks one.
    pub fn subscription_id_for(&self, vendor: Vendor) -> Option<&str> {
        match vendor {
            Vendor::Stripe => self.stripe_subscription_id.as_deref(),
            Vendor::Radom => self.radom_subscription_id.as_deref(),
            Vendor::AppStore | Vendor::PlayStore => None,
        }
    }

    /// Whether a renewal should rewrite the stored subscription id.
    ///
    /// False only when the stored id is non-empty and equals `new_id`.
    pub fn should_update_subscription_id(&self, vendor: Vendor, new_id: &str) -> bool {
        match self.subscription_id_for(vendor) {
            Some(stored) if !stored.is_empty() => stored != new_id,
            _ => true,
        }
    }

    /// The vendor that owns billing for this order, if recorded.
    pub fn billing_vendor(&self) -> Option<Vendor> {
        self.vendor.or(self.payment_processor)
    }
}

/// Metadata key under which `vendor` records its subscription id.
pub fn subscription_id_key(vendor: Vendor) -> Option<&'static str> {
    match vendor {
        Vendor::Stripe => Some(keys::STRIPE_SUBSCRIPTION_ID),
        Vendor::Radom => Some(keys::RADOM_SUBSCRIPTION_ID),
        Vendor::AppStore | Vendor::PlayStore => None,
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_vendor(value: &Value) -> Option<Vendor> {
    value.as_str().and_then(|s| s.parse().ok())
}

fn required_int(
    typed: Option<i64>,
    parked: bool,
    not_set: OrderError,
    invalid: OrderError,
) -> Result<i64, OrderError> {
    match typed {
        Some(n) => Ok(n),
        None if parked => Err(invalid),
        None => Err(not_set),
    }
}
