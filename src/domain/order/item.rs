//! Order line items.

use chrono::{Duration, Months};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{OrderId, OrderItemId, Timestamp, ValidationError};

/// Item metadata key holding the Stripe price id used in checkout line items.
pub const STRIPE_ITEM_ID_KEY: &str = "stripe_item_id";
/// Item metadata key holding the Stripe product id.
pub const STRIPE_PRODUCT_ID_KEY: &str = "stripe_product_id";
/// Item metadata key holding the Radom product id.
pub const RADOM_PRODUCT_ID_KEY: &str = "radom_product_id";

/// Kind of credential an item entitles the buyer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialType {
    #[serde(rename = "single-use")]
    SingleUse,
    #[serde(rename = "time-limited")]
    TimeLimited,
    #[serde(rename = "time-limited-v2")]
    TimeLimitedV2,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::SingleUse => "single-use",
            CredentialType::TimeLimited => "time-limited",
            CredentialType::TimeLimitedV2 => "time-limited-v2",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single-use" => Ok(CredentialType::SingleUse),
            "time-limited" => Ok(CredentialType::TimeLimited),
            "time-limited-v2" => Ok(CredentialType::TimeLimitedV2),
            other => Err(ValidationError::invalid_format(
                "credential_type",
                format!("unknown credential type '{}'", other),
            )),
        }
    }
}

/// Issuer window configuration for time-limited-v2 items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerConfig {
    /// Intervals issued ahead of the current one.
    pub buffer: i64,
    /// Intervals overlapping the previous window.
    pub overlap: i64,
}

impl IssuerConfig {
    pub fn num_intervals(&self) -> i64 {
        self.buffer + self.overlap
    }
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            buffer: 30,
            overlap: 5,
        }
    }
}

/// A priced line item belonging to one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub sku: String,
    pub sku_variant: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub currency: String,
    pub quantity: i32,
    pub price: Decimal,
    pub subtotal: Decimal,
    pub location: Option<String>,
    pub description: Option<String>,
    pub credential_type: CredentialType,
    /// Entitlement length in seconds.
    pub valid_for_secs: Option<i64>,
    pub valid_for_iso: Option<String>,
    pub each_credential_valid_duration: Option<String>,
    pub issuance_interval: Option<String>,
    pub metadata: BTreeMap<String, String>,
    /// Only meaningful while creating the order; never persisted.
    #[serde(skip)]
    pub issuer_config: Option<IssuerConfig>,
}

impl OrderItem {
    pub fn valid_for(&self) -> Option<Duration> {
        self.valid_for_secs.and_then(Duration::try_seconds)
    }

    pub fn stripe_price_id(&self) -> Option<&str> {
        self.metadata.get(STRIPE_ITEM_ID_KEY).map(String::as_str)
    }

    pub fn radom_product_id(&self) -> Option<&str> {
        self.metadata.get(RADOM_PRODUCT_ID_KEY).map(String::as_str)
    }

    pub fn is_leo(&self) -> bool {
        self.sku == "brave-leo-premium" || self.sku_variant.starts_with("brave-leo-premium")
    }
}

/// A calendar-aware ISO-8601 duration (`P1M`, `P1Y2M10DT2H30M`, `P2W`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IsoDuration {
    pub months: u32,
    pub days: i64,
    pub seconds: i64,
}

impl IsoDuration {
    /// Returns the instant `self` after `from`.
    pub fn after(&self, from: Timestamp) -> Option<Timestamp> {
        let dt = from
            .into_datetime()
            .checked_add_months(Months::new(self.months))?
            .checked_add_signed(Duration::try_days(self.days)?)?
            .checked_add_signed(Duration::try_seconds(self.seconds)?)?;
        Some(Timestamp::from_datetime(dt))
    }

    /// Length of the duration when started at `from`.
    pub fn length_from(&self, from: Timestamp) -> Option<Duration> {
        self.after(from).map(|end| end.duration_since(&from))
    }
}

impl FromStr for IsoDuration {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::invalid_format("iso_duration", format!("{}: '{}'", reason, s));

        let body = s.strip_prefix('P').ok_or_else(|| invalid("missing P designator"))?;
        if body.is_empty() {
            return Err(invalid("empty duration"));
        }

        let mut out = IsoDuration::default();
        let mut in_time = false;
        let mut digits = String::new();
        let mut seen_component = false;

        for c in body.chars() {
            match c {
                '0'..='9' => digits.push(c),
                'T' if !in_time && digits.is_empty() => in_time = true,
                _ => {
                    let n: i64 = digits.parse().map_err(|_| invalid("missing number"))?;
                    digits.clear();
                    seen_component = true;
                    match (in_time, c) {
                        (false, 'Y') => {
                            let months = u32::try_from(n.saturating_mul(12)).map_err(|_| invalid("too large"))?;
                            out.months = out.months.saturating_add(months);
                        }
                        (false, 'M') => {
                            let months = u32::try_from(n).map_err(|_| invalid("too large"))?;
                            out.months = out.months.saturating_add(months);
                        }
                        (false, 'W') => out.days = out.days.saturating_add(n.saturating_mul(7)),
                        (false, 'D') => out.days = out.days.saturating_add(n),
                        (true, 'H') => out.seconds = out.seconds.saturating_add(n.saturating_mul(3600)),
                        (true, 'M') => out.seconds = out.seconds.saturating_add(n.saturating_mul(60)),
                        (true, 'S') => out.seconds = out.seconds.saturating_add(n),
                        _ => return Err(invalid("unexpected designator")),
                    }
                }
            }
        }

        if !digits.is_empty() || !seen_component {
            return Err(invalid("incomplete duration"));
        }
        Ok(out)
    }
}
