//! Order aggregate.

use rust_decimal::Decimal;
use serde::Serialize;

use super::{OrderItem, OrderMetadata, OrderStatus};
use crate::domain::foundation::{OrderId, OrderItemId, Timestamp};
use crate::domain::vendor::Vendor;

/// Payment method names as stored in `allowed_payment_methods`.
pub const STRIPE_PAYMENT_METHOD: &str = "stripe";
pub const RADOM_PAYMENT_METHOD: &str = "radom";

/// An order and, when loaded with them, its items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub currency: String,
    pub total_price: Decimal,
    pub merchant_id: String,
    pub location: Option<String>,
    pub status: OrderStatus,
    pub allowed_payment_methods: Vec<String>,
    #[serde(skip)]
    pub metadata: OrderMetadata,
    pub valid_for_secs: Option<i64>,
    pub last_paid_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub trial_days: Option<i64>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Paid orders, and canceled orders whose entitlement has not run out.
    pub fn is_paid(&self, now: Timestamp) -> bool {
        match self.status {
            OrderStatus::Paid => true,
            OrderStatus::Canceled => self.expires_at.map_or(false, |e| e.is_after(&now)),
            OrderStatus::Pending => false,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.map_or(false, |e| !e.is_after(&now))
    }

    pub fn is_stripe_payable(&self) -> bool {
        self.accepts(STRIPE_PAYMENT_METHOD)
    }

    pub fn is_radom_payable(&self) -> bool {
        self.accepts(RADOM_PAYMENT_METHOD)
    }

    fn accepts(&self, method: &str) -> bool {
        self.allowed_payment_methods.iter().any(|m| m == method)
    }

    pub fn is_ios(&self) -> bool {
        self.metadata.vendor == Some(Vendor::AppStore)
    }

    pub fn is_android(&self) -> bool {
        self.metadata.vendor == Some(Vendor::PlayStore)
    }

    pub fn trial_days(&self) -> i64 {
        self.trial_days.unwrap_or(0)
    }

    pub fn has_item(&self, id: OrderItemId) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == id)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::order::CredentialType;
    use std::collections::BTreeMap;

    pub fn order(status: OrderStatus) -> Order {
        let now = Timestamp::now();
        Order {
            id: OrderId::new(),
            created_at: now,
            updated_at: now,
            currency: "USD".to_string(),
            total_price: Decimal::new(999, 2),
            merchant_id: "brave.com".to_string(),
            location: Some("vpn.brave.com".to_string()),
            status,
            allowed_payment_methods: vec![STRIPE_PAYMENT_METHOD.to_string()],
            metadata: OrderMetadata::default(),
            valid_for_secs: None,
            last_paid_at: None,
            expires_at: None,
            trial_days: None,
            items: Vec::new(),
        }
    }

    pub fn item(order_id: OrderId, credential_type: CredentialType, quantity: i32) -> OrderItem {
        let now = Timestamp::now();
        OrderItem {
            id: OrderItemId::new(),
            order_id,
            sku: "brave-vpn-premium".to_string(),
            sku_variant: "brave-vpn-premium".to_string(),
            created_at: now,
            updated_at: now,
            currency: "USD".to_string(),
            quantity,
            price: Decimal::new(999, 2),
            subtotal: Decimal::new(999, 2) * Decimal::from(quantity),
            location: Some("vpn.brave.com".to_string()),
            description: None,
            credential_type,
            valid_for_secs: None,
            valid_for_iso: None,
            each_credential_valid_duration: None,
            issuance_interval: None,
            metadata: BTreeMap::new(),
            issuer_config: None,
        }
    }
}
