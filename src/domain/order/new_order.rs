//! Building new orders and their priced items from a creation request.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::item::{RADOM_PRODUCT_ID_KEY, STRIPE_ITEM_ID_KEY, STRIPE_PRODUCT_ID_KEY};
use super::{CredentialType, IsoDuration, IssuerConfig, OrderError, OrderItem, OrderMetadata, OrderStatus};
use crate::domain::foundation::{OrderId, OrderItemId, Timestamp};

/// Merchant every premium order is created under.
pub const DEFAULT_MERCHANT_ID: &str = "brave.com";

/// Success and cancel destinations for a vendor checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutUrls {
    pub success_uri: String,
    pub cancel_uri: String,
    /// Radom only: where the "back" button on a subscription page leads.
    #[serde(default)]
    pub subscription_back_button_uri: Option<String>,
}

/// Stripe product wiring for one requested item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStripeMetadata {
    pub product_id: String,
    /// Stripe price id.
    pub item_id: String,
}

/// One requested line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub sku: String,
    pub sku_variant: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub credential_type: CredentialType,
    /// ISO-8601 entitlement length, e.g. `P1M`.
    pub credential_valid_duration: String,
    pub credential_valid_duration_each: Option<String>,
    pub issuance_interval: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    #[serde(default)]
    pub stripe_metadata: Option<ItemStripeMetadata>,
    #[serde(default)]
    pub radom_product_id: Option<String>,
    #[serde(default)]
    pub issuer_token_buffer: Option<i64>,
    #[serde(default)]
    pub issuer_token_overlap: Option<i64>,
}

/// A request to create a premium order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub currency: String,
    pub payment_methods: Vec<String>,
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub stripe_urls: Option<CheckoutUrls>,
    #[serde(default)]
    pub radom_urls: Option<CheckoutUrls>,
    /// Stripe coupon ids applied to the checkout session.
    #[serde(default)]
    pub discounts: Vec<String>,
}

/// An order ready to be inserted together with its items.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub id: OrderId,
    pub merchant_id: String,
    pub currency: String,
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub location: Option<String>,
    pub allowed_payment_methods: Vec<String>,
    pub valid_for_secs: Option<i64>,
    /// Metadata written together with the order row.
    pub metadata: OrderMetadata,
}

impl NewOrder {
    /// Builds a new order from already-priced items.
    ///
    /// A zero total forces `paid`. Location comes from the first item
    /// that has one; validity from the first item.
    pub fn for_items(
        merchant_id: &str,
        currency: &str,
        payment_methods: &[String],
        items: &[OrderItem],
        status: OrderStatus,
    ) -> Result<Self, OrderError> {
        let first = items
            .first()
            .ok_or_else(|| OrderError::invalid_order_request("order must contain at least one item"))?;

        let total_price = items
            .iter()
            .try_fold(Decimal::ZERO, |total, item| total.checked_add(item.subtotal))
            .ok_or_else(|| OrderError::invalid_order_request("order total out of range"))?;

        let status = if total_price.is_zero() {
            OrderStatus::Paid
        } else {
            status
        };

        let location = items.iter().find_map(|item| item.location.clone());

        Ok(Self {
            id: OrderId::new(),
            merchant_id: merchant_id.to_string(),
            currency: currency.to_string(),
            status,
            total_price,
            location,
            allowed_payment_methods: payment_methods.to_vec(),
            valid_for_secs: Some(first.valid_for_secs.unwrap_or(0)),
            metadata: OrderMetadata::default(),
        })
    }
}

/// Prices one requested item.
pub fn new_order_item(
    currency: &str,
    req: &OrderItemRequest,
    now: Timestamp,
) -> Result<OrderItem, OrderError> {
    if req.quantity <= 0 {
        return Err(OrderError::invalid_order_request(format!(
            "quantity must be positive for sku {}",
            req.sku
        )));
    }

    let subtotal = req
        .price
        .checked_mul(Decimal::from(req.quantity))
        .ok_or_else(|| OrderError::invalid_order_request(format!("subtotal out of range for sku {}", req.sku)))?;

    let valid_for = req
        .credential_valid_duration
        .parse::<IsoDuration>()
        .map_err(|e| OrderError::invalid_order_request(e.to_string()))?
        .length_from(now)
        .ok_or_else(|| OrderError::invalid_order_request("credential validity out of range"))?;

    let mut metadata = BTreeMap::new();
    if let Some(stripe) = &req.stripe_metadata {
        metadata.insert(STRIPE_PRODUCT_ID_KEY.to_string(), stripe.product_id.clone());
        metadata.insert(STRIPE_ITEM_ID_KEY.to_string(), stripe.item_id.clone());
    }
    if let Some(radom) = &req.radom_product_id {
        metadata.insert(RADOM_PRODUCT_ID_KEY.to_string(), radom.clone());
    }

    let issuer_config = match req.credential_type {
        CredentialType::TimeLimitedV2 => {
            let defaults = IssuerConfig::default();
            Some(IssuerConfig {
                buffer: req.issuer_token_buffer.unwrap_or(defaults.buffer),
                overlap: req.issuer_token_overlap.unwrap_or(defaults.overlap),
            })
        }
        _ => None,
    };

    Ok(OrderItem {
        id: OrderItemId::new(),
        // Replaced with the real order id on insert.
        order_id: OrderId::from_uuid(uuid::Uuid::nil()),
        sku: req.sku.clone(),
        sku_variant: req.sku_variant.clone(),
        created_at: now,
        updated_at: now,
        currency: currency.to_string(),
        quantity: req.quantity,
        price: req.price,
        subtotal,
        location: req.location.clone(),
        description: req.description.clone(),
        credential_type: req.credential_type,
        valid_for_secs: Some(valid_for.num_seconds()),
        valid_for_iso: Some(req.credential_valid_duration.clone()),
        each_credential_valid_duration: req.credential_valid_duration_each.clone(),
        issuance_interval: req.issuance_interval.clone(),
        metadata,
        issuer_config,
    })
}

/// Prices every item of a request.
pub fn new_order_items(req: &CreateOrderRequest, now: Timestamp) -> Result<Vec<OrderItem>, OrderError> {
    req.items
        .iter()
        .map(|item| new_order_item(&req.currency, item, now))
        .collect()
}

/// `numIntervals` for a set of items: taken from the last time-limited-v2 item.
pub fn num_intervals_for(items: &[OrderItem]) -> i64 {
    items
        .iter()
        .filter(|item| item.credential_type == CredentialType::TimeLimitedV2)
        .filter_map(|item| item.issuer_config.map(|c| c.num_intervals()))
        .last()
        .unwrap_or(0)
}

/// `numPerInterval` for a set of items.
pub fn num_per_interval_for(items: &[OrderItem]) -> i64 {
    match items {
        [only] if only.is_leo() => 192,
        _ => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item_req(price: Decimal) -> OrderItemRequest {
        OrderItemRequest {
            sku: "brave-vpn-premium".to_string(),
            sku_variant: "brave-vpn-premium".to_string(),
            location: Some("vpn.brave.com".to_string()),
            description: Some("VPN".to_string()),
            credential_type: CredentialType::TimeLimitedV2,
            credential_valid_duration: "P1M".to_string(),
            credential_valid_duration_each: Some("P1D".to_string()),
            issuance_interval: Some("P1D".to_string()),
            price,
            quantity: 1,
            stripe_metadata: Some(ItemStripeMetadata {
                product_id: "prod_1".to_string(),
                item_id: "price_1".to_string(),
            }),
            radom_product_id: None,
            issuer_token_buffer: Some(31),
            issuer_token_overlap: Some(2),
        }
    }

    fn priced(prices: &[Decimal]) -> Vec<OrderItem> {
        prices
            .iter()
            .map(|p| new_order_item("USD", &item_req(*p), Timestamp::now()).unwrap())
            .collect()
    }

    // ════════════════════════════════════════════════════════════════
    // NewOrder::for_items
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn two_one_dollar_items_make_a_pending_two_dollar_order() {
        let items = priced(&[dec!(1), dec!(1)]);
        let methods = vec!["stripe".to_string()];

        let order = NewOrder::for_items(DEFAULT_MERCHANT_ID, "USD", &methods, &items, OrderStatus::Pending).unwrap();

        assert_eq!(order.total_price, dec!(2));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.allowed_payment_methods, vec!["stripe".to_string()]);
    }

    #[test]
    fn free_order_is_paid_regardless_of_requested_status() {
        let items = priced(&[dec!(0)]);

        let order = NewOrder::for_items(DEFAULT_MERCHANT_ID, "USD", &[], &items, OrderStatus::Pending).unwrap();

        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[test]
    fn zero_items_is_an_invalid_request() {
        let result = NewOrder::for_items(DEFAULT_MERCHANT_ID, "USD", &[], &[], OrderStatus::Pending);
        assert!(matches!(result, Err(OrderError::InvalidOrderRequest(_))));
    }

    #[test]
    fn location_comes_from_first_item_that_has_one() {
        let mut items = priced(&[dec!(1), dec!(1)]);
        items[0].location = None;
        items[1].location = Some("leo.brave.com".to_string());

        let order = NewOrder::for_items(DEFAULT_MERCHANT_ID, "USD", &[], &items, OrderStatus::Pending).unwrap();

        assert_eq!(order.location.as_deref(), Some("leo.brave.com"));
    }

    #[test]
    fn valid_for_comes_from_first_item_or_zero() {
        let mut items = priced(&[dec!(1)]);
        items[0].valid_for_secs = Some(86_400);
        let order = NewOrder::for_items(DEFAULT_MERCHANT_ID, "USD", &[], &items, OrderStatus::Pending).unwrap();
        assert_eq!(order.valid_for_secs, Some(86_400));

        items[0].valid_for_secs = None;
        let order = NewOrder::for_items(DEFAULT_MERCHANT_ID, "USD", &[], &items, OrderStatus::Pending).unwrap();
        assert_eq!(order.valid_for_secs, Some(0));
    }

    // ════════════════════════════════════════════════════════════════
    // Item pricing
    // ════════════════════════════════════════════════════════════════

    #[test]
    fn subtotal_is_price_times_quantity() {
        let mut req = item_req(dec!(9.99));
        req.quantity = 3;

        let item = new_order_item("USD", &req, Timestamp::now()).unwrap();

        assert_eq!(item.subtotal, dec!(29.97));
        assert_eq!(item.stripe_price_id(), Some("price_1"));
    }

    #[test]
    fn overflowing_subtotal_is_an_invalid_request() {
        let mut req = item_req(Decimal::MAX);
        req.quantity = 2;

        let result = new_order_item("USD", &req, Timestamp::now());

        assert!(matches!(result, Err(OrderError::InvalidOrderRequest(_))));
    }

    #[test]
    fn overflowing_total_is_an_invalid_request() {
        let items = priced(&[Decimal::MAX, Decimal::MAX]);

        let result = NewOrder::for_items(DEFAULT_MERCHANT_ID, "USD", &[], &items, OrderStatus::Pending);

        assert!(matches!(result, Err(OrderError::InvalidOrderRequest(_))));
    }

    #[test]
    fn tlv2_items_carry_issuer_config() {
        let item = new_order_item("USD", &item_req(dec!(9.99)), Timestamp::now()).unwrap();
        assert_eq!(item.issuer_config.map(|c| c.num_intervals()), Some(33));
        assert_eq!(num_intervals_for(&[item]), 33);
    }

    #[test]
    fn bad_iso_duration_is_an_invalid_request() {
        let mut req = item_req(dec!(1));
        req.credential_valid_duration = "one month".to_string();
        assert!(matches!(
            new_order_item("USD", &req, Timestamp::now()),
            Err(OrderError::InvalidOrderRequest(_))
        ));
    }

    #[test]
    fn single_leo_item_gets_192_per_interval() {
        let mut items = priced(&[dec!(14.99)]);
        items[0].sku = "brave-leo-premium".to_string();
        assert_eq!(num_per_interval_for(&items), 192);

        let vpn = priced(&[dec!(9.99)]);
        assert_eq!(num_per_interval_for(&vpn), 2);
    }
}
