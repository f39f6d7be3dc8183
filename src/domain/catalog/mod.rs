//! Mobile product catalog.
//!
//! App Store and Play Store purchases arrive with a store product id
//! (`braveleo.monthly`, `brave.vpn.yearly`, ...). The catalog maps those
//! ids to sku variants and turns a variant into the order-item template
//! a receipt-backed order is created from.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;
use crate::domain::order::{CheckoutUrls, CreateOrderRequest, CredentialType, OrderError, OrderItemRequest};

/// Deployment environment; selects hostnames and vendor networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
    #[default]
    Development,
    Local,
}

impl Environment {
    /// Domain suffix used for locations and account pages.
    pub fn domain(&self) -> &'static str {
        match self {
            Environment::Production => "brave.com",
            Environment::Staging => "bravesoftware.com",
            Environment::Development | Environment::Local => "brave.software",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Default checkout return pages for this environment.
    pub fn checkout_urls(&self) -> CheckoutUrls {
        CheckoutUrls {
            success_uri: format!("https://account.{}/account/?intent=provision", self.domain()),
            cancel_uri: format!("https://account.{}/plans/?intent=checkout", self.domain()),
            subscription_back_button_uri: None,
        }
    }
}

impl FromStr for Environment {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prod" | "production" => Ok(Environment::Production),
            "sandbox" | "staging" => Ok(Environment::Staging),
            "dev" | "development" => Ok(Environment::Development),
            "local" | "test" => Ok(Environment::Local),
            other => Err(ValidationError::invalid_format(
                "environment",
                format!("unknown environment '{}'", other),
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Development => "development",
            Environment::Local => "local",
        };
        f.write_str(s)
    }
}

/// Maps a store product id to a sku variant.
pub fn sku_variant_for_mobile_product(product_id: &str) -> Result<&'static str, OrderError> {
    let variant = match product_id {
        // Android and iOS Leo.
        "brave.leo.monthly" | "beta.leo.monthly" | "nightly.leo.monthly" => "brave-leo-premium",
        "braveleo.monthly" | "nightly.braveleo.monthly" => "brave-leo-premium",
        "brave.leo.yearly" | "beta.leo.yearly" | "nightly.leo.yearly" => "brave-leo-premium-year",
        "braveleo.yearly" | "nightly.braveleo.yearly" | "braveleo.yearly.2" | "braveleo2.yearly" => {
            "brave-leo-premium-year"
        }

        // VPN.
        "brave.vpn.monthly" | "beta.bravevpn.monthly" | "nightly.bravevpn.monthly" => "brave-vpn-premium",
        "bravevpn.monthly" => "brave-vpn-premium",
        "brave.vpn.yearly" | "beta.bravevpn.yearly" | "nightly.bravevpn.yearly" => "brave-vpn-premium-year",
        "bravevpn.yearly" => "brave-vpn-premium-year",

        // Origin.
        "brave.origin.monthly" | "beta.origin.monthly" | "nightly.origin.monthly" => "brave-origin-premium",
        "brave.origin.yearly" | "beta.origin.yearly" | "nightly.origin.yearly" => {
            "brave-origin-premium-year"
        }
        "braveorigin.monthly" | "beta.braveorigin.monthly" | "nightly.braveorigin.monthly" => {
            "brave-origin-premium"
        }
        "braveorigin.yearly" | "beta.braveorigin.yearly" | "nightly.braveorigin.yearly" => {
            "brave-origin-premium-year"
        }

        // Legacy ids older iOS clients still send.
        "brave-firewall-vpn-premium" => "brave-vpn-premium",
        "brave-firewall-vpn-premium-year" => "brave-vpn-premium-year",

        other => return Err(OrderError::invalid_mobile_product(other)),
    };
    Ok(variant)
}

struct Template {
    sku: &'static str,
    variant: &'static str,
    host: &'static str,
    description: &'static str,
    price: Decimal,
    buffer: i64,
    overlap: i64,
    each: &'static str,
}

fn template(variant: &str) -> Option<Template> {
    let t = match variant {
        "brave-leo-premium" => Template {
            sku: "brave-leo-premium",
            variant: "brave-leo-premium",
            host: "leo",
            description: "Premium access to Leo",
            price: Decimal::new(1499, 2),
            buffer: 3,
            overlap: 0,
            each: "P1D",
        },
        "brave-leo-premium-year" => Template {
            sku: "brave-leo-premium",
            variant: "brave-leo-premium-year",
            host: "leo",
            description: "Premium access to Leo Yearly",
            price: Decimal::new(14999, 2),
            buffer: 3,
            overlap: 0,
            each: "P1D",
        },
        "brave-vpn-premium" => Template {
            sku: "brave-vpn-premium",
            variant: "brave-vpn-premium",
            host: "vpn",
            description: "brave-vpn-premium",
            price: Decimal::new(999, 2),
            buffer: 31,
            overlap: 2,
            each: "P1D",
        },
        "brave-vpn-premium-year" => Template {
            sku: "brave-vpn-premium",
            variant: "brave-vpn-premium-year",
            host: "vpn",
            description: "brave-vpn-premium-year",
            price: Decimal::new(9999, 2),
            buffer: 31,
            overlap: 2,
            each: "P1D",
        },
        "brave-origin-premium" => Template {
            sku: "brave-origin-premium",
            variant: "brave-origin-premium",
            host: "origin",
            description: "Brave Origin Premium",
            price: Decimal::new(499, 2),
            buffer: 3,
            overlap: 0,
            each: "P1M",
        },
        "brave-origin-premium-year" => Template {
            sku: "brave-origin-premium",
            variant: "brave-origin-premium-year",
            host: "origin",
            description: "Brave Origin Premium Year",
            price: Decimal::new(4999, 2),
            buffer: 3,
            overlap: 0,
            each: "P1M",
        },
        _ => return None,
    };
    Some(t)
}

/// Item templates for receipt-backed orders in one environment.
#[derive(Debug, Clone, Copy)]
pub struct MobileCatalog {
    env: Environment,
}

impl MobileCatalog {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    /// Order-item request for a store product id.
    pub fn item_for_product(&self, product_id: &str) -> Result<OrderItemRequest, OrderError> {
        let variant = sku_variant_for_mobile_product(product_id)?;
        let t = template(variant).ok_or_else(|| OrderError::invalid_mobile_product(product_id))?;

        Ok(OrderItemRequest {
            sku: t.sku.to_string(),
            sku_variant: t.variant.to_string(),
            location: Some(format!("{}.{}", t.host, self.env.domain())),
            description: Some(t.description.to_string()),
            credential_type: CredentialType::TimeLimitedV2,
            credential_valid_duration: "P1M".to_string(),
            credential_valid_duration_each: Some(t.each.to_string()),
            issuance_interval: None,
            price: t.price,
            quantity: 1,
            stripe_metadata: None,
            radom_product_id: None,
            issuer_token_buffer: Some(t.buffer),
            issuer_token_overlap: Some(t.overlap),
        })
    }

    /// Full creation request for a receipt-backed order.
    pub fn order_request_for_product(&self, product_id: &str) -> Result<CreateOrderRequest, OrderError> {
        let item = self.item_for_product(product_id)?;
        Ok(CreateOrderRequest {
            email: None,
            customer_id: None,
            currency: "USD".to_string(),
            payment_methods: Vec::new(),
            items: vec![item],
            stripe_urls: Some(self.env.checkout_urls()),
            radom_urls: None,
            discounts: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn android_and_ios_ids_map_to_same_variant() {
        assert_eq!(sku_variant_for_mobile_product("brave.leo.monthly").unwrap(), "brave-leo-premium");
        assert_eq!(sku_variant_for_mobile_product("braveleo.monthly").unwrap(), "brave-leo-premium");
        assert_eq!(sku_variant_for_mobile_product("bravevpn.yearly").unwrap(), "brave-vpn-premium-year");
    }

    #[test]
    fn legacy_firewall_ids_map_to_vpn() {
        assert_eq!(
            sku_variant_for_mobile_product("brave-firewall-vpn-premium-year").unwrap(),
            "brave-vpn-premium-year"
        );
    }

    #[test]
    fn unknown_product_is_invalid_mobile_product() {
        assert_eq!(
            sku_variant_for_mobile_product("brave.talk.monthly"),
            Err(OrderError::invalid_mobile_product("brave.talk.monthly"))
        );
    }

    #[test]
    fn location_follows_environment() {
        let prod = MobileCatalog::new(Environment::Production).item_for_product("brave.vpn.monthly").unwrap();
        let staging = MobileCatalog::new(Environment::Staging).item_for_product("brave.vpn.monthly").unwrap();
        assert_eq!(prod.location.as_deref(), Some("vpn.brave.com"));
        assert_eq!(staging.location.as_deref(), Some("vpn.bravesoftware.com"));
    }

    #[test]
    fn vpn_template_uses_vpn_issuer_window() {
        let item = MobileCatalog::new(Environment::Production).item_for_product("bravevpn.monthly").unwrap();
        assert_eq!(item.price, Decimal::new(999, 2));
        assert_eq!(item.issuer_token_buffer, Some(31));
        assert_eq!(item.issuer_token_overlap, Some(2));
        assert_eq!(item.credential_type, CredentialType::TimeLimitedV2);
    }

    #[test]
    fn order_request_is_single_item_usd() {
        let req = MobileCatalog::new(Environment::Local).order_request_for_product("braveleo.yearly").unwrap();
        assert_eq!(req.currency, "USD");
        assert_eq!(req.items.len(), 1);
        assert_eq!(req.items[0].sku_variant, "brave-leo-premium-year");
    }

    #[test]
    fn environment_parses_aliases() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("sandbox".parse::<Environment>().unwrap(), Environment::Staging);
        assert!("qa".parse::<Environment>().is_err());
    }
}
