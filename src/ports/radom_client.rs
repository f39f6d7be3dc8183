//! Radom API port.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::catalog::Environment;
use crate::domain::reconciliation::radom::{RadomCheckoutSession, RadomKeyValue, RadomSubscription};
use crate::domain::vendor::VendorError;

#[async_trait]
pub trait RadomClient: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: RadomCheckoutRequest,
    ) -> Result<RadomSessionCreated, VendorError>;

    async fn get_checkout_session(&self, session_id: &str) -> Result<RadomCheckoutSession, VendorError>;

    async fn get_subscription(&self, subscription_id: &str) -> Result<RadomSubscription, VendorError>;

    fn is_not_found(&self, err: &VendorError) -> bool {
        err.http_status == Some(404)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadomCheckoutRequest {
    pub success_url: String,
    pub cancel_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_back_button_url: Option<String>,
    pub currency: String,
    /// Unix seconds.
    pub expires_at: i64,
    pub line_items: Vec<RadomLineItem>,
    pub metadata: Vec<RadomKeyValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customizations: Option<serde_json::Value>,
    pub total: Decimal,
    pub gateway: RadomGateway,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadomLineItem {
    pub product_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RadomGateway {
    pub managed: RadomManagedGateway,
}

impl RadomGateway {
    /// Networks and tokens Radom accepts in `env`.
    pub fn for_environment(env: Environment) -> Self {
        let methods: &[(&str, &str)] = if env.is_production() {
            &[
                ("Polygon", "0x3cef98bb43d732e2f285ee605a8158cde967d219"),
                ("Ethereum", "0x0d8775f648430679a709e98d2b0cb6250d2887ef"),
            ]
        } else {
            &[
                ("SepoliaTestnet", "0x5D684d37922dAf7Aa2013E65A22880a11C475e25"),
                ("PolygonTestnet", "0xd445cAAbb9eA6685D3A512439256866563a16E93"),
            ]
        };

        Self {
            managed: RadomManagedGateway {
                methods: methods
                    .iter()
                    .map(|(network, token)| RadomPaymentMethod {
                        network: network.to_string(),
                        token: token.to_string(),
                    })
                    .collect(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RadomManagedGateway {
    pub methods: Vec<RadomPaymentMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RadomPaymentMethod {
    pub network: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadomSessionCreated {
    pub checkout_session_id: String,
    #[serde(default)]
    pub checkout_session_url: String,
}
