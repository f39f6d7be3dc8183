//! Radom checkout sessions bound to an order.

use std::sync::Arc;

use serde_json::json;

use crate::application::handlers::order::lifecycle::load_order;
use crate::application::handlers::reconciliation::apply_intent;
use crate::domain::catalog::Environment;
use crate::domain::foundation::{OrderId, Timestamp};
use crate::domain::order::{keys, CheckoutUrls, MetadataValue, Order, OrderError};
use crate::domain::reconciliation::radom::{RadomKeyValue, BRAVE_ORDER_ID_KEY};
use crate::domain::reconciliation::{Applied, OrderLocator};
use crate::domain::vendor::Vendor;
use crate::ports::{in_transaction, RadomCheckoutRequest, RadomClient, RadomGateway, RadomLineItem, UnitOfWork};

/// How long a Radom checkout session stays open.
pub const RADOM_SESSION_TTL_HOURS: i64 = 24;

/// Session parameters for `order`.
pub fn radom_checkout_request(
    order: &Order,
    urls: &CheckoutUrls,
    env: Environment,
    now: Timestamp,
) -> Result<RadomCheckoutRequest, OrderError> {
    if order.items.is_empty() {
        return Err(OrderError::InvalidOrderNoItems);
    }

    let line_items = order
        .items
        .iter()
        .map(|item| {
            item.radom_product_id()
                .map(|id| RadomLineItem { product_id: id.to_string() })
                .ok_or(OrderError::RadomProductIdNotFound)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RadomCheckoutRequest {
        success_url: urls.success_uri.clone(),
        cancel_url: urls.cancel_uri.clone(),
        subscription_back_button_url: urls.subscription_back_button_uri.clone(),
        currency: order.currency.clone(),
        expires_at: now.plus_hours(RADOM_SESSION_TTL_HOURS).as_unix_secs(),
        line_items,
        metadata: vec![RadomKeyValue {
            key: BRAVE_ORDER_ID_KEY.to_string(),
            value: order.id.to_string(),
        }],
        customizations: Some(json!({
            "leftPanelColor": "linear-gradient(125deg, rgba(0,0,128,1) 0%, RGBA(196,22,196,1) 100%)",
            "primaryButtonColor": "#000000",
            "slantedEdge": true,
        })),
        total: order.total_price,
        gateway: RadomGateway::for_environment(env),
    })
}

// ════════════════════════════════════════════════════════════════════════════
// UpdateOrderRadomSession
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct UpdateOrderRadomSessionCommand {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOrderRadomSessionResult {
    /// Paid, sessionless, or the session is still open.
    Unchanged,
    Recreated { session_id: String, url: String },
    /// The session completed; the order was renewed from its subscription.
    Renewed(Applied),
}

/// Brings a pending Radom order in line with its checkout session.
pub struct UpdateOrderRadomSessionHandler {
    uow: Arc<dyn UnitOfWork>,
    radom: Arc<dyn RadomClient>,
    env: Environment,
}

impl UpdateOrderRadomSessionHandler {
    pub fn new(uow: Arc<dyn UnitOfWork>, radom: Arc<dyn RadomClient>, env: Environment) -> Self {
        Self { uow, radom, env }
    }

    pub async fn handle(
        &self,
        cmd: UpdateOrderRadomSessionCommand,
    ) -> Result<UpdateOrderRadomSessionResult, OrderError> {
        let order_id = cmd.order_id;
        let now = Timestamp::now();

        // 1. Load
        let order = in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move { load_order(repos, order_id).await })
        })
        .await?;

        if order.is_paid(now) {
            return Ok(UpdateOrderRadomSessionResult::Unchanged);
        }
        let Some(session_id) = order.metadata.radom_checkout_session_id.clone() else {
            return Ok(UpdateOrderRadomSessionResult::Unchanged);
        };

        // 2. Ask Radom where the session stands
        let session = self.radom.get_checkout_session(&session_id).await?;

        if session.is_success() {
            // 3a. Paid: renew from the subscription it created
            let subscription = self.radom.get_subscription(session.subscription_id()?).await?;
            if !subscription.is_active() {
                return Err(OrderError::RadomSubNotActive(subscription.status));
            }
            let intent = subscription.renewal(OrderLocator::Id(order_id), now)?;

            let applied = in_transaction(self.uow.as_ref(), move |repos| {
                Box::pin(async move { apply_intent(repos, Vendor::Radom, &intent).await })
            })
            .await?;
            return Ok(UpdateOrderRadomSessionResult::Renewed(applied));
        }

        if !session.is_expired() {
            return Ok(UpdateOrderRadomSessionResult::Unchanged);
        }

        // 3b. Expired: open a new one
        let request = radom_checkout_request(&order, &self.env.checkout_urls(), self.env, now)?;
        let created = self.radom.create_checkout_session(request).await?;

        let new_id = created.checkout_session_id.clone();
        in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move {
                repos
                    .orders()
                    .append_metadata(order_id, keys::RADOM_CHECKOUT_SESSION_ID, MetadataValue::from(new_id))
                    .await?;
                Ok::<_, OrderError>(())
            })
        })
        .await?;

        tracing::info!(
            order_id = %order_id,
            old_session_id = %session_id,
            session_id = %created.checkout_session_id,
            "radom checkout session recreated"
        );
        Ok(UpdateOrderRadomSessionResult::Recreated {
            session_id: created.checkout_session_id,
            url: created.checkout_session_url,
        })
    }
}
