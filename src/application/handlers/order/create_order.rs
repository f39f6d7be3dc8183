//! CreateOrderHandler - Command handler for premium order creation.

use std::sync::Arc;

use crate::application::handlers::checkout::{
    create_stripe_session, radom_checkout_request, resolve_customer, with_order_id, StripeSessionParams,
};
use crate::domain::catalog::Environment;
use crate::domain::foundation::Timestamp;
use crate::domain::order::{
    keys, new_order_items, num_intervals_for, num_per_interval_for, CreateOrderRequest, MetadataValue, NewOrder,
    Order, OrderError, OrderStatus, DEFAULT_MERCHANT_ID,
};
use crate::ports::{in_transaction, RadomClient, StripeClient, UnitOfWork};

/// Command to create an order from a priced request.
#[derive(Debug, Clone)]
pub struct CreateOrderCommand {
    pub request: CreateOrderRequest,
}

#[derive(Debug, Clone)]
pub struct CreateOrderResult {
    pub order: Order,
    /// Where to send the buyer; absent for free orders.
    pub checkout_url: Option<String>,
}

/// Creates the order and its items, then opens a checkout session with the
/// first payment method the order accepts.
pub struct CreateOrderHandler {
    uow: Arc<dyn UnitOfWork>,
    stripe: Arc<dyn StripeClient>,
    radom: Arc<dyn RadomClient>,
    env: Environment,
}

impl CreateOrderHandler {
    pub fn new(
        uow: Arc<dyn UnitOfWork>,
        stripe: Arc<dyn StripeClient>,
        radom: Arc<dyn RadomClient>,
        env: Environment,
    ) -> Self {
        Self { uow, stripe, radom, env }
    }

    pub async fn handle(&self, cmd: CreateOrderCommand) -> Result<CreateOrderResult, OrderError> {
        let req = cmd.request;
        let now = Timestamp::now();

        // 1. Price the items; an empty list fails in `for_items`
        let items = new_order_items(&req, now)?;
        let new_order = NewOrder::for_items(
            DEFAULT_MERCHANT_ID,
            &req.currency,
            &req.payment_methods,
            &items,
            OrderStatus::Pending,
        )?;
        let num_intervals = num_intervals_for(&items);
        let num_per_interval = num_per_interval_for(&items);

        // 2. Persist the order with its issuance metadata
        let mut order = in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move {
                let mut order = repos.orders().create(&new_order, &items).await?;
                if num_intervals > 0 {
                    repos
                        .orders()
                        .append_metadata(order.id, keys::NUM_INTERVALS, MetadataValue::Int(num_intervals))
                        .await?;
                    order.metadata.set(keys::NUM_INTERVALS, MetadataValue::Int(num_intervals));
                }
                repos
                    .orders()
                    .append_metadata(order.id, keys::NUM_PER_INTERVAL, MetadataValue::Int(num_per_interval))
                    .await?;
                order.metadata.set(keys::NUM_PER_INTERVAL, MetadataValue::Int(num_per_interval));
                Ok::<_, OrderError>(order)
            })
        })
        .await?;

        tracing::info!(
            order_id = %order.id,
            status = %order.status,
            total_price = %order.total_price,
            "order created"
        );

        if order.is_paid(now) {
            return Ok(CreateOrderResult { order, checkout_url: None });
        }

        // 3. Open a checkout session
        let Some((key, session_id, url)) = self.open_session(&order, &req, now).await? else {
            return Ok(CreateOrderResult { order, checkout_url: None });
        };

        // 4. Record it
        let order_id = order.id;
        let stored_id = session_id.clone();
        in_transaction(self.uow.as_ref(), move |repos| {
            Box::pin(async move {
                repos.orders().append_metadata(order_id, key, MetadataValue::from(stored_id)).await?;
                Ok::<_, OrderError>(())
            })
        })
        .await?;
        order.metadata.set(key, MetadataValue::from(session_id));

        Ok(CreateOrderResult { order, checkout_url: url })
    }

    /// Returns the metadata key, session id and checkout url of the new session.
    async fn open_session(
        &self,
        order: &Order,
        req: &CreateOrderRequest,
        now: Timestamp,
    ) -> Result<Option<(&'static str, String, Option<String>)>, OrderError> {
        if order.is_stripe_payable() {
            let urls = req
                .stripe_urls
                .as_ref()
                .ok_or_else(|| OrderError::invalid_order_request("stripe checkout requires success and cancel urls"))?;
            let customer = resolve_customer(self.stripe.as_ref(), req.customer_id.as_deref(), req.email.as_deref()).await;

            let params = StripeSessionParams {
                customer,
                success_url: with_order_id(&urls.success_uri, order.id)?,
                cancel_url: with_order_id(&urls.cancel_uri, order.id)?,
                trial_days: order.trial_days(),
                discounts: req.discounts.clone(),
            };
            let session = create_stripe_session(self.stripe.as_ref(), order, params).await?;
            return Ok(Some((keys::STRIPE_CHECKOUT_SESSION_ID, session.id, session.url)));
        }

        if order.is_radom_payable() {
            let urls = req.radom_urls.clone().unwrap_or_else(|| self.env.checkout_urls());
            let request = radom_checkout_request(order, &urls, self.env, now)?;
            let created = self.radom.create_checkout_session(request).await.map_err(|e| {
                tracing::error!(order_id = %order.id, error = %e, "failed to create radom checkout session");
                OrderError::from(e)
            })?;
            return Ok(Some((
                keys::RADOM_CHECKOUT_SESSION_ID,
                created.checkout_session_id,
                Some(created.checkout_session_url),
            )));
        }

        Ok(None)
    }
}
