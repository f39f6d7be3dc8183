//! Order domain - orders, items, typed metadata and the lifecycle state machine.
//!
//! Orders move `pending → paid → canceled`. `paid` is revisited on every
//! renewal; only the entitlement window (`expires_at`, `last_paid_at`)
//! advances. `canceled` is terminal for reconciliation.

mod aggregate;
mod errors;
mod item;
mod metadata;
mod new_order;
mod status;

pub use aggregate::{Order, RADOM_PAYMENT_METHOD, STRIPE_PAYMENT_METHOD};
pub use errors::{ErrorKind, OrderError};
pub use item::{
    CredentialType, IsoDuration, IssuerConfig, OrderItem, RADOM_PRODUCT_ID_KEY, STRIPE_ITEM_ID_KEY,
    STRIPE_PRODUCT_ID_KEY,
};
pub use metadata::{keys, subscription_id_key, MetadataValue, OrderMetadata};
pub use new_order::{
    new_order_item, new_order_items, num_intervals_for, num_per_interval_for, CheckoutUrls,
    CreateOrderRequest, ItemStripeMetadata, NewOrder, OrderItemRequest, DEFAULT_MERCHANT_ID,
};
pub use status::OrderStatus;

#[cfg(test)]
pub(crate) use aggregate::test_support;
