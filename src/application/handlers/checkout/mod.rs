//! Checkout handlers - Vendor checkout sessions for pending orders.
//!
//! ## Commands
//! - `UpdateOrderStripeSessionHandler` - Replace an expired Stripe session
//! - `UpdateOrderRadomSessionHandler` - Settle or replace a Radom session

mod radom_session;
mod stripe_session;

pub use radom_session::{radom_checkout_request, RADOM_SESSION_TTL_HOURS};
pub use stripe_session::{
    checkout_request, create_stripe_session, resolve_customer, with_order_id, StripeCustomer,
    StripeSessionParams, STRIPE_ORDER_ID_KEY,
};

// Commands
pub use radom_session::{
    UpdateOrderRadomSessionCommand, UpdateOrderRadomSessionHandler, UpdateOrderRadomSessionResult,
};
pub use stripe_session::{
    UpdateOrderStripeSessionCommand, UpdateOrderStripeSessionHandler, UpdateOrderStripeSessionResult,
};
