//! Order handlers.
//!
//! ## Commands
//! - Creating orders and opening their checkout session
//! - Canceling orders, propagating to Stripe
//! - Changing trial length
//!
//! ## Queries
//! - Get an order with its items

mod cancel_order;
mod create_order;
mod get_order;
pub(crate) mod lifecycle;
mod set_trial_days;

// Commands
pub use cancel_order::{CancelOrderCommand, CancelOrderHandler, CancelOrderResult};
pub use create_order::{CreateOrderCommand, CreateOrderHandler, CreateOrderResult};
pub use set_trial_days::{SetOrderTrialDaysCommand, SetOrderTrialDaysHandler, SetOrderTrialDaysResult};

// Queries
pub use get_order::{GetOrderHandler, GetOrderQuery};
