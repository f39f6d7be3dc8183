//! Receipt handlers - Synchronous App Store and Play Store purchases.
//!
//! ## Commands
//! - Submitting a receipt (create or renew)
//! - Strict order creation from a receipt
//!
//! ## Queries
//! - Which order owns a receipt

mod check_order_receipt;
mod create_order_from_receipt;
mod mobile_order;
mod submit_receipt;

// Commands
pub use create_order_from_receipt::{
    CreateOrderFromReceiptCommand, CreateOrderFromReceiptHandler, CreateOrderFromReceiptResult,
};
pub use submit_receipt::{ReceiptOutcome, SubmitReceiptCommand, SubmitReceiptHandler, SubmitReceiptResult};

// Queries
pub use check_order_receipt::{CheckOrderReceiptHandler, CheckOrderReceiptQuery};
