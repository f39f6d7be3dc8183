//! Reconciliation domain.
//!
//! Each vendor's notification format is parsed into a
//! [`ReconciliationIntent`]. Applying an intent is vendor-agnostic and lives
//! in the reconciliation handlers.

pub mod app_store;
pub mod play_store;
pub mod radom;
pub mod stripe;

mod intent;

pub use intent::{Applied, Cancellation, OrderLocator, PaymentFailure, ReconciliationIntent, Renewal};
