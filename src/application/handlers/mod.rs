//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations. Every
//! handler runs its reads and writes through one `UnitOfWork` transaction
//! and keeps vendor calls outside it.

pub mod checkout;
pub mod issuance;
pub mod order;
pub mod receipt;
pub mod reconciliation;

pub use checkout::{UpdateOrderRadomSessionHandler, UpdateOrderStripeSessionHandler};
pub use issuance::{ApproveTlv2BatchHandler, CheckBlindedCredsHandler, UniqBatchesHandler};
pub use order::{CancelOrderHandler, CreateOrderHandler, GetOrderHandler, SetOrderTrialDaysHandler};
pub use receipt::{CheckOrderReceiptHandler, CreateOrderFromReceiptHandler, SubmitReceiptHandler};
pub use reconciliation::{
    HandleAppStoreNotificationHandler, HandlePlayStoreNotificationHandler,
    HandleRadomNotificationHandler, HandleStripeWebhookHandler,
};
