//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Following CQRS, it separates command handlers (write) from query handlers (read).

pub mod handlers;

pub use handlers::{
    // Order handlers
    CancelOrderHandler, CreateOrderHandler, GetOrderHandler, SetOrderTrialDaysHandler,
    // Receipt handlers
    CheckOrderReceiptHandler, CreateOrderFromReceiptHandler, SubmitReceiptHandler,
    // Reconciliation handlers
    HandleAppStoreNotificationHandler, HandlePlayStoreNotificationHandler,
    HandleRadomNotificationHandler, HandleStripeWebhookHandler,
    // Issuance handlers
    ApproveTlv2BatchHandler, CheckBlindedCredsHandler, UniqBatchesHandler,
    // Checkout handlers
    UpdateOrderRadomSessionHandler, UpdateOrderStripeSessionHandler,
};
