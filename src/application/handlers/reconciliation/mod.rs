//! Reconciliation handlers.
//!
//! One command handler per vendor notification channel. Each parses its
//! vendor's payload into a `ReconciliationIntent`, performs any vendor
//! lookups outside the transaction, then applies the intent through
//! [`apply_intent`] in a single transaction.
//!
//! ## Commands
//! - Stripe webhook events
//! - App Store Server Notifications v2
//! - Google Play real-time developer notifications
//! - Radom webhooks

mod app_store_notification;
mod apply_intent;
mod play_store_notification;
mod radom_notification;
mod stripe_webhook;

pub use apply_intent::{apply_intent, ReconciliationOutcome};

// Commands
pub use app_store_notification::{
    HandleAppStoreNotificationCommand, HandleAppStoreNotificationHandler, HandleAppStoreNotificationResult,
};
pub use play_store_notification::{
    HandlePlayStoreNotificationCommand, HandlePlayStoreNotificationHandler, HandlePlayStoreNotificationResult,
};
pub use radom_notification::{
    HandleRadomNotificationCommand, HandleRadomNotificationHandler, HandleRadomNotificationResult,
};
pub use stripe_webhook::{HandleStripeWebhookCommand, HandleStripeWebhookHandler, HandleStripeWebhookResult};
