//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `UnitOfWork` - Opens a transaction and hands out its repositories
//! - `OrderRepository`, `OrderItemRepository`, `PayHistoryRepository`, `Tlv2Repository`
//!
//! ## Vendor Ports
//!
//! - `StripeClient` - Checkout sessions, customers, subscriptions
//! - `RadomClient` - Crypto checkout sessions and subscriptions
//! - `PlayStoreClient` - Play Developer API purchase lookups
//! - `ReceiptVerifier` - App Store and Play Store receipt validation
//! - `AppStoreNotificationDecoder` - Signed App Store notification decoding

mod mobile;
mod order_repository;
mod radom_client;
mod stripe_client;
mod unit_of_work;

pub use mobile::{
    AppStoreNotificationDecoder, PlayStoreClient, ReceiptRequest, ReceiptVerifier, VerifiedReceipt,
};
pub use order_repository::{OrderItemRepository, OrderRepository, PayHistoryRepository, Tlv2Repository};
pub use radom_client::{
    RadomCheckoutRequest, RadomClient, RadomGateway, RadomLineItem, RadomManagedGateway,
    RadomPaymentMethod, RadomSessionCreated,
};
pub use stripe_client::{
    CheckoutLineItem, CheckoutSessionRequest, StripeCheckoutSession, StripeClient, StripeSubscription,
    STRIPE_RESOURCE_MISSING,
};
pub use unit_of_work::{in_transaction, RepositorySet, TransactionScope, UnitOfWork};
