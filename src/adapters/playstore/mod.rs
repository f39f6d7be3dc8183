//! Google Play adapter: developer API, receipt validation, push
//! authentication and Pub/Sub decoding.

mod auth;
mod client;
mod mock;
mod pubsub;
mod receipt;

pub use auth::{PlayAuthConfig, PlayAuthError, PlayStoreNotificationAuthenticator, GOOGLE_CERTS_URL, GOOGLE_ISSUERS};
pub use client::{HttpPlayStoreClient, PlayStoreConfig};
pub use mock::MockPlayStoreClient;
pub use pubsub::{PubSubEnvelope, PubSubMessage};
pub use receipt::PlayStoreReceiptVerifier;

#[cfg(test)]
pub(crate) use auth::test_tokens;
