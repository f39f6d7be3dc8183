//! Apple App Store adapter: signed notifications and receipt validation.

mod notification;
mod receipt;

pub use notification::{DisabledNotificationDecoder, JwsNotificationDecoder};
pub use receipt::{AppStoreReceiptVerifier, APP_STORE_PRODUCTION_URL, APP_STORE_SANDBOX_URL};

#[cfg(test)]
pub(crate) use notification::test_keys;
