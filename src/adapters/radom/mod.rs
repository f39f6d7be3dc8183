//! Radom crypto-payment gateway adapter.

mod auth;
mod client;
mod mock;

pub use auth::{RadomAuthError, RadomAuthenticator, RADOM_VERIFICATION_HEADER};
pub use client::{HttpRadomClient, RadomConfig};
pub use mock::MockRadomClient;
