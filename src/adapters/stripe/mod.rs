//! Stripe adapter.
//!
//! - `HttpStripeClient` implements the `StripeClient` port
//! - `StripeWebhookVerifier` authenticates `Stripe-Signature` and parses events
//! - `MockStripeClient` is the in-process double used by tests
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 with constant-time comparison
//! - Timestamps are validated to prevent replay attacks (5-minute window)
//! - All secrets are handled via `secrecy::SecretString`

mod client;
mod mock;
mod webhook;

pub use client::{HttpStripeClient, StripeConfig};
pub use mock::{MethodCall, MockStripeClient};
pub use webhook::{SignatureHeader, SignatureParseError, StripeWebhookVerifier, STRIPE_SIGNATURE_HEADER};

#[cfg(test)]
pub(crate) use webhook::sign_for_test;
