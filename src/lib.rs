//! SKUs - Orders and subscriptions for credential-backed products.
//!
//! This crate owns the order lifecycle for SKU purchases: creating orders
//! and their vendor checkout sessions, reconciling Stripe, Radom, App Store
//! and Play Store notifications into renewals and cancellations, and
//! guarding how many credentials an order may have signed.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
