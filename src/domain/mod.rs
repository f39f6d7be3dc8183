//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, errors, state machine trait)
//! - `vendor` - Payment vendors and vendor call errors
//! - `order` - Orders, items, metadata and the order lifecycle
//! - `catalog` - Mobile store products and deployment environments
//! - `reconciliation` - Vendor notifications mapped to order intents
//! - `issuance` - Credential quota and duplicate-batch rules

pub mod catalog;
pub mod foundation;
pub mod issuance;
pub mod order;
pub mod reconciliation;
pub mod vendor;
