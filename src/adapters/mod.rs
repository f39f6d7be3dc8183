//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `postgres` - Unit of work and order repositories over sqlx
//! - `memory` - In-process unit of work for tests and local runs
//! - `stripe`, `radom` - Payment vendor APIs and webhook authentication
//! - `appstore`, `playstore` - Mobile store APIs and notification decoding
//! - `receipt` - Receipt verification dispatch per mobile vendor
//! - `http` - Webhook ingress router

pub mod appstore;
pub mod http;
pub mod memory;
pub mod playstore;
pub mod postgres;
pub mod radom;
pub mod receipt;
pub mod stripe;

pub use memory::InMemoryStore;
pub use postgres::PgUnitOfWork;
