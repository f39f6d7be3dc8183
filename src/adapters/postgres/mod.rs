//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PgUnitOfWork` - Opens transactions whose `PgTransaction` implements
//!   every order repository port
//! - `run_migrations` - Applies the schema in `migrations/`

mod order_store;

pub use order_store::{run_migrations, PgTransaction, PgUnitOfWork};
