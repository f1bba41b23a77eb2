//! # Tidemark
//!
//! Checksummed, file-based PostgreSQL schema migrations on the `may` runtime.
//!
//! Migrations are plain `.sql` files with `-- +up` / `-- +down` sections. Tidemark
//! applies them in version order, records each one with a SHA-256 fingerprint, and
//! refuses to move the schema while any applied file has been edited. See
//! [`migration`] for the engine and the `tidemark-migrate` crate for the CLI.

pub mod config;
pub mod connection;
pub mod executor;
pub mod migration;
pub mod transaction;

#[cfg(feature = "tracing")]
mod tracing_helpers;

pub use config::{ConfigOverrides, MigrateConfig};
pub use connection::{connect, ConnectionError};
pub use executor::{MayPostgresExecutor, TideError, TideExecutor};
pub use transaction::{Transaction, TransactionError};
