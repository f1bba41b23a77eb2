//! Span constructors shared by the executor, transactions and the migrator.
//!
//! `tracing` is built with its `log` feature, so these spans show up through
//! `env_logger` when no `tracing` subscriber is installed.

use tracing::{info_span, Span};

/// Longest statement prefix recorded on a query span.
const STATEMENT_PREVIEW_LEN: usize = 120;

/// Span for a single statement or script sent to the server.
pub fn execute_query_span(query: &str) -> Span {
    info_span!("tidemark.execute_query", db.statement = %statement_preview(query))
}

pub fn begin_transaction_span() -> Span {
    info_span!("tidemark.begin_transaction")
}

pub fn commit_transaction_span() -> Span {
    info_span!("tidemark.commit_transaction")
}

pub fn rollback_transaction_span() -> Span {
    info_span!("tidemark.rollback_transaction")
}

/// Span covering one forward migration: script plus history insert.
pub fn apply_migration_span(version: i64, name: &str) -> Span {
    info_span!("migration.apply", version, name)
}

/// Span covering one rollback: reverse script plus history delete.
pub fn revert_migration_span(version: i64, name: &str) -> Span {
    info_span!("migration.revert", version, name)
}

fn statement_preview(query: &str) -> &str {
    let trimmed = query.trim();
    match trimmed.char_indices().nth(STATEMENT_PREVIEW_LEN) {
        Some((idx, _)) => &trimmed[..idx],
        None => trimmed,
    }
}
