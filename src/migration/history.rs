//! History store: the persisted record of which versions are applied

use crate::migration::{ApplicationRecord, HistoryTable, MigrationError};
use crate::TideExecutor;
use std::collections::HashMap;

/// Applied history keyed by version
///
/// A version missing from the map is not applied; a version present with a
/// different checksum than its file has been tampered with.
pub type AppliedHistory = HashMap<i64, ApplicationRecord>;

/// Persistence boundary over the history table
pub trait HistoryStore {
    /// Create the history table if it does not exist. Safe to call on every run.
    fn ensure_schema(&self) -> Result<(), MigrationError>;

    /// Whether the history table exists. Never creates it.
    fn history_exists(&self) -> Result<bool, MigrationError>;

    /// All rows currently in the table, keyed by version.
    fn load_applied(&self) -> Result<AppliedHistory, MigrationError>;

    /// Insert one row.
    ///
    /// Fails with `MigrationError::HistoryConflict` if the version is already present.
    fn record_applied(&self, record: &ApplicationRecord) -> Result<(), MigrationError>;

    /// Delete the row for `version`; `name` only labels the error.
    ///
    /// Fails with `MigrationError::HistoryMissing` if there was no such row.
    fn record_rolled_back(&self, version: i64, name: &str) -> Result<(), MigrationError>;

    /// Row with the highest version, or `None` when the table is empty.
    fn last_applied(&self) -> Result<Option<ApplicationRecord>, MigrationError>;
}

/// `HistoryStore` backed by a PostgreSQL table
///
/// Works over any executor, so the same store is used on the plain connection
/// and inside the transaction that runs a migration script.
pub struct PgHistoryStore<'a> {
    executor: &'a dyn TideExecutor,
    table: &'a HistoryTable,
}

impl<'a> PgHistoryStore<'a> {
    pub fn new(executor: &'a dyn TideExecutor, table: &'a HistoryTable) -> Self {
        Self { executor, table }
    }
}

impl HistoryStore for PgHistoryStore<'_> {
    fn ensure_schema(&self) -> Result<(), MigrationError> {
        self.executor.batch_execute(&self.table.create_sql())?;
        Ok(())
    }

    fn history_exists(&self) -> Result<bool, MigrationError> {
        let rows = self
            .executor
            .query_all("SELECT to_regclass($1) IS NOT NULL", &[&self.table.as_str()])?;
        Ok(rows.first().is_some_and(|row| row.get(0)))
    }

    fn load_applied(&self) -> Result<AppliedHistory, MigrationError> {
        let sql = format!(
            "SELECT version, name, checksum, applied_at FROM {}",
            self.table
        );

        let rows = self.executor.query_all(&sql, &[])?;

        let mut applied = AppliedHistory::with_capacity(rows.len());
        for row in &rows {
            let record = ApplicationRecord::from_row(row)?;
            applied.insert(record.version, record);
        }
        Ok(applied)
    }

    fn record_applied(&self, record: &ApplicationRecord) -> Result<(), MigrationError> {
        let sql = format!(
            "INSERT INTO {} (version, name, checksum, applied_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (version) DO NOTHING",
            self.table
        );

        let applied_at = record.applied_at.naive_utc();
        let inserted = self.executor.execute(
            &sql,
            &[&record.version, &record.name, &record.checksum, &applied_at],
        )?;

        if inserted == 0 {
            return Err(MigrationError::HistoryConflict {
                version: record.version,
                name: record.name.clone(),
            });
        }
        Ok(())
    }

    fn record_rolled_back(&self, version: i64, name: &str) -> Result<(), MigrationError> {
        let sql = format!("DELETE FROM {} WHERE version = $1", self.table);

        let deleted = self.executor.execute(&sql, &[&version])?;
        if deleted == 0 {
            return Err(MigrationError::HistoryMissing {
                version,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn last_applied(&self) -> Result<Option<ApplicationRecord>, MigrationError> {
        let sql = format!(
            "SELECT version, name, checksum, applied_at FROM {} ORDER BY version DESC LIMIT 1",
            self.table
        );

        let rows = self.executor.query_all(&sql, &[])?;
        match rows.first() {
            Some(row) => Ok(Some(ApplicationRecord::from_row(row)?)),
            None => Ok(None),
        }
    }
}
