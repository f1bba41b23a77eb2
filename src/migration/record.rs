//! `ApplicationRecord` - one row of the migration history table

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// Represents a migration record in the history table
///
/// Created when a migration is applied and deleted when it is rolled back;
/// never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationRecord {
    /// Migration version (primary key)
    pub version: i64,

    /// Migration name at the time it was applied
    pub name: String,

    /// `SHA-256` checksum of the migration file at the time it was applied
    pub checksum: String,

    /// When the migration was applied
    pub applied_at: DateTime<Utc>,
}

impl ApplicationRecord {
    /// Create a new `ApplicationRecord`
    #[must_use]
    pub fn new(version: i64, name: String, checksum: String, applied_at: DateTime<Utc>) -> Self {
        Self {
            version,
            name,
            checksum,
            applied_at,
        }
    }

    /// Create an `ApplicationRecord` from a database row
    ///
    /// Expected column order: `version`, `name`, `checksum`, `applied_at`.
    /// `applied_at` is a `TIMESTAMP` column holding UTC wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns `TideError` if a column is missing or has an unexpected type.
    pub fn from_row(row: &may_postgres::Row) -> Result<Self, crate::TideError> {
        let version: i64 = row.try_get(0)?;
        let name: String = row.try_get(1)?;
        let checksum: String = row.try_get(2)?;
        let applied_at: NaiveDateTime = row.try_get(3)?;

        Ok(Self {
            version,
            name,
            checksum,
            applied_at: applied_at.and_utc(),
        })
    }

    /// `{version}_{name}` label used in log lines and CLI output
    pub fn label(&self) -> String {
        format!("{}_{}", self.version, self.name)
    }
}
