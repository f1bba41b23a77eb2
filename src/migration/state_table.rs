//! Migration history table naming and DDL

use crate::migration::MigrationError;
use regex::Regex;
use std::fmt;

/// Default name of the history table
pub const DEFAULT_HISTORY_TABLE: &str = "schema_migrations";

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$";

/// A validated history table name, optionally schema-qualified
///
/// The name is interpolated into SQL text, so only plain identifiers are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTable(String);

impl HistoryTable {
    /// Validate and wrap a table name
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Configuration` if `name` is not `table` or `schema.table`
    /// made of ASCII letters, digits and underscores.
    pub fn new(name: impl Into<String>) -> Result<Self, MigrationError> {
        let name = name.into();
        let re = Regex::new(IDENTIFIER_PATTERN)
            .map_err(|e| MigrationError::Configuration(format!("invalid identifier pattern: {e}")))?;

        if !re.is_match(&name) {
            return Err(MigrationError::Configuration(format!(
                "history table name '{name}' must be an identifier like 'schema_migrations' or 'ops.schema_migrations'"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for the history table
    pub fn create_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version BIGINT PRIMARY KEY,
                name TEXT NOT NULL,
                checksum TEXT NOT NULL,
                applied_at TIMESTAMP NOT NULL
            )",
            self.0
        )
    }
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self(DEFAULT_HISTORY_TABLE.to_string())
    }
}

impl fmt::Display for HistoryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
