//! Migration-specific error types

use crate::migration::plan::MigrationDirection;
use crate::TideError;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`MigrationError`].
///
/// Callers that only need to decide "fix the files", "fix the database" or
/// "fix the invocation" can match on this instead of on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed migration file name or body
    Parse,
    /// An applied migration's file no longer matches its stored checksum
    Integrity,
    /// A forward or reverse script failed on the server
    Execution,
    /// The history table and the engine disagree about what is applied
    HistoryConsistency,
    /// Missing or invalid settings, detected before connecting
    Configuration,
    /// Filesystem failure while reading or writing migration files
    Io,
    /// Any other database failure (history reads/writes, transaction control)
    Database,
}

/// Migration-specific errors
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid migration file '{file}': {reason}")]
    Parse { file: String, reason: String },

    #[error("Duplicate migration version {version}: '{first}' and '{second}'")]
    DuplicateVersion {
        version: i64,
        first: String,
        second: String,
    },

    #[error(
        "Migration '{name}' (version {version}) has been modified after being applied.\n\
         Stored checksum: {stored}\n\
         Current checksum: {current}\n\
         This indicates the migration file was edited after deployment."
    )]
    ChecksumMismatch {
        version: i64,
        name: String,
        stored: String,
        current: String,
    },

    #[error("Migration '{name}' (version {version}) failed while running {direction}: {source}")]
    ExecutionFailed {
        version: i64,
        name: String,
        direction: MigrationDirection,
        #[source]
        source: TideError,
    },

    #[error(
        "No history row for migration '{name}' (version {version}); \
         the history table and the migration state have diverged"
    )]
    HistoryMissing { version: i64, name: String },

    #[error("Migration '{name}' (version {version}) is already recorded in the history table")]
    HistoryConflict { version: i64, name: String },

    #[error(
        "Applied migration file not found for version {version} ('{name}').\n\
         Suggestion: restore the file to the migrations directory before rolling back"
    )]
    MissingFile { version: i64, name: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(#[from] TideError),
}

impl MigrationError {
    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            MigrationError::Io { .. } => ErrorKind::Io,
            MigrationError::Parse { .. } | MigrationError::DuplicateVersion { .. } => {
                ErrorKind::Parse
            }
            MigrationError::ChecksumMismatch { .. } => ErrorKind::Integrity,
            MigrationError::ExecutionFailed { .. } => ErrorKind::Execution,
            MigrationError::HistoryMissing { .. }
            | MigrationError::HistoryConflict { .. }
            | MigrationError::MissingFile { .. } => ErrorKind::HistoryConsistency,
            MigrationError::Configuration(_) => ErrorKind::Configuration,
            MigrationError::Database(_) => ErrorKind::Database,
        }
    }

    pub(crate) fn parse(file: impl Into<String>, reason: impl Into<String>) -> Self {
        MigrationError::Parse {
            file: file.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrationError::Io {
            path: path.into(),
            source,
        }
    }
}
