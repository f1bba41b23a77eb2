//! Checksum calculation for migration files

use crate::migration::MigrationError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Length of a rendered checksum (SHA-256, lowercase hex).
pub const CHECKSUM_LEN: usize = 64;

/// Calculate the SHA-256 checksum of raw migration file bytes
///
/// The digest covers the entire file, markers and comments included, so any
/// edit to an applied migration is detected. Returns 64 lowercase hex characters.
pub fn checksum_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Calculate the SHA-256 checksum of a migration file on disk
///
/// # Errors
///
/// Returns `MigrationError::Io` if the file cannot be read
pub fn calculate_checksum(migration_file_path: &Path) -> Result<String, MigrationError> {
    let content = fs::read(migration_file_path)
        .map_err(|e| MigrationError::io(migration_file_path, e))?;
    Ok(checksum_bytes(&content))
}
