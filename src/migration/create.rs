//! Scaffolding for new migration files

use crate::migration::{MigrationError, MigrationFile};
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Body written into every new migration file
pub const MIGRATION_TEMPLATE: &str = "-- +up
-- SQL statements for migration UP go here

-- +down
-- SQL statements for migration DOWN go here
";

/// Format of the version prefix of generated files (UTC)
pub const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

/// Turn a user-supplied name into the `{name}` part of a migration file name
///
/// Surrounding whitespace is dropped and inner spaces become `_`.
///
/// # Errors
///
/// Returns `MigrationError::Configuration` for an empty name or one containing
/// `.` or a path separator.
pub fn sanitize_name(name: &str) -> Result<String, MigrationError> {
    let safe = name.trim().replace(' ', "_");

    if safe.is_empty() {
        return Err(MigrationError::Configuration(
            "migration name cannot be empty".to_string(),
        ));
    }
    if safe.contains(['.', '/', '\\']) {
        return Err(MigrationError::Configuration(format!(
            "migration name '{name}' must not contain '.', '/' or '\\'"
        )));
    }
    Ok(safe)
}

/// Create `{YYYYMMDDHHMMSS}_{name}.sql` in `migrations_dir` from the template
///
/// The directory is created if needed. An existing file is never overwritten.
///
/// # Errors
///
/// Returns `MigrationError::Configuration` for an invalid name and
/// `MigrationError::Io` if the directory or file cannot be created.
pub fn create_migration(
    migrations_dir: &Path,
    name: &str,
    now: DateTime<Utc>,
) -> Result<MigrationFile, MigrationError> {
    let safe_name = sanitize_name(name)?;
    let filename = format!("{}_{}.sql", now.format(VERSION_FORMAT), safe_name);
    let path = migrations_dir.join(&filename);

    fs::create_dir_all(migrations_dir).map_err(|e| MigrationError::io(migrations_dir, e))?;

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| MigrationError::io(&path, e))?;
    file.write_all(MIGRATION_TEMPLATE.as_bytes())
        .map_err(|e| MigrationError::io(&path, e))?;

    log::info!("Created migration file: {}", path.display());

    MigrationFile::from_path(&path)
}
