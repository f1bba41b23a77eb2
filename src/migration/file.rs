//! Migration file discovery and parsing
//!
//! A migration is a single `.sql` file named `{version}_{name}.sql` holding a
//! forward and a reverse script:
//!
//! ```sql
//! -- +up
//! CREATE TABLE users (id BIGINT PRIMARY KEY);
//!
//! -- +down
//! DROP TABLE users;
//! ```

use crate::migration::checksum::checksum_bytes;
use crate::migration::MigrationError;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Line that opens the forward section
pub const UP_MARKER: &str = "-- +up";

/// Line that opens the reverse section
pub const DOWN_MARKER: &str = "-- +down";

/// Extension of migration files; anything else in the directory is ignored
pub const MIGRATION_EXTENSION: &str = "sql";

const FILENAME_PATTERN: &str = r"^(\d+)_([^.]+)\.sql$";

/// Represents a parsed migration file
///
/// Built once per invocation from the file on disk and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Path to the migration file
    pub path: PathBuf,

    /// Migration version, the ordering key and identity of the migration
    pub version: i64,

    /// Human-readable migration name (informational only)
    pub name: String,

    /// Forward script, trimmed
    pub up_sql: String,

    /// Reverse script, trimmed
    pub down_sql: String,

    /// SHA-256 checksum of the raw file bytes
    pub checksum: String,
}

impl MigrationFile {
    /// Parse migration file name to extract version and name
    ///
    /// Expected format: `{digits}_{name}.sql`, where `name` contains no `.`
    ///
    /// # Example
    /// - `20240120120000_create_users_table.sql` → version: 20240120120000, name: "create_users_table"
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Parse` if the name does not match or the version overflows `i64`.
    pub fn parse_filename(filename: &str) -> Result<(i64, String), MigrationError> {
        let re = Regex::new(FILENAME_PATTERN)
            .map_err(|e| MigrationError::parse(filename, format!("invalid filename pattern: {e}")))?;

        let caps = re.captures(filename).ok_or_else(|| {
            MigrationError::parse(
                filename,
                "file name does not match expected pattern {version}_{name}.sql",
            )
        })?;

        let (version_str, name) = match (caps.get(1), caps.get(2)) {
            (Some(v), Some(n)) => (v.as_str(), n.as_str()),
            _ => {
                return Err(MigrationError::parse(
                    filename,
                    "file name does not match expected pattern {version}_{name}.sql",
                ))
            }
        };

        let version = version_str.parse::<i64>().map_err(|e| {
            MigrationError::parse(filename, format!("version '{version_str}' is not a valid 64-bit integer: {e}"))
        })?;

        Ok((version, name.to_string()))
    }

    /// Split file content into trimmed forward and reverse scripts
    ///
    /// Marker lines are matched after trimming surrounding whitespace. The
    /// `-- +down` marker is mandatory and may appear once; `-- +up` is optional,
    /// may appear once, and must come before `-- +down`.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Parse` for a missing or repeated marker.
    pub fn parse_sections(filename: &str, content: &str) -> Result<(String, String), MigrationError> {
        let mut up_marker: Option<(usize, usize)> = None;
        let mut down_marker: Option<(usize, usize)> = None;

        let mut offset = 0;
        for line in content.split_inclusive('\n') {
            let span = (offset, offset + line.len());
            offset = span.1;

            match line.trim() {
                UP_MARKER => {
                    if up_marker.is_some() {
                        return Err(MigrationError::parse(filename, format!("'{UP_MARKER}' appears more than once")));
                    }
                    if down_marker.is_some() {
                        return Err(MigrationError::parse(
                            filename,
                            format!("'{UP_MARKER}' must come before '{DOWN_MARKER}'"),
                        ));
                    }
                    up_marker = Some(span);
                }
                DOWN_MARKER => {
                    if down_marker.is_some() {
                        return Err(MigrationError::parse(filename, format!("'{DOWN_MARKER}' appears more than once")));
                    }
                    down_marker = Some(span);
                }
                _ => {}
            }
        }

        let Some((down_start, down_end)) = down_marker else {
            return Err(MigrationError::parse(filename, format!("missing '{DOWN_MARKER}' section")));
        };

        let up_sql = match up_marker {
            Some((up_start, up_end)) => {
                format!("{}{}", &content[..up_start], &content[up_end..down_start])
            }
            None => content[..down_start].to_string(),
        };
        let down_sql = &content[down_end..];

        Ok((up_sql.trim().to_string(), down_sql.trim().to_string()))
    }

    /// Read and parse one migration file
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Io` if the file cannot be read and
    /// `MigrationError::Parse` if its name or content is malformed.
    pub fn from_path(path: &Path) -> Result<Self, MigrationError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MigrationError::parse(path.display().to_string(), "file name is not valid UTF-8"))?;

        let (version, name) = Self::parse_filename(filename)?;

        let raw = fs::read(path).map_err(|e| MigrationError::io(path, e))?;
        let checksum = checksum_bytes(&raw);
        let content = String::from_utf8(raw)
            .map_err(|e| MigrationError::parse(filename, format!("content is not valid UTF-8: {e}")))?;

        let (up_sql, down_sql) = Self::parse_sections(filename, &content)?;

        Ok(Self {
            path: path.to_path_buf(),
            version,
            name,
            up_sql,
            down_sql,
            checksum,
        })
    }

    /// `{version}_{name}` label used in log lines and CLI output
    pub fn label(&self) -> String {
        format!("{}_{}", self.version, self.name)
    }
}

/// Discover all migration files in a directory
///
/// Scans `migrations_dir` for `.sql` files, parses each one, and returns them
/// sorted by version (ascending). Sub-directories and files with any other
/// extension are skipped. A single malformed file aborts the whole load.
///
/// # Errors
///
/// Returns errors if:
/// - The directory doesn't exist or can't be read
/// - A `.sql` file has an invalid name or is missing its `-- +down` section
/// - Two files share a version
pub fn discover_migrations(migrations_dir: &Path) -> Result<Vec<MigrationFile>, MigrationError> {
    let entries = fs::read_dir(migrations_dir).map_err(|e| MigrationError::io(migrations_dir, e))?;

    let mut by_version: BTreeMap<i64, MigrationFile> = BTreeMap::new();

    for entry in entries {
        let entry = entry.map_err(|e| MigrationError::io(migrations_dir, e))?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if path.extension().and_then(|s| s.to_str()) != Some(MIGRATION_EXTENSION) {
            log::debug!("Ignoring non-migration file {}", path.display());
            continue;
        }

        let migration = MigrationFile::from_path(&path)?;

        if let Some(existing) = by_version.get(&migration.version) {
            let mut names = [file_name_of(&existing.path), file_name_of(&migration.path)];
            names.sort();
            let [first, second] = names;
            return Err(MigrationError::DuplicateVersion {
                version: migration.version,
                first,
                second,
            });
        }

        log::debug!(
            "Discovered migration {} (checksum {})",
            migration.label(),
            migration.checksum
        );
        by_version.insert(migration.version, migration);
    }

    Ok(by_version.into_values().collect())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
