//! Migration status reporting (`info`)

use crate::migration::plan::orphaned_records;
use crate::migration::{AppliedHistory, ApplicationRecord, MigrationFile};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// State of one discovered migration relative to history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Validity {
    /// Applied, and the file still matches the stored checksum
    AppliedAndMatching,
    /// Applied, but the file changed afterwards
    AppliedButChanged,
    /// Not applied yet
    NotApplied,
}

impl Validity {
    /// Short label for tabular output
    pub fn label(self) -> &'static str {
        match self {
            Validity::AppliedAndMatching => "YES",
            Validity::AppliedButChanged => "CHANGED",
            Validity::NotApplied => "NO",
        }
    }
}

/// One row of the `info` report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoEntry {
    pub version: i64,
    pub name: String,
    pub validity: Validity,
    pub checksum: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_checksum: Option<String>,
    pub applied_at: Option<DateTime<Utc>>,
}

/// Full `info` report
///
/// `entries` covers every migration file in ascending version order. `orphaned`
/// lists history rows whose file is gone: applied, but no longer resolvable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InfoReport {
    pub entries: Vec<InfoEntry>,
    pub orphaned: Vec<ApplicationRecord>,
}

impl InfoReport {
    /// Build the report; never fails on checksum mismatches
    pub fn build(discovered: &[MigrationFile], applied: &AppliedHistory) -> Self {
        let mut ordered: Vec<&MigrationFile> = discovered.iter().collect();
        ordered.sort_by_key(|m| m.version);

        let entries = ordered
            .into_iter()
            .map(|migration| {
                let record = applied.get(&migration.version);
                let validity = match record {
                    Some(r) if r.checksum == migration.checksum => Validity::AppliedAndMatching,
                    Some(_) => Validity::AppliedButChanged,
                    None => Validity::NotApplied,
                };
                InfoEntry {
                    version: migration.version,
                    name: migration.name.clone(),
                    validity,
                    checksum: migration.checksum.clone(),
                    stored_checksum: record
                        .filter(|_| validity == Validity::AppliedButChanged)
                        .map(|r| r.checksum.clone()),
                    applied_at: record.map(|r| r.applied_at),
                }
            })
            .collect();

        let orphaned = orphaned_records(discovered, applied)
            .into_iter()
            .cloned()
            .collect();

        Self { entries, orphaned }
    }

    fn count(&self, validity: Validity) -> usize {
        self.entries.iter().filter(|e| e.validity == validity).count()
    }

    pub fn applied_count(&self) -> usize {
        self.count(Validity::AppliedAndMatching) + self.count(Validity::AppliedButChanged)
    }

    pub fn pending_count(&self) -> usize {
        self.count(Validity::NotApplied)
    }

    pub fn changed_count(&self) -> usize {
        self.count(Validity::AppliedButChanged)
    }

    /// Check if all migrations are applied and unchanged
    pub fn is_up_to_date(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.validity == Validity::AppliedAndMatching)
    }
}
