//! Reconciliation of discovered migration files against applied history
//!
//! Everything here is pure: it decides what to run and never touches the
//! database. [`Migrator`](crate::migration::Migrator) executes the result.

use crate::migration::{AppliedHistory, ApplicationRecord, MigrationError, MigrationFile};
use serde::Serialize;
use std::fmt;

/// Direction of a migration step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationDirection {
    /// Run the forward script and insert a history row
    Up,
    /// Run the reverse script and delete the history row
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => f.write_str("up"),
            MigrationDirection::Down => f.write_str("down"),
        }
    }
}

/// One operation of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub direction: MigrationDirection,
    pub migration: MigrationFile,
}

impl PlannedStep {
    /// The script this step runs
    pub fn script(&self) -> &str {
        match self.direction {
            MigrationDirection::Up => &self.migration.up_sql,
            MigrationDirection::Down => &self.migration.down_sql,
        }
    }
}

/// Ordered list of operations, executed first to last
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    pub steps: Vec<PlannedStep>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn versions(&self) -> Vec<i64> {
        self.steps.iter().map(|s| s.migration.version).collect()
    }
}

/// Compare checksums of every version present both on disk and in history
///
/// Stops at the lowest mismatching version. Versions present on only one side
/// are not checked here.
///
/// # Errors
///
/// Returns `MigrationError::ChecksumMismatch` for the first changed file.
pub fn verify_checksums(discovered: &[MigrationFile], applied: &AppliedHistory) -> Result<(), MigrationError> {
    let mut ordered: Vec<&MigrationFile> = discovered.iter().collect();
    ordered.sort_by_key(|m| m.version);

    for migration in ordered {
        if let Some(record) = applied.get(&migration.version) {
            if record.checksum != migration.checksum {
                return Err(MigrationError::ChecksumMismatch {
                    version: migration.version,
                    name: migration.name.clone(),
                    stored: record.checksum.clone(),
                    current: migration.checksum.clone(),
                });
            }
        }
    }
    Ok(())
}

/// History rows whose migration file no longer exists, ascending by version
pub fn orphaned_records<'h>(discovered: &[MigrationFile], applied: &'h AppliedHistory) -> Vec<&'h ApplicationRecord> {
    let mut orphans: Vec<&ApplicationRecord> = applied
        .values()
        .filter(|record| !discovered.iter().any(|m| m.version == record.version))
        .collect();
    orphans.sort_by_key(|r| r.version);
    orphans
}

/// Plan for `up` (`target = None`) and `up-to` (`target = Some(v)`)
///
/// Pending versions are taken in ascending order; the walk stops at the first
/// pending version above `target`.
///
/// # Errors
///
/// Returns `MigrationError::ChecksumMismatch` if any applied file has changed;
/// in that case nothing is planned.
pub fn plan_up(
    discovered: &[MigrationFile],
    applied: &AppliedHistory,
    target: Option<i64>,
) -> Result<MigrationPlan, MigrationError> {
    verify_checksums(discovered, applied)?;

    for orphan in orphaned_records(discovered, applied) {
        log::warn!(
            "Applied migration {} has no file in the migrations directory",
            orphan.label()
        );
    }

    let mut ordered: Vec<&MigrationFile> = discovered.iter().collect();
    ordered.sort_by_key(|m| m.version);

    let latest_applied = applied.keys().max().copied();

    let steps = ordered
        .into_iter()
        .filter(|m| !applied.contains_key(&m.version))
        .take_while(|m| target.map_or(true, |t| m.version <= t))
        .inspect(|m| {
            if latest_applied.is_some_and(|latest| m.version < latest) {
                log::warn!(
                    "Pending migration {} is older than the latest applied version; applying it out of order",
                    m.label()
                );
            }
        })
        .map(|m| PlannedStep {
            direction: MigrationDirection::Up,
            migration: m.clone(),
        })
        .collect();

    Ok(MigrationPlan { steps })
}

/// Plan for `down`: roll back exactly `last`, the highest applied version
///
/// The file is resolved by version alone; a renamed file is accepted with a warning.
/// An empty plan means there is nothing to roll back.
///
/// # Errors
///
/// Returns `MigrationError::ChecksumMismatch` if any applied file has changed and
/// `MigrationError::MissingFile` if `last` has no file on disk.
pub fn plan_down(
    discovered: &[MigrationFile],
    applied: &AppliedHistory,
    last: Option<&ApplicationRecord>,
) -> Result<MigrationPlan, MigrationError> {
    verify_checksums(discovered, applied)?;

    let Some(last) = last else {
        return Ok(MigrationPlan::default());
    };

    let migration = discovered
        .iter()
        .find(|m| m.version == last.version)
        .ok_or_else(|| MigrationError::MissingFile {
            version: last.version,
            name: last.name.clone(),
        })?;

    if migration.name != last.name {
        log::warn!(
            "Migration {} was applied as '{}' but its file is now named '{}'; rolling back by version",
            last.version,
            last.name,
            migration.name
        );
    }

    Ok(MigrationPlan {
        steps: vec![PlannedStep {
            direction: MigrationDirection::Down,
            migration: migration.clone(),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::checksum::checksum_bytes;
    use crate::migration::ErrorKind;
    use chrono::Utc;
    use std::path::PathBuf;

    fn migration(version: i64, name: &str) -> MigrationFile {
        let content = format!("-- +up\nCREATE TABLE t{version} ();\n-- +down\nDROP TABLE t{version};\n");
        MigrationFile {
            path: PathBuf::from(format!("{version}_{name}.sql")),
            version,
            name: name.to_string(),
            up_sql: format!("CREATE TABLE t{version} ();"),
            down_sql: format!("DROP TABLE t{version};"),
            checksum: checksum_bytes(content.as_bytes()),
        }
    }

    fn applied(migrations: &[&MigrationFile]) -> AppliedHistory {
        migrations
            .iter()
            .map(|m| {
                (
                    m.version,
                    ApplicationRecord::new(m.version, m.name.clone(), m.checksum.clone(), Utc::now()),
                )
            })
            .collect()
    }

    #[test]
    fn test_plan_up_orders_unsorted_input() {
        let discovered = vec![migration(3, "c"), migration(1, "a"), migration(2, "b")];
        let plan = plan_up(&discovered, &AppliedHistory::new(), None).unwrap();
        assert_eq!(plan.versions(), vec![1, 2, 3]);
        assert!(plan.steps.iter().all(|s| s.direction == MigrationDirection::Up));
    }

    #[test]
    fn test_plan_up_skips_applied() {
        let discovered = vec![migration(1, "a"), migration(2, "b"), migration(3, "c")];
        let history = applied(&[&discovered[0]]);
        let plan = plan_up(&discovered, &history, None).unwrap();
        assert_eq!(plan.versions(), vec![2, 3]);
    }

    #[test]
    fn test_plan_up_to_stops_above_target() {
        let discovered = vec![migration(1, "a"), migration(2, "b"), migration(3, "c"), migration(4, "d")];
        let history = applied(&[&discovered[0]]);

        assert_eq!(plan_up(&discovered, &history, Some(3)).unwrap().versions(), vec![2, 3]);
        assert!(plan_up(&discovered, &history, Some(1)).unwrap().is_empty());
        assert_eq!(plan_up(&discovered, &history, Some(100)).unwrap().versions(), vec![2, 3, 4]);
    }

    #[test]
    fn test_plan_up_to_between_versions() {
        let discovered = vec![migration(10, "a"), migration(20, "b"), migration(30, "c")];
        let plan = plan_up(&discovered, &AppliedHistory::new(), Some(25)).unwrap();
        assert_eq!(plan.versions(), vec![10, 20]);
    }

    #[test]
    fn test_plan_up_includes_out_of_order_pending() {
        let discovered = vec![migration(1, "a"), migration(2, "b"), migration(3, "c")];
        let history = applied(&[&discovered[0], &discovered[2]]);
        assert_eq!(plan_up(&discovered, &history, None).unwrap().versions(), vec![2]);
    }

    #[test]
    fn test_plan_up_aborts_on_any_checksum_mismatch() {
        let discovered = vec![migration(1, "a"), migration(2, "b"), migration(3, "c")];
        let mut history = applied(&[&discovered[0], &discovered[1]]);
        if let Some(record) = history.get_mut(&2) {
            record.checksum = "0".repeat(64);
        }

        let err = plan_up(&discovered, &history, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(matches!(err, MigrationError::ChecksumMismatch { version: 2, .. }));
    }

    #[test]
    fn test_plan_up_tolerates_orphaned_history() {
        let discovered = vec![migration(2, "b")];
        let mut history = AppliedHistory::new();
        history.insert(1, ApplicationRecord::new(1, "gone".into(), "x".repeat(64), Utc::now()));

        let plan = plan_up(&discovered, &history, None).unwrap();
        assert_eq!(plan.versions(), vec![2]);
        assert_eq!(orphaned_records(&discovered, &history)[0].version, 1);
    }

    #[test]
    fn test_plan_down_targets_given_record() {
        let discovered = vec![migration(1, "a"), migration(2, "b")];
        let history = applied(&[&discovered[0], &discovered[1]]);
        let last = history.get(&2);

        let plan = plan_down(&discovered, &history, last).unwrap();
        assert_eq!(plan.versions(), vec![2]);
        assert_eq!(plan.steps[0].direction, MigrationDirection::Down);
        assert_eq!(plan.steps[0].script(), "DROP TABLE t2;");
    }

    #[test]
    fn test_plan_down_empty_history() {
        let discovered = vec![migration(1, "a")];
        assert!(plan_down(&discovered, &AppliedHistory::new(), None).unwrap().is_empty());
    }

    #[test]
    fn test_plan_down_missing_file() {
        let discovered = vec![migration(1, "a")];
        let record = ApplicationRecord::new(2, "b".into(), "x".repeat(64), Utc::now());
        let mut history = applied(&[&discovered[0]]);
        history.insert(2, record.clone());

        let err = plan_down(&discovered, &history, Some(&record)).unwrap_err();
        assert!(matches!(err, MigrationError::MissingFile { version: 2, ref name } if name == "b"));
    }

    #[test]
    fn test_plan_down_resolves_renamed_file_by_version() {
        let original = migration(4, "old_name");
        let mut renamed = original.clone();
        renamed.name = "new_name".to_string();
        let history = applied(&[&original]);

        let plan = plan_down(&[renamed], &history, history.get(&4)).unwrap();
        assert_eq!(plan.steps[0].migration.name, "new_name");
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(MigrationDirection::Up.to_string(), "up");
        assert_eq!(MigrationDirection::Down.to_string(), "down");
    }
}
