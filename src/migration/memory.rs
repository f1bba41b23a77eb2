//! In-process `MigrationDatabase`
//!
//! Keeps history rows in memory and records scripts instead of running them.
//! Each step is transactional: a failed script or history write restores the
//! rows and the script log to their state before the step. Used by the test
//! suites and handy for rehearsing a migrations directory without a server.

use crate::migration::database::{execution_failed, MigrationDatabase};
use crate::migration::history::{AppliedHistory, HistoryStore};
use crate::migration::plan::{MigrationDirection, PlannedStep};
use crate::migration::{ApplicationRecord, MigrationError};
use crate::TideError;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// A script that was committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedScript {
    pub version: i64,
    pub direction: MigrationDirection,
    pub script: String,
}

/// In-memory `MigrationDatabase`
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    schema_ready: Cell<bool>,
    rows: RefCell<BTreeMap<i64, ApplicationRecord>>,
    executed: RefCell<Vec<ExecutedScript>>,
    steps_attempted: Cell<usize>,
    failing_scripts: RefCell<Vec<String>>,
    failing_history_versions: RefCell<Vec<i64>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// A database whose history table already holds `records`
    pub fn with_history(records: impl IntoIterator<Item = ApplicationRecord>) -> Self {
        let db = Self::new();
        db.schema_ready.set(true);
        db.rows
            .borrow_mut()
            .extend(records.into_iter().map(|r| (r.version, r)));
        db
    }

    /// Make any script containing `fragment` fail
    pub fn fail_scripts_containing(&self, fragment: impl Into<String>) {
        self.failing_scripts.borrow_mut().push(fragment.into());
    }

    /// Make the history write for `version` fail after its script ran
    pub fn fail_history_write_for(&self, version: i64) {
        self.failing_history_versions.borrow_mut().push(version);
    }

    /// History rows ascending by version
    pub fn history(&self) -> Vec<ApplicationRecord> {
        self.rows.borrow().values().cloned().collect()
    }

    /// Versions currently recorded as applied, ascending
    pub fn applied_versions(&self) -> Vec<i64> {
        self.rows.borrow().keys().copied().collect()
    }

    /// Committed scripts in execution order
    pub fn executed(&self) -> Vec<ExecutedScript> {
        self.executed.borrow().clone()
    }

    /// Number of `run_step` calls, committed or not
    pub fn steps_attempted(&self) -> usize {
        self.steps_attempted.get()
    }

    fn require_schema(&self) -> Result<(), MigrationError> {
        if self.schema_ready.get() {
            Ok(())
        } else {
            Err(MigrationError::Database(TideError::QueryError(
                "history table does not exist".to_string(),
            )))
        }
    }
}

impl HistoryStore for MemoryDatabase {
    fn ensure_schema(&self) -> Result<(), MigrationError> {
        self.schema_ready.set(true);
        Ok(())
    }

    fn history_exists(&self) -> Result<bool, MigrationError> {
        Ok(self.schema_ready.get())
    }

    fn load_applied(&self) -> Result<AppliedHistory, MigrationError> {
        self.require_schema()?;
        Ok(self
            .rows
            .borrow()
            .iter()
            .map(|(version, record)| (*version, record.clone()))
            .collect())
    }

    fn record_applied(&self, record: &ApplicationRecord) -> Result<(), MigrationError> {
        self.require_schema()?;
        if self.failing_history_versions.borrow().contains(&record.version) {
            return Err(MigrationError::Database(TideError::Other(format!(
                "history insert failed for version {}",
                record.version
            ))));
        }

        let mut rows = self.rows.borrow_mut();
        if rows.contains_key(&record.version) {
            return Err(MigrationError::HistoryConflict {
                version: record.version,
                name: record.name.clone(),
            });
        }
        rows.insert(record.version, record.clone());
        Ok(())
    }

    fn record_rolled_back(&self, version: i64, name: &str) -> Result<(), MigrationError> {
        self.require_schema()?;
        if self.failing_history_versions.borrow().contains(&version) {
            return Err(MigrationError::Database(TideError::Other(format!(
                "history delete failed for version {version}"
            ))));
        }

        match self.rows.borrow_mut().remove(&version) {
            Some(_) => Ok(()),
            None => Err(MigrationError::HistoryMissing {
                version,
                name: name.to_string(),
            }),
        }
    }

    fn last_applied(&self) -> Result<Option<ApplicationRecord>, MigrationError> {
        self.require_schema()?;
        Ok(self.rows.borrow().values().next_back().cloned())
    }
}

impl MigrationDatabase for MemoryDatabase {
    fn run_step(
        &self,
        step: &PlannedStep,
        write_history: &mut dyn FnMut(&dyn HistoryStore) -> Result<(), MigrationError>,
    ) -> Result<(), MigrationError> {
        self.steps_attempted.set(self.steps_attempted.get() + 1);

        let script = step.script();
        if let Some(fragment) = self
            .failing_scripts
            .borrow()
            .iter()
            .find(|fragment| script.contains(fragment.as_str()))
        {
            return Err(execution_failed(
                step,
                TideError::QueryError(format!("script failed at '{fragment}'")),
            ));
        }

        let snapshot = self.rows.borrow().clone();
        self.executed.borrow_mut().push(ExecutedScript {
            version: step.migration.version,
            direction: step.direction,
            script: script.to_string(),
        });

        if let Err(e) = write_history(self) {
            *self.rows.borrow_mut() = snapshot;
            self.executed.borrow_mut().pop();
            return Err(e);
        }
        Ok(())
    }
}
