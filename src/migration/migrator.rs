//! Migrator - Core migration execution engine

use crate::migration::create::create_migration;
use crate::migration::file::discover_migrations;
use crate::migration::plan::{self, MigrationDirection, MigrationPlan, PlannedStep};
use crate::migration::{
    AppliedHistory, ApplicationRecord, HistoryStore, InfoReport, MigrationDatabase, MigrationError,
    MigrationFile,
};
use chrono::{SubsecRound, Utc};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[cfg(feature = "tracing")]
use crate::tracing_helpers;

/// Result of `up` / `up-to`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpOutcome {
    /// History rows written, in the order the migrations ran
    pub applied: Vec<ApplicationRecord>,
}

/// Result of `down`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownOutcome {
    /// The given migration was rolled back and its history row removed
    RolledBack(ApplicationRecord),
    /// History was empty
    NothingToRollBack,
}

/// Core migration execution engine
///
/// The `Migrator` discovers migration files, reconciles them with the history
/// table, and executes the resulting plan one step at a time. Each step runs
/// its script and history write in one transaction; the first failing step
/// stops the run, leaving history reflecting exactly the steps that completed.
pub struct Migrator {
    migrations_dir: PathBuf,
}

impl Migrator {
    /// Create a new Migrator with the specified migrations directory
    pub fn new(migrations_dir: impl AsRef<Path>) -> Self {
        Self {
            migrations_dir: migrations_dir.as_ref().to_path_buf(),
        }
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Discover all migration files, sorted by version
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable or malformed file.
    pub fn discover_migrations(&self) -> Result<Vec<MigrationFile>, MigrationError> {
        discover_migrations(&self.migrations_dir)
    }

    /// Write a new migration file from the template, versioned with the current UTC time
    ///
    /// # Errors
    ///
    /// See [`create_migration`].
    pub fn create(&self, name: &str) -> Result<MigrationFile, MigrationError> {
        create_migration(&self.migrations_dir, name, Utc::now())
    }

    fn load(&self, db: &dyn MigrationDatabase) -> Result<(Vec<MigrationFile>, AppliedHistory), MigrationError> {
        let discovered = self.discover_migrations()?;
        db.ensure_schema()?;
        let applied = db.load_applied()?;
        Ok((discovered, applied))
    }

    // Never creates the history table; a missing table reads as empty history.
    fn load_read_only(&self, db: &dyn MigrationDatabase) -> Result<(Vec<MigrationFile>, AppliedHistory), MigrationError> {
        let discovered = self.discover_migrations()?;
        if !db.history_exists()? {
            log::debug!("History table does not exist yet; treating every migration as pending");
            return Ok((discovered, AppliedHistory::new()));
        }
        let applied = db.load_applied()?;
        Ok((discovered, applied))
    }

    /// Compute the plan for `up` (`target = None`) or `up-to` without executing it
    ///
    /// Read-only: the history table is not created when missing.
    ///
    /// # Errors
    ///
    /// Fails on parse errors and on any checksum mismatch.
    pub fn plan_up(&self, db: &dyn MigrationDatabase, target: Option<i64>) -> Result<MigrationPlan, MigrationError> {
        let (discovered, applied) = self.load_read_only(db)?;
        plan::plan_up(&discovered, &applied, target)
    }

    /// Compute the plan for `down` without executing it
    ///
    /// Read-only: the history table is not created when missing.
    ///
    /// # Errors
    ///
    /// Fails on parse errors, on any checksum mismatch, and when the file of the
    /// last applied migration is missing.
    pub fn plan_down(&self, db: &dyn MigrationDatabase) -> Result<MigrationPlan, MigrationError> {
        let (discovered, applied) = self.load_read_only(db)?;
        let last = applied.values().max_by_key(|r| r.version);
        plan::plan_down(&discovered, &applied, last)
    }

    /// Apply all pending migrations in ascending version order
    ///
    /// # Errors
    ///
    /// Nothing runs if any applied file has changed. Otherwise the first failing
    /// migration stops the run; earlier migrations stay applied.
    pub fn up(&self, db: &dyn MigrationDatabase) -> Result<UpOutcome, MigrationError> {
        self.up_with_target(db, None)
    }

    /// Apply pending migrations with a version at or below `target`
    ///
    /// # Errors
    ///
    /// Same as [`Migrator::up`].
    pub fn up_to(&self, db: &dyn MigrationDatabase, target: i64) -> Result<UpOutcome, MigrationError> {
        self.up_with_target(db, Some(target))
    }

    fn up_with_target(&self, db: &dyn MigrationDatabase, target: Option<i64>) -> Result<UpOutcome, MigrationError> {
        let (discovered, applied) = self.load(db)?;
        let plan = plan::plan_up(&discovered, &applied, target)?;
        self.apply(db, &plan)
    }

    /// Roll back the single highest applied migration
    ///
    /// # Errors
    ///
    /// Nothing runs if any applied file has changed or the file to roll back is
    /// missing. If the reverse script fails the migration stays applied.
    pub fn down(&self, db: &dyn MigrationDatabase) -> Result<DownOutcome, MigrationError> {
        let (discovered, applied) = self.load(db)?;
        let last = db.last_applied()?;
        let plan = plan::plan_down(&discovered, &applied, last.as_ref())?;

        let (Some(step), Some(record)) = (plan.steps.first(), last) else {
            log::info!("No migrations to roll back");
            return Ok(DownOutcome::NothingToRollBack);
        };

        self.revert_step(db, step)?;
        Ok(DownOutcome::RolledBack(record))
    }

    /// Report every migration's state; checksum mismatches are reported, not raised
    ///
    /// # Errors
    ///
    /// Fails only on parse errors and database errors.
    pub fn info(&self, db: &dyn MigrationDatabase) -> Result<InfoReport, MigrationError> {
        let (discovered, applied) = self.load(db)?;
        Ok(InfoReport::build(&discovered, &applied))
    }

    /// Verify all applied migrations still match their files
    ///
    /// Returns the number of applied migrations that were checked.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::ChecksumMismatch` for the first changed file.
    pub fn validate_checksums(&self, db: &dyn MigrationDatabase) -> Result<usize, MigrationError> {
        let (discovered, applied) = self.load(db)?;
        plan::verify_checksums(&discovered, &applied)?;
        Ok(discovered
            .iter()
            .filter(|m| applied.contains_key(&m.version))
            .count())
    }

    fn apply(&self, db: &dyn MigrationDatabase, plan: &MigrationPlan) -> Result<UpOutcome, MigrationError> {
        if plan.is_empty() {
            log::info!("No pending migrations to apply");
            return Ok(UpOutcome::default());
        }

        let mut outcome = UpOutcome::default();
        for step in &plan.steps {
            match self.apply_step(db, step) {
                Ok(record) => outcome.applied.push(record),
                Err(e) => {
                    if !outcome.applied.is_empty() {
                        log::error!(
                            "{} migration(s) were applied before the failure and remain recorded",
                            outcome.applied.len()
                        );
                    }
                    return Err(e);
                }
            }
        }

        log::info!("Applied {} migration(s)", outcome.applied.len());
        Ok(outcome)
    }

    fn apply_step(&self, db: &dyn MigrationDatabase, step: &PlannedStep) -> Result<ApplicationRecord, MigrationError> {
        debug_assert_eq!(step.direction, MigrationDirection::Up);
        let migration = &step.migration;

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::apply_migration_span(migration.version, &migration.name).entered();

        log::info!("Applying migration {}...", migration.label());
        let start = Instant::now();

        // PostgreSQL TIMESTAMP keeps microseconds
        let record = ApplicationRecord::new(
            migration.version,
            migration.name.clone(),
            migration.checksum.clone(),
            Utc::now().trunc_subsecs(6),
        );

        db.run_step(step, &mut |history: &dyn HistoryStore| history.record_applied(&record))?;

        log::info!(
            "Applied migration {} in {}ms",
            migration.label(),
            start.elapsed().as_millis()
        );
        Ok(record)
    }

    fn revert_step(&self, db: &dyn MigrationDatabase, step: &PlannedStep) -> Result<(), MigrationError> {
        debug_assert_eq!(step.direction, MigrationDirection::Down);
        let migration = &step.migration;

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::revert_migration_span(migration.version, &migration.name).entered();

        log::info!("Rolling back migration {}...", migration.label());
        let start = Instant::now();

        db.run_step(step, &mut |history: &dyn HistoryStore| {
            history.record_rolled_back(migration.version, &migration.name)
        })?;

        log::info!(
            "Rolled back migration {} in {}ms",
            migration.label(),
            start.elapsed().as_millis()
        );
        Ok(())
    }
}
