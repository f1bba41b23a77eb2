//! Command handlers

use crate::cli::{Cli, Commands};
use crate::render;
use anyhow::{Context, Result};
use colored::Colorize;
use tidemark::connection::redact_password;
use tidemark::migration::{DownOutcome, MigrationDatabase, MigrationDirection, Migrator, PgMigrationDatabase};
use tidemark::{connect, MayPostgresExecutor, MigrateConfig};

/// Run the parsed command to completion
///
/// # Errors
///
/// Any failure is fatal to the process except checksum mismatches reported by `info`.
pub fn run(cli: &Cli) -> Result<()> {
    let config = MigrateConfig::load(cli.config.as_deref())?.with_overrides(cli.overrides());
    let migrator = Migrator::new(&config.migrations_dir);

    // The only command that never needs a connection
    if let Commands::Create { name } = &cli.command {
        return handle_create(&migrator, name);
    }

    let database = open_database(&config)?;
    run_with_database(&cli.command, &migrator, &database)
}

/// Connect using the configured URL and history table
///
/// # Errors
///
/// Fails with a configuration error before any connection attempt when no URL is set.
pub fn open_database(config: &MigrateConfig) -> Result<PgMigrationDatabase> {
    let history_table = config.history_table()?;
    let url = config.require_database_url()?;
    log::debug!(
        "Migrations directory: {}, history table: {history_table}",
        config.migrations_dir.display()
    );

    let client = connect(url).with_context(|| format!("DB connect error ({})", redact_password(url)))?;
    Ok(PgMigrationDatabase::new(MayPostgresExecutor::new(client), history_table))
}

/// Run a database command against any `MigrationDatabase`
///
/// # Errors
///
/// See [`run`].
pub fn run_with_database(command: &Commands, migrator: &Migrator, database: &dyn MigrationDatabase) -> Result<()> {
    match command {
        Commands::Create { name } => handle_create(migrator, name)?,
        Commands::Up { dry_run: true } => {
            println!("{}", render::plan(&migrator.plan_up(database, None)?, MigrationDirection::Up));
        }
        Commands::Up { dry_run: false } => handle_up(migrator, database, None)?,
        Commands::UpTo { version, dry_run: true } => {
            println!(
                "{}",
                render::plan(&migrator.plan_up(database, Some(*version))?, MigrationDirection::Up)
            );
        }
        Commands::UpTo { version, dry_run: false } => handle_up(migrator, database, Some(*version))?,
        Commands::Down { dry_run: true } => {
            println!("{}", render::plan(&migrator.plan_down(database)?, MigrationDirection::Down));
        }
        Commands::Down { dry_run: false } => handle_down(migrator, database)?,
        Commands::Info { json } => {
            let report = migrator.info(database)?;
            if *json {
                println!("{}", render::info_json(&report)?);
            } else {
                println!("{}", render::info_table(&report));
            }
        }
        Commands::Validate => {
            let checked = migrator.validate_checksums(database)?;
            println!("{} {checked} applied migration(s) match their files", "✓".green());
        }
    }
    Ok(())
}

fn handle_create(migrator: &Migrator, name: &[String]) -> Result<()> {
    let migration = migrator.create(&name.join(" "))?;
    println!("{} {}", "Created migration:".green(), migration.path.display());
    Ok(())
}

fn handle_up(migrator: &Migrator, database: &dyn MigrationDatabase, target: Option<i64>) -> Result<()> {
    let outcome = match target {
        Some(version) => migrator.up_to(database, version)?,
        None => migrator.up(database)?,
    };

    if outcome.applied.is_empty() {
        println!("No migrations to apply");
    } else {
        println!(
            "{} Successfully applied {} migration(s)",
            "✓".green(),
            outcome.applied.len()
        );
    }
    Ok(())
}

fn handle_down(migrator: &Migrator, database: &dyn MigrationDatabase) -> Result<()> {
    match migrator.down(database)? {
        DownOutcome::RolledBack(record) => {
            println!("{} Rolled back {}", "✓".green(), record.label());
        }
        DownOutcome::NothingToRollBack => println!("No migrations to rollback"),
    }
    Ok(())
}
