//! Command-line arguments

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tidemark::ConfigOverrides;

#[derive(Debug, Parser)]
#[command(name = "tidemark-migrate")]
#[command(about = "Apply, roll back and inspect checksummed SQL migrations")]
#[command(version)]
pub struct Cli {
    /// PostgreSQL connection string (defaults to TIDEMARK__DATABASE_URL or DATABASE_URL)
    #[arg(long, visible_alias = "database-url", global = true)]
    pub dsn: Option<String>,

    /// Migrations directory path [default: migrations]
    #[arg(long, global = true)]
    pub migrations_dir: Option<PathBuf>,

    /// History table name, optionally schema-qualified [default: schema_migrations]
    #[arg(long, global = true)]
    pub history_table: Option<String>,

    /// Config file (default: tidemark.toml in the working directory, if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Commands {
    /// Generate a new migration file from the template
    Create {
        /// Migration name; spaces become underscores
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },

    /// Apply all pending migrations
    Up {
        /// Show what would be applied without running anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply pending migrations up to and including a version
    UpTo {
        /// Highest version to apply
        version: i64,

        /// Show what would be applied without running anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Roll back the most recently applied migration
    Down {
        /// Show what would be rolled back without running anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show every migration and whether it is applied, pending or changed
    Info {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that applied migration files are unchanged
    Validate,
}

impl Cli {
    /// Default `env_logger` filter; `RUST_LOG` still wins
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            database_url: self.dsn.clone(),
            migrations_dir: self.migrations_dir.clone(),
            history_table: self.history_table.clone(),
        }
    }
}
