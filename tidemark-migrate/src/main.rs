//! Tidemark Migration CLI Tool
//!
//! Command-line interface for applying, rolling back and inspecting SQL migrations.
//! Suitable for interactive use and CI/CD pipelines: every fatal error exits with status 1.

use clap::Parser;
use colored::Colorize;
use std::process;
use tidemark_migrate::cli::Cli;
use tidemark_migrate::commands;

fn main() {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter())).init();

    // Migrations run strictly one after another; one worker drives all database I/O.
    may::config().set_workers(1);

    if let Err(e) = commands::run(&cli) {
        eprintln!("{} {e:#}", "Error:".red().bold());
        process::exit(1);
    }
}
