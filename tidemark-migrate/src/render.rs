//! Terminal and JSON rendering of migration reports

use colored::Colorize;
use serde::Serialize;
use tidemark::migration::{ApplicationRecord, InfoEntry, InfoReport, MigrationDirection, MigrationPlan, Validity};

const RULE: &str = "---------------------------------------------------------------";
const APPLIED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Label shown for history rows whose file is gone
pub const MISSING_LABEL: &str = "MISSING";

fn row(version: i64, name: &str, valid: &str, applied_at: &str) -> String {
    format!("{version:<16} {name:<25} {valid} {applied_at}")
}

fn colored_validity(validity: Validity) -> String {
    let padded = format!("{:<8}", validity.label());
    match validity {
        Validity::AppliedAndMatching => padded.green().to_string(),
        Validity::AppliedButChanged => padded.red().bold().to_string(),
        Validity::NotApplied => padded.yellow().to_string(),
    }
}

fn entry_line(entry: &InfoEntry) -> String {
    let applied_at = entry
        .applied_at
        .map_or_else(|| "-".to_string(), |at| at.format(APPLIED_AT_FORMAT).to_string());
    row(entry.version, &entry.name, &colored_validity(entry.validity), &applied_at)
}

fn orphan_line(record: &ApplicationRecord) -> String {
    let missing = format!("{MISSING_LABEL:<8}").red().to_string();
    row(
        record.version,
        &record.name,
        &missing,
        &record.applied_at.format(APPLIED_AT_FORMAT).to_string(),
    )
}

/// The `info` table: one line per migration file, then history rows without a file
pub fn info_table(report: &InfoReport) -> String {
    let mut lines = vec![
        "Migration Info:".to_string(),
        RULE.to_string(),
        format!("{:<16} {:<25} {:<8} {}", "Version", "Name", "Valid", "Applied At"),
        RULE.to_string(),
    ];
    lines.extend(report.entries.iter().map(entry_line));
    lines.extend(report.orphaned.iter().map(orphan_line));
    lines.push(RULE.to_string());
    lines.push(summary(report));
    lines.join("\n")
}

fn summary(report: &InfoReport) -> String {
    let mut summary = format!(
        "{} applied, {} pending",
        report.applied_count(),
        report.pending_count()
    );
    if report.changed_count() > 0 {
        summary.push_str(&format!(", {} changed", report.changed_count()).red().to_string());
    }
    if !report.orphaned.is_empty() {
        summary.push_str(&format!(", {} missing", report.orphaned.len()).red().to_string());
    }
    summary
}

#[derive(Serialize)]
struct InfoJson<'a> {
    applied: usize,
    pending: usize,
    changed: usize,
    migrations: &'a [InfoEntry],
    missing: &'a [ApplicationRecord],
}

/// The `info --json` document
///
/// # Errors
///
/// Propagates `serde_json` serialization errors.
pub fn info_json(report: &InfoReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&InfoJson {
        applied: report.applied_count(),
        pending: report.pending_count(),
        changed: report.changed_count(),
        migrations: &report.entries,
        missing: &report.orphaned,
    })
}

/// A `--dry-run` plan
pub fn plan(plan: &MigrationPlan, direction: MigrationDirection) -> String {
    if plan.is_empty() {
        return match direction {
            MigrationDirection::Up => "No pending migrations to apply".to_string(),
            MigrationDirection::Down => "No migrations to roll back".to_string(),
        };
    }

    let verb = match direction {
        MigrationDirection::Up => "apply",
        MigrationDirection::Down => "roll back",
    };
    let mut lines = vec![format!("Would {verb} {} migration(s):", plan.len())];
    lines.extend(
        plan.steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("  {}. {}", i + 1, step.migration.label())),
    );
    lines.join("\n")
}
