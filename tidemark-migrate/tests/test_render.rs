//! Tests for report rendering

use chrono::{TimeZone, Utc};
use std::path::PathBuf;
use tidemark::migration::{
    ApplicationRecord, AppliedHistory, InfoReport, MigrationDirection, MigrationFile, MigrationPlan, PlannedStep,
};
use tidemark_migrate::render;

fn migration(version: i64, name: &str, checksum: &str) -> MigrationFile {
    MigrationFile {
        path: PathBuf::from(format!("{version}_{name}.sql")),
        version,
        name: name.to_string(),
        up_sql: "SELECT 1;".to_string(),
        down_sql: "SELECT 0;".to_string(),
        checksum: checksum.to_string(),
    }
}

fn record(version: i64, name: &str, checksum: &str) -> ApplicationRecord {
    let applied_at = Utc.with_ymd_and_hms(2024, 1, 20, 12, 30, 5).unwrap();
    ApplicationRecord::new(version, name.to_string(), checksum.to_string(), applied_at)
}

fn report() -> InfoReport {
    let discovered = vec![
        migration(1, "init", "aaa"),
        migration(2, "users", "bbb-edited"),
        migration(3, "orders", "ccc"),
    ];
    let applied: AppliedHistory = [
        (1, record(1, "init", "aaa")),
        (2, record(2, "users", "bbb")),
        (7, record(7, "dropped_file", "zzz")),
    ]
    .into_iter()
    .collect();
    InfoReport::build(&discovered, &applied)
}

#[test]
fn test_info_table() {
    colored::control::set_override(false);
    let table = render::info_table(&report());
    let lines: Vec<&str> = table.lines().collect();

    assert_eq!(lines[0], "Migration Info:");
    assert_eq!(lines[2], format!("{:<16} {:<25} {:<8} {}", "Version", "Name", "Valid", "Applied At"));
    assert_eq!(lines[4], format!("{:<16} {:<25} {:<8} {}", 1, "init", "YES", "2024-01-20 12:30:05"));
    assert_eq!(lines[5], format!("{:<16} {:<25} {:<8} {}", 2, "users", "CHANGED", "2024-01-20 12:30:05"));
    assert_eq!(lines[6], format!("{:<16} {:<25} {:<8} {}", 3, "orders", "NO", "-"));
    assert_eq!(lines[7], format!("{:<16} {:<25} {:<8} {}", 7, "dropped_file", "MISSING", "2024-01-20 12:30:05"));
    assert_eq!(lines.last().copied(), Some("2 applied, 1 pending, 1 changed, 1 missing"));
}

#[test]
fn test_info_json() {
    let json = render::info_json(&report()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["applied"], 2);
    assert_eq!(value["pending"], 1);
    assert_eq!(value["changed"], 1);
    assert_eq!(value["migrations"][1]["validity"], "applied-but-changed");
    assert_eq!(value["migrations"][1]["stored_checksum"], "bbb");
    assert!(value["migrations"][2]["applied_at"].is_null());
    assert_eq!(value["missing"][0]["version"], 7);
}

#[test]
fn test_plan() {
    let steps = vec![
        PlannedStep {
            direction: MigrationDirection::Up,
            migration: migration(2, "users", "b"),
        },
        PlannedStep {
            direction: MigrationDirection::Up,
            migration: migration(3, "orders", "c"),
        },
    ];
    assert_eq!(
        render::plan(&MigrationPlan { steps }, MigrationDirection::Up),
        "Would apply 2 migration(s):\n  1. 2_users\n  2. 3_orders"
    );

    assert_eq!(
        render::plan(&MigrationPlan::default(), MigrationDirection::Up),
        "No pending migrations to apply"
    );
    assert_eq!(
        render::plan(&MigrationPlan::default(), MigrationDirection::Down),
        "No migrations to roll back"
    );
}
