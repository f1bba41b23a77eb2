//! End-to-end tests of the migration engine on temporary directories
//!
//! Runs the public API against `MemoryDatabase`, so no server is needed.

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tidemark::migration::{
    calculate_checksum, discover_migrations, DownOutcome, ErrorKind, MemoryDatabase, MigrationError, MigrationFile,
    Migrator, Validity,
};

fn write_migration(dir: &Path, version: i64, name: &str) {
    fs::write(
        dir.join(format!("{version}_{name}.sql")),
        format!("-- +up\nCREATE TABLE {name} (id INT);\n\n-- +down\nDROP TABLE {name};\n"),
    )
    .unwrap();
}

fn migrations(versions: &[(i64, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (version, name) in versions {
        write_migration(dir.path(), *version, name);
    }
    dir
}

#[test]
fn up_twice_leaves_identical_history() {
    let dir = migrations(&[(1, "a"), (2, "b")]);
    let migrator = Migrator::new(dir.path());
    let db = MemoryDatabase::new();

    migrator.up(&db).unwrap();
    let after_first = db.history();
    migrator.up(&db).unwrap();

    assert_eq!(db.history(), after_first);
}

#[test]
fn fingerprint_is_deterministic_and_covers_down_section() {
    let dir = migrations(&[(1, "a")]);
    let path = dir.path().join("1_a.sql");

    let first = MigrationFile::from_path(&path).unwrap();
    let second = MigrationFile::from_path(&path).unwrap();
    assert_eq!(first.checksum, second.checksum);
    assert_eq!(first.checksum, calculate_checksum(&path).unwrap());

    let content = fs::read_to_string(&path).unwrap();
    fs::write(&path, content.replace("DROP TABLE a;", "DROP TABLE b;")).unwrap();
    let edited = MigrationFile::from_path(&path).unwrap();
    assert_ne!(edited.checksum, first.checksum);
    assert_eq!(edited.up_sql, first.up_sql);
}

#[test]
fn unsorted_files_apply_in_version_order() {
    let dir = migrations(&[(3, "c"), (1, "a"), (2, "b")]);
    let db = MemoryDatabase::new();

    Migrator::new(dir.path()).up(&db).unwrap();

    let order: Vec<i64> = db.executed().iter().map(|s| s.version).collect();
    assert_eq!(order, vec![1, 2, 3]);
}

#[test]
fn tampered_migration_blocks_everything_but_info() {
    let dir = migrations(&[(1, "a"), (2, "b"), (3, "c")]);
    let migrator = Migrator::new(dir.path());
    let db = MemoryDatabase::new();
    migrator.up_to(&db, 2).unwrap();

    fs::write(
        dir.path().join("2_b.sql"),
        "-- +up\nCREATE TABLE b (id BIGINT);\n\n-- +down\nDROP TABLE b;\n",
    )
    .unwrap();
    let executed_before = db.executed().len();

    assert_eq!(migrator.up(&db).unwrap_err().kind(), ErrorKind::Integrity);
    assert_eq!(migrator.up_to(&db, 3).unwrap_err().kind(), ErrorKind::Integrity);
    assert_eq!(migrator.down(&db).unwrap_err().kind(), ErrorKind::Integrity);
    assert_eq!(db.executed().len(), executed_before);

    let report = migrator.info(&db).unwrap();
    let validity: Vec<Validity> = report.entries.iter().map(|e| e.validity).collect();
    assert_eq!(
        validity,
        vec![Validity::AppliedAndMatching, Validity::AppliedButChanged, Validity::NotApplied]
    );
}

#[test]
fn up_to_applies_only_up_to_target() {
    let dir = migrations(&[(1, "a"), (2, "b"), (3, "c"), (4, "d")]);
    let migrator = Migrator::new(dir.path());
    let db = MemoryDatabase::new();
    migrator.up_to(&db, 1).unwrap();

    migrator.up_to(&db, 3).unwrap();
    assert_eq!(db.applied_versions(), vec![1, 2, 3]);

    let nothing = migrator.up_to(&db, 1).unwrap();
    assert!(nothing.applied.is_empty());
    assert_eq!(migrator.info(&db).unwrap().pending_count(), 1);
}

#[test]
fn down_removes_one_version_per_call() {
    let dir = migrations(&[(1, "a"), (2, "b"), (3, "c")]);
    let migrator = Migrator::new(dir.path());
    let db = MemoryDatabase::new();
    migrator.up(&db).unwrap();

    migrator.down(&db).unwrap();
    assert_eq!(db.applied_versions(), vec![1, 2]);
    migrator.down(&db).unwrap();
    assert_eq!(db.applied_versions(), vec![1]);
}

#[test]
fn down_fails_when_file_was_deleted() {
    let dir = migrations(&[(1, "a"), (2, "b")]);
    let migrator = Migrator::new(dir.path());
    let db = MemoryDatabase::new();
    migrator.up(&db).unwrap();
    let history = db.history();

    fs::remove_file(dir.path().join("2_b.sql")).unwrap();
    let err = migrator.down(&db).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::HistoryConsistency);
    assert!(matches!(err, MigrationError::MissingFile { version: 2, .. }));
    assert_eq!(db.history(), history);
}

#[test]
fn down_on_empty_history_is_nothing_to_roll_back() {
    let dir = migrations(&[(1, "a")]);
    let db = MemoryDatabase::new();

    let outcome = Migrator::new(dir.path()).down(&db).unwrap();
    assert_eq!(outcome, DownOutcome::NothingToRollBack);
}

#[test]
fn rollback_follows_renamed_file() {
    let dir = migrations(&[(1, "a"), (2, "old_name")]);
    let migrator = Migrator::new(dir.path());
    let db = MemoryDatabase::new();
    migrator.up(&db).unwrap();

    fs::rename(dir.path().join("2_old_name.sql"), dir.path().join("2_new_name.sql")).unwrap();

    match migrator.down(&db).unwrap() {
        DownOutcome::RolledBack(record) => assert_eq!(record.name, "old_name"),
        DownOutcome::NothingToRollBack => panic!("expected a rollback"),
    }
    assert_eq!(db.applied_versions(), vec![1]);
}

#[test]
fn malformed_directory_is_rejected_before_any_work() {
    let dir = migrations(&[(1, "a")]);
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
    fs::create_dir(dir.path().join("archive")).unwrap();
    assert_eq!(discover_migrations(dir.path()).unwrap().len(), 1);

    fs::write(dir.path().join("v2_b.sql"), "-- +up\n-- +down\n").unwrap();
    let db = MemoryDatabase::new();
    let err = Migrator::new(dir.path()).up(&db).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(db.applied_versions().is_empty());
}

#[test]
fn create_then_apply_generated_file() {
    let dir = tempfile::tempdir().unwrap();
    let migrator = Migrator::new(dir.path().join("migrations"));
    let db = MemoryDatabase::new();

    let created = migrator.create("add users").unwrap();
    let outcome = migrator.up(&db).unwrap();

    assert_eq!(outcome.applied.len(), 1);
    assert_eq!(outcome.applied[0].version, created.version);
    assert_eq!(outcome.applied[0].checksum, created.checksum);
}
