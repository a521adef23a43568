//! Historical mirror of file-system install state (spec.md §4.I "Session
//! DB entities": `Package`/`Run`/`Artifact`/`Lockfile`), written by the
//! installer for later reporting — this crate only owns persistence, not
//! when a record is captured.

use rusqlite::{params, OptionalExtension};

use crate::db::Database;
use crate::error::SessionResult;
use crate::models::{Artifact, LockfileRecord, PackageRecord, Run};

/// Insert or update a package's historical record.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn record_package(db: &Database, package: &PackageRecord) -> SessionResult<()> {
    let conn = db.lock()?;
    conn.execute(
        "INSERT INTO packages (id, kind, name, version, installed_at) VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT(id) DO UPDATE SET version = excluded.version, installed_at = excluded.installed_at",
        params![package.id, package.kind, package.name, package.version, package.installed_at],
    )?;
    Ok(())
}

/// Record a dependency edge discovered by the resolver.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn record_dependency(db: &Database, package_id: &str, depends_on_id: &str) -> SessionResult<()> {
    let conn = db.lock()?;
    conn.execute(
        "INSERT OR IGNORE INTO package_deps (package_id, depends_on_id) VALUES (?1, ?2)",
        params![package_id, depends_on_id],
    )?;
    Ok(())
}

/// Start a new run record, returning its id.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn start_run(db: &Database, package_id: Option<&str>, kind: &str) -> SessionResult<String> {
    let id = uuid::Uuid::new_v4().to_string();
    let conn = db.lock()?;
    conn.execute(
        "INSERT INTO runs (id, package_id, kind, status, started_at) VALUES (?1, ?2, ?3, 'running', datetime('now'))",
        params![id, package_id, kind],
    )?;
    Ok(id)
}

/// Mark a run finished, successfully or with `error`.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn finish_run(db: &Database, run_id: &str, error: Option<&str>) -> SessionResult<()> {
    let status = if error.is_some() { "failed" } else { "succeeded" };
    let conn = db.lock()?;
    conn.execute(
        "UPDATE runs SET status = ?2, finished_at = datetime('now'), error = ?3 WHERE id = ?1",
        params![run_id, status, error],
    )?;
    Ok(())
}

/// List runs for a package, most recent first.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn list_runs(db: &Database, package_id: &str) -> SessionResult<Vec<Run>> {
    let conn = db.lock()?;
    let mut stmt = conn.prepare(
        "SELECT id, package_id, kind, status, started_at, finished_at, error FROM runs \
         WHERE package_id = ?1 ORDER BY started_at DESC",
    )?;
    let rows = stmt
        .query_map(params![package_id], |row| {
            Ok(Run {
                id: row.get(0)?,
                package_id: row.get(1)?,
                kind: row.get(2)?,
                status: row.get(3)?,
                started_at: row.get(4)?,
                finished_at: row.get(5)?,
                error: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Record an artifact produced by a run.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn record_artifact(db: &Database, artifact: &Artifact) -> SessionResult<()> {
    let conn = db.lock()?;
    conn.execute(
        "INSERT INTO artifacts (id, run_id, path, kind) VALUES (?1, ?2, ?3, ?4)",
        params![artifact.id, artifact.run_id, artifact.path, artifact.kind],
    )?;
    Ok(())
}

/// Snapshot a package's lockfile content for historical diffing.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn snapshot_lockfile(db: &Database, package_id: &str, content: &str) -> SessionResult<String> {
    let id = uuid::Uuid::new_v4().to_string();
    let conn = db.lock()?;
    conn.execute(
        "INSERT INTO lockfiles (id, package_id, content, recorded_at) VALUES (?1, ?2, ?3, datetime('now'))",
        params![id, package_id, content],
    )?;
    Ok(id)
}

/// Fetch a package's historical record by id.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn get_package(db: &Database, id: &str) -> SessionResult<Option<PackageRecord>> {
    let conn = db.lock()?;
    let record = conn
        .query_row(
            "SELECT id, kind, name, version, installed_at FROM packages WHERE id = ?1",
            params![id],
            |row| {
                Ok(PackageRecord {
                    id: row.get(0)?,
                    kind: row.get(1)?,
                    name: row.get(2)?,
                    version: row.get(3)?,
                    installed_at: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

/// Fetch the lockfile snapshots most recently recorded for a package.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn latest_lockfile(db: &Database, package_id: &str) -> SessionResult<Option<LockfileRecord>> {
    let conn = db.lock()?;
    let record = conn
        .query_row(
            "SELECT id, package_id, content, recorded_at FROM lockfiles \
             WHERE package_id = ?1 ORDER BY recorded_at DESC LIMIT 1",
            params![package_id],
            |row| {
                Ok(LockfileRecord {
                    id: row.get(0)?,
                    package_id: row.get(1)?,
                    content: row.get(2)?,
                    recorded_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::ForgePaths;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&ForgePaths::from_root(dir.path())).unwrap();
        (dir, db)
    }

    #[test]
    fn record_package_upserts_on_conflict() {
        let (_dir, db) = test_db();
        let pkg = PackageRecord {
            id: "stack:demo".to_string(),
            kind: "stack".to_string(),
            name: "demo".to_string(),
            version: "1.0.0".to_string(),
            installed_at: "2026-01-01T00:00:00Z".to_string(),
        };
        record_package(&db, &pkg).unwrap();
        record_package(
            &db,
            &PackageRecord {
                version: "1.1.0".to_string(),
                ..pkg.clone()
            },
        )
        .unwrap();

        let fetched = get_package(&db, "stack:demo").unwrap().unwrap();
        assert_eq!(fetched.version, "1.1.0");
    }

    #[test]
    fn run_lifecycle_records_status_transitions() {
        let (_dir, db) = test_db();
        let run_id = start_run(&db, Some("stack:demo"), "install").unwrap();
        finish_run(&db, &run_id, None).unwrap();

        let runs = list_runs(&db, "stack:demo").unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, "succeeded");
    }

    #[test]
    fn latest_lockfile_returns_most_recent_snapshot() {
        let (_dir, db) = test_db();
        let pkg = PackageRecord {
            id: "stack:demo".to_string(),
            kind: "stack".to_string(),
            name: "demo".to_string(),
            version: "1.0.0".to_string(),
            installed_at: "2026-01-01T00:00:00Z".to_string(),
        };
        record_package(&db, &pkg).unwrap();
        snapshot_lockfile(&db, "stack:demo", "requires: {}").unwrap();
        let latest = latest_lockfile(&db, "stack:demo").unwrap().unwrap();
        assert_eq!(latest.content, "requires: {}");
    }
}
