//! Schema DDL and migration runner (spec.md §4.I "Schema" / "Migrations").

use rusqlite::Connection;

use crate::error::{SessionError, SessionResult};

/// The schema version this build expects. Bump when adding a migration.
pub const SCHEMA_VERSION: i64 = 1;

const FULL_DDL: &str = r"
CREATE TABLE projects (
    id TEXT PRIMARY KEY,
    provider TEXT NOT NULL,
    name TEXT NOT NULL,
    path TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE sessions (
    id TEXT PRIMARY KEY,
    project_id TEXT REFERENCES projects(id) ON DELETE SET NULL,
    provider TEXT NOT NULL,
    provider_session_id TEXT NOT NULL,
    title TEXT,
    model TEXT,
    cwd TEXT,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    turn_count INTEGER NOT NULL DEFAULT 0,
    total_cost_usd REAL NOT NULL DEFAULT 0,
    UNIQUE(provider, provider_session_id)
);
CREATE INDEX idx_sessions_project ON sessions(project_id);

CREATE TABLE turns (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    turn_number INTEGER NOT NULL,
    user_message TEXT NOT NULL,
    assistant_response TEXT NOT NULL,
    model TEXT,
    input_tokens INTEGER NOT NULL DEFAULT 0,
    output_tokens INTEGER NOT NULL DEFAULT 0,
    cache_read_tokens INTEGER NOT NULL DEFAULT 0,
    cost_usd REAL NOT NULL DEFAULT 0,
    tools_used TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    UNIQUE(session_id, turn_number)
);
CREATE INDEX idx_turns_session ON turns(session_id);

CREATE VIRTUAL TABLE turns_fts USING fts5(
    user_message,
    assistant_response,
    content='turns',
    content_rowid='rowid'
);

CREATE TRIGGER turns_ai AFTER INSERT ON turns BEGIN
    INSERT INTO turns_fts(rowid, user_message, assistant_response)
    VALUES (new.rowid, new.user_message, new.assistant_response);
END;

CREATE TRIGGER turns_ad AFTER DELETE ON turns BEGIN
    INSERT INTO turns_fts(turns_fts, rowid, user_message, assistant_response)
    VALUES ('delete', old.rowid, old.user_message, old.assistant_response);
END;

CREATE TRIGGER turns_au AFTER UPDATE ON turns BEGIN
    INSERT INTO turns_fts(turns_fts, rowid, user_message, assistant_response)
    VALUES ('delete', old.rowid, old.user_message, old.assistant_response);
    INSERT INTO turns_fts(rowid, user_message, assistant_response)
    VALUES (new.rowid, new.user_message, new.assistant_response);
END;

CREATE TABLE tags (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE session_tags (
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (session_id, tag_id)
);

CREATE TABLE model_pricing (
    id TEXT PRIMARY KEY,
    provider TEXT NOT NULL,
    model_pattern TEXT NOT NULL,
    input_cost_per_mtok REAL NOT NULL,
    output_cost_per_mtok REAL NOT NULL,
    cache_read_cost_per_mtok REAL NOT NULL,
    effective_from TEXT NOT NULL,
    effective_until TEXT
);
CREATE INDEX idx_model_pricing_lookup ON model_pricing(provider, model_pattern);

CREATE TABLE packages (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    installed_at TEXT NOT NULL
);

CREATE TABLE package_deps (
    package_id TEXT NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
    depends_on_id TEXT NOT NULL,
    PRIMARY KEY (package_id, depends_on_id)
);

CREATE TABLE runs (
    id TEXT PRIMARY KEY,
    package_id TEXT REFERENCES packages(id) ON DELETE SET NULL,
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    error TEXT
);

CREATE TABLE artifacts (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    kind TEXT NOT NULL
);

CREATE TABLE lockfiles (
    id TEXT PRIMARY KEY,
    package_id TEXT NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE TABLE secrets_meta (
    name TEXT PRIMARY KEY,
    provider TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_used_at TEXT
);

CREATE TABLE logs (
    id TEXT PRIMARY KEY,
    timestamp TEXT NOT NULL,
    source TEXT NOT NULL,
    level TEXT NOT NULL,
    event_type TEXT NOT NULL,
    provider TEXT,
    session_id TEXT,
    terminal TEXT,
    duration_ms INTEGER,
    payload TEXT NOT NULL
);
CREATE INDEX idx_logs_timestamp ON logs(timestamp DESC);
";

/// One step of the migration table: the version it transforms the schema
/// *to*, its DDL/DML, and whether it can run inside a transaction (some
/// SQLite DDL, e.g. adding columns to a table with `FTS5` shadow tables,
/// cannot).
struct Migration {
    to_version: i64,
    sql: &'static str,
    transactional: bool,
}

/// Migrations beyond the initial DDL. Empty today — [`SCHEMA_VERSION`] is
/// still 1 — but the mechanism is exercised by every fresh-open of a v0
/// (i.e. brand-new) database, which runs [`FULL_DDL`] through this same
/// code path's sibling branch.
const MIGRATIONS: &[Migration] = &[];

/// Open (creating if absent) and bring the database at `path` up to
/// [`SCHEMA_VERSION`].
pub fn open_and_migrate(path: &std::path::Path) -> SessionResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| SessionError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let conn = Connection::open(path)?;
    apply_pragmas(&conn)?;

    let current_version = read_schema_version(&conn)?;
    match current_version {
        None => {
            conn.execute_batch(FULL_DDL)?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL)",
                [],
            )?;
            conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
                rusqlite::params![SCHEMA_VERSION],
            )?;
            tracing::info!(version = SCHEMA_VERSION, "initialized fresh session database");
        }
        Some(version) => {
            for migration in MIGRATIONS.iter().filter(|m| m.to_version > version && m.to_version <= SCHEMA_VERSION) {
                apply_migration(&conn, version, migration)?;
            }
        }
    }

    Ok(conn)
}

fn read_schema_version(conn: &Connection) -> SessionResult<Option<i64>> {
    let table_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
        [],
        |row| row.get(0),
    )?;
    if !table_exists {
        return Ok(None);
    }
    let version: i64 = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(Some(version))
}

fn apply_migration(conn: &Connection, from: i64, migration: &Migration) -> SessionResult<()> {
    let result = if migration.transactional {
        conn.execute_batch(&format!("BEGIN; {} COMMIT;", migration.sql))
    } else {
        conn.execute_batch(migration.sql)
    };
    result.map_err(|e| SessionError::MigrationFailed {
        from,
        to: migration.to_version,
        cause: e.to_string(),
    })?;
    conn.execute(
        "INSERT INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
        rusqlite::params![migration.to_version],
    )?;
    tracing::info!(from, to = migration.to_version, "applied session-database migration");
    Ok(())
}

fn apply_pragmas(conn: &Connection) -> SessionResult<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA cache_size = -65536;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_is_stamped_at_current_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_and_migrate(&dir.path().join("db").join("forge.db")).unwrap();
        let version: i64 = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0)).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn reopening_an_existing_database_does_not_rerun_ddl() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("db").join("forge.db");
        {
            let conn = open_and_migrate(&db_path).unwrap();
            conn.execute(
                "INSERT INTO projects (id, provider, name, path, created_at) VALUES ('p1', 'claude', 'demo', NULL, datetime('now'))",
                [],
            )
            .unwrap();
        }
        let conn = open_and_migrate(&db_path).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn fts_trigger_keeps_shadow_table_in_sync_on_insert_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_and_migrate(&dir.path().join("db").join("forge.db")).unwrap();
        conn.execute(
            "INSERT INTO sessions (id, provider, provider_session_id, started_at) VALUES ('s1', 'claude', 'prov-1', datetime('now'))",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO turns (id, session_id, turn_number, user_message, assistant_response, created_at) \
             VALUES ('t1', 's1', 1, 'hello world', 'hi there', datetime('now'))",
            [],
        )
        .unwrap();

        let matches: i64 = conn
            .query_row("SELECT COUNT(*) FROM turns_fts WHERE turns_fts MATCH 'hello'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(matches, 1);

        conn.execute("DELETE FROM turns WHERE id = 't1'", []).unwrap();
        let matches_after: i64 = conn
            .query_row("SELECT COUNT(*) FROM turns_fts WHERE turns_fts MATCH 'hello'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(matches_after, 0);
    }
}
