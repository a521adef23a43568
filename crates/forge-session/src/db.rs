//! The process-singleton, lazily-created database connection (spec.md
//! §4.I "Engine" / §5 "Shared-resource policy").

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use forge_core::ForgePaths;
use rusqlite::Connection;

use crate::error::{SessionError, SessionResult};
use crate::schema;

static INSTANCE: OnceLock<Database> = OnceLock::new();

/// A cheaply-cloneable handle to the one connection this process holds
/// open against the session database. SQLite's WAL mode permits concurrent
/// readers, so callers only serialise on the writer path.
#[derive(Clone)]
pub struct Database(Arc<Mutex<Connection>>);

impl Database {
    /// Open (or create and migrate) the database at `paths.db_path()`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the `db/` directory cannot be created or
    /// the connection cannot be opened or migrated.
    pub fn open(paths: &ForgePaths) -> SessionResult<Self> {
        let conn = schema::open_and_migrate(&paths.db_path())?;
        Ok(Self(Arc::new(Mutex::new(conn))))
    }

    /// Lock the shared connection for the duration of a query or write.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::LockPoisoned`] if a prior holder panicked
    /// while holding the lock.
    pub fn lock(&self) -> SessionResult<MutexGuard<'_, Connection>> {
        self.0.lock().map_err(|_| SessionError::LockPoisoned)
    }
}

/// Return the process-wide [`Database`] handle, opening it on first call.
/// Subsequent calls (even with a different `paths`, which should not
/// happen within one process) return the already-open instance.
///
/// # Errors
///
/// Returns [`SessionError`] if the database cannot be opened on first
/// call.
pub fn shared(paths: &ForgePaths) -> SessionResult<Database> {
    if let Some(db) = INSTANCE.get() {
        return Ok(db.clone());
    }
    let db = Database::open(paths)?;
    // Another thread may have won the race; either way INSTANCE now holds
    // a valid, already-migrated connection.
    let _ = INSTANCE.set(db.clone());
    Ok(INSTANCE.get().cloned().unwrap_or(db))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_the_db_directory_and_migrates() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ForgePaths::from_root(dir.path().join("home"));
        let db = Database::open(&paths).unwrap();
        let conn = db.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'turns'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
