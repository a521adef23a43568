//! The observability log store (spec.md §4.I "Observability store").

use rusqlite::params;

use crate::db::Database;
use crate::error::SessionResult;
use crate::models::LogEvent;

/// Insert one observability event.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn store_log_event(db: &Database, event: &LogEvent) -> SessionResult<()> {
    let conn = db.lock()?;
    conn.execute(
        "INSERT INTO logs (id, timestamp, source, level, event_type, provider, session_id, terminal, duration_ms, payload) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            event.id,
            event.timestamp,
            event.source,
            event.level,
            event.event_type,
            event.provider,
            event.session_id,
            event.terminal,
            event.duration_ms,
            event.payload,
        ],
    )?;
    Ok(())
}

/// Filters accepted by [`query_logs`]. All fields are optional; an absent
/// filter matches every row.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub since: Option<String>,
    pub until: Option<String>,
    pub source: Option<String>,
    pub level: Option<String>,
    pub event_type: Option<String>,
    pub provider: Option<String>,
    pub session_id: Option<String>,
    pub terminal: Option<String>,
    /// Free-text substring match over the JSON payload.
    pub payload_contains: Option<String>,
    /// Only rows with `duration_ms >= threshold`.
    pub slow_threshold_ms: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

impl LogFilter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            limit: 100,
            ..Self::default()
        }
    }
}

/// Query the log store, ordered by `timestamp DESC`, paginated.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn query_logs(db: &Database, filter: &LogFilter) -> SessionResult<Vec<LogEvent>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    macro_rules! add_eq {
        ($column:literal, $value:expr) => {
            if let Some(v) = &$value {
                clauses.push(format!("{} = ?{}", $column, args.len() + 1));
                args.push(Box::new(v.clone()));
            }
        };
    }

    if let Some(since) = &filter.since {
        clauses.push(format!("timestamp >= ?{}", args.len() + 1));
        args.push(Box::new(since.clone()));
    }
    if let Some(until) = &filter.until {
        clauses.push(format!("timestamp <= ?{}", args.len() + 1));
        args.push(Box::new(until.clone()));
    }
    add_eq!("source", filter.source);
    add_eq!("level", filter.level);
    add_eq!("event_type", filter.event_type);
    add_eq!("provider", filter.provider);
    add_eq!("session_id", filter.session_id);
    add_eq!("terminal", filter.terminal);
    if let Some(needle) = &filter.payload_contains {
        clauses.push(format!("payload LIKE ?{}", args.len() + 1));
        args.push(Box::new(format!("%{needle}%")));
    }
    if let Some(threshold) = filter.slow_threshold_ms {
        clauses.push(format!("duration_ms >= ?{}", args.len() + 1));
        args.push(Box::new(threshold));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let limit_idx = args.len() + 1;
    let offset_idx = args.len() + 2;
    let sql = format!(
        "SELECT id, timestamp, source, level, event_type, provider, session_id, terminal, duration_ms, payload \
         FROM logs {where_clause} ORDER BY timestamp DESC LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    );
    args.push(Box::new(filter.limit));
    args.push(Box::new(filter.offset));

    let conn = db.lock()?;
    let mut stmt = conn.prepare(&sql)?;
    let arg_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(std::convert::AsRef::as_ref).collect();
    let rows = stmt
        .query_map(arg_refs.as_slice(), |row| {
            Ok(LogEvent {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                source: row.get(2)?,
                level: row.get(3)?,
                event_type: row.get(4)?,
                provider: row.get(5)?,
                session_id: row.get(6)?,
                terminal: row.get(7)?,
                duration_ms: row.get(8)?,
                payload: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Delete log rows older than `days` days.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn cleanup_old_logs(db: &Database, days: u32) -> SessionResult<usize> {
    let conn = db.lock()?;
    let deleted = conn.execute(
        "DELETE FROM logs WHERE timestamp < datetime('now', ?1)",
        params![format!("-{days} days")],
    )?;
    Ok(deleted)
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

    fn sample(id: &str, level: &str, duration_ms: Option<i64>) -> LogEvent {
        LogEvent {
            id: id.to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            source: "installer".to_string(),
            level: level.to_string(),
            event_type: "install".to_string(),
            provider: None,
            session_id: None,
            terminal: None,
            duration_ms,
            payload: r#"{"package":"demo"}"#.to_string(),
        }
    }

    #[test]
    fn query_logs_filters_on_level() {
        let (_dir, db) = test_db();
        store_log_event(&db, &sample("l1", "info", None)).unwrap();
        store_log_event(&db, &sample("l2", "error", None)).unwrap();

        let filter = LogFilter {
            level: Some("error".to_string()),
            ..LogFilter::new()
        };
        let rows = query_logs(&db, &filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "l2");
    }

    #[test]
    fn slow_only_filter_excludes_fast_events() {
        let (_dir, db) = test_db();
        store_log_event(&db, &sample("l1", "info", Some(10))).unwrap();
        store_log_event(&db, &sample("l2", "info", Some(5000))).unwrap();

        let filter = LogFilter {
            slow_threshold_ms: Some(1000),
            ..LogFilter::new()
        };
        let rows = query_logs(&db, &filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "l2");
    }

    #[test]
    fn cleanup_old_logs_deletes_rows_older_than_cutoff() {
        let (_dir, db) = test_db();
        {
            let conn = db.lock().unwrap();
            conn.execute(
                "INSERT INTO logs (id, timestamp, source, level, event_type, payload) VALUES ('old', datetime('now', '-30 days'), 's', 'info', 't', '{}')",
                [],
            )
            .unwrap();
        }
        store_log_event(&db, &sample("new", "info", None)).unwrap();

        let deleted = cleanup_old_logs(&db, 7).unwrap();
        assert_eq!(deleted, 1);
        let remaining = query_logs(&db, &LogFilter::new()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "new");
    }
}
