//! Project/session/turn persistence and full-text search (spec.md §4.I
//! "Search").

use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use crate::db::Database;
use crate::error::SessionResult;
use crate::models::{Project, Session, Turn};

/// Find an existing project by `(provider, name)`, or create one.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn upsert_project(db: &Database, provider: &str, name: &str, path: Option<&str>) -> SessionResult<String> {
    let conn = db.lock()?;
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM projects WHERE provider = ?1 AND name = ?2",
            params![provider, name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO projects (id, provider, name, path, created_at) VALUES (?1, ?2, ?3, ?4, datetime('now'))",
        params![id, provider, name, path],
    )?;
    Ok(id)
}

/// Fetch a project by id.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error, including
/// when no row matches.
pub fn get_project(db: &Database, id: &str) -> SessionResult<Project> {
    let conn = db.lock()?;
    let project = conn.query_row(
        "SELECT id, provider, name, path, created_at FROM projects WHERE id = ?1",
        params![id],
        |row| {
            Ok(Project {
                id: row.get(0)?,
                provider: row.get(1)?,
                name: row.get(2)?,
                path: row.get(3)?,
                created_at: row.get(4)?,
            })
        },
    )?;
    Ok(project)
}

/// Whether a session with `(provider, provider_session_id)` already exists.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn session_exists(db: &Database, provider: &str, provider_session_id: &str) -> SessionResult<bool> {
    let conn = db.lock()?;
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sessions WHERE provider = ?1 AND provider_session_id = ?2",
        params![provider, provider_session_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Insert a session row.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn insert_session(db: &Database, session: &Session) -> SessionResult<()> {
    let conn = db.lock()?;
    conn.execute(
        "INSERT INTO sessions (id, project_id, provider, provider_session_id, title, model, cwd, started_at, ended_at, turn_count, total_cost_usd) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            session.id,
            session.project_id,
            session.provider,
            session.provider_session_id,
            session.title,
            session.model,
            session.cwd,
            session.started_at,
            session.ended_at,
            session.turn_count,
            session.total_cost_usd,
        ],
    )?;
    Ok(())
}

/// Insert a turn row.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn insert_turn(db: &Database, turn: &Turn) -> SessionResult<()> {
    let conn = db.lock()?;
    conn.execute(
        "INSERT INTO turns (id, session_id, turn_number, user_message, assistant_response, model, input_tokens, output_tokens, cache_read_tokens, cost_usd, tools_used, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            turn.id,
            turn.session_id,
            turn.turn_number,
            turn.user_message,
            turn.assistant_response,
            turn.model,
            turn.input_tokens,
            turn.output_tokens,
            turn.cache_read_tokens,
            turn.cost_usd,
            turn.tools_used,
            turn.created_at,
        ],
    )?;
    Ok(())
}

/// Recompute and persist `turn_count`/`total_cost_usd` for `session_id`.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn recompute_session_aggregates(db: &Database, session_id: &str) -> SessionResult<()> {
    let conn = db.lock()?;
    conn.execute(
        "UPDATE sessions SET \
            turn_count = (SELECT COUNT(*) FROM turns WHERE session_id = ?1), \
            total_cost_usd = (SELECT COALESCE(SUM(cost_usd), 0) FROM turns WHERE session_id = ?1) \
         WHERE id = ?1",
        params![session_id],
    )?;
    Ok(())
}

/// Fetch a session by id.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error, including
/// when no row matches.
pub fn get_session(db: &Database, id: &str) -> SessionResult<Session> {
    let conn = db.lock()?;
    let session = conn.query_row(
        "SELECT id, project_id, provider, provider_session_id, title, model, cwd, started_at, ended_at, turn_count, total_cost_usd \
         FROM sessions WHERE id = ?1",
        params![id],
        row_to_session,
    )?;
    Ok(session)
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        project_id: row.get(1)?,
        provider: row.get(2)?,
        provider_session_id: row.get(3)?,
        title: row.get(4)?,
        model: row.get(5)?,
        cwd: row.get(6)?,
        started_at: row.get(7)?,
        ended_at: row.get(8)?,
        turn_count: row.get(9)?,
        total_cost_usd: row.get(10)?,
    })
}

/// One matched turn in a [`search`] result, with `<b>`-wrapped highlights.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub session_id: String,
    pub turn_id: String,
    pub session_title: Option<String>,
    pub user_highlight: String,
    pub assistant_highlight: String,
    pub rank: f64,
}

/// Sanitize a raw search query into whitespace-separated, prefix-matched
/// FTS5 terms (spec.md §4.I "Search"): strips quoting, parens, dashes,
/// stars before tokenising.
fn sanitize_query(q: &str) -> Vec<String> {
    q.chars()
        .filter(|c| !matches!(c, '"' | '\'' | '(' | ')' | '-' | '*'))
        .collect::<String>()
        .split_whitespace()
        .map(|tok| format!("\"{tok}\"*"))
        .collect()
}

/// Full-text search over turn content, ranked by `bm25()`. Falls back to a
/// `LIKE '%q%'` scan over raw columns if the FTS5 query itself errors
/// (malformed after sanitisation, or the FTS index is otherwise
/// unavailable).
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn search(db: &Database, q: &str) -> SessionResult<Vec<SearchHit>> {
    let terms = sanitize_query(q);
    if terms.is_empty() {
        return Ok(Vec::new());
    }
    let match_expr = terms.join(" ");

    let conn = db.lock()?;
    let fts_result = run_fts_search(&conn, &match_expr);
    match fts_result {
        Ok(hits) => Ok(hits),
        Err(e) => {
            tracing::warn!(error = %e, "FTS5 search failed, falling back to LIKE scan");
            run_like_fallback(&conn, q)
        }
    }
}

fn run_fts_search(conn: &rusqlite::Connection, match_expr: &str) -> rusqlite::Result<Vec<SearchHit>> {
    let mut stmt = conn.prepare(
        "SELECT t.session_id, t.id, s.title, \
                highlight(turns_fts, 0, '<b>', '</b>'), \
                highlight(turns_fts, 1, '<b>', '</b>'), \
                bm25(turns_fts) \
         FROM turns_fts \
         JOIN turns t ON t.rowid = turns_fts.rowid \
         JOIN sessions s ON s.id = t.session_id \
         WHERE turns_fts MATCH ?1 \
         ORDER BY bm25(turns_fts)",
    )?;
    let rows = stmt.query_map(params![match_expr], |row| {
        Ok(SearchHit {
            session_id: row.get(0)?,
            turn_id: row.get(1)?,
            session_title: row.get(2)?,
            user_highlight: row.get(3)?,
            assistant_highlight: row.get(4)?,
            rank: row.get(5)?,
        })
    })?;
    rows.collect()
}

fn run_like_fallback(conn: &rusqlite::Connection, q: &str) -> SessionResult<Vec<SearchHit>> {
    let pattern = format!("%{q}%");
    let mut stmt = conn.prepare(
        "SELECT t.session_id, t.id, s.title, t.user_message, t.assistant_response \
         FROM turns t JOIN sessions s ON s.id = t.session_id \
         WHERE t.user_message LIKE ?1 OR t.assistant_response LIKE ?1",
    )?;
    let rows = stmt
        .query_map(params![pattern], |row| {
            Ok(SearchHit {
                session_id: row.get(0)?,
                turn_id: row.get(1)?,
                session_title: row.get(2)?,
                user_highlight: row.get(3)?,
                assistant_highlight: row.get(4)?,
                rank: 0.0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Aggregate statistics across the whole database.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub total_sessions: i64,
    pub total_turns: i64,
    pub total_cost_usd: f64,
}

/// Compute aggregate statistics (`forge sessions stats`).
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] on a database error.
pub fn stats(db: &Database) -> SessionResult<SessionStats> {
    let conn = db.lock()?;
    let total_sessions: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
    let total_turns: i64 = conn.query_row("SELECT COUNT(*) FROM turns", [], |row| row.get(0))?;
    let total_cost_usd: f64 = conn.query_row("SELECT COALESCE(SUM(total_cost_usd), 0) FROM sessions", [], |row| row.get(0))?;
    Ok(SessionStats {
        total_sessions,
        total_turns,
        total_cost_usd,
    })
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

    fn sample_session(id: &str, provider_session_id: &str) -> Session {
        Session {
            id: id.to_string(),
            project_id: None,
            provider: "claude".to_string(),
            provider_session_id: provider_session_id.to_string(),
            title: Some("demo".to_string()),
            model: Some("claude-opus-5".to_string()),
            cwd: None,
            started_at: "2026-01-01T00:00:00Z".to_string(),
            ended_at: None,
            turn_count: 0,
            total_cost_usd: 0.0,
        }
    }

    #[test]
    fn upsert_project_is_idempotent_by_provider_and_name() {
        let (_dir, db) = test_db();
        let id1 = upsert_project(&db, "claude", "demo", None).unwrap();
        let id2 = upsert_project(&db, "claude", "demo", None).unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn search_finds_turns_containing_every_token() {
        let (_dir, db) = test_db();
        insert_session(&db, &sample_session("s1", "p1")).unwrap();
        insert_turn(
            &db,
            &Turn {
                id: "t1".to_string(),
                session_id: "s1".to_string(),
                turn_number: 1,
                user_message: "how do I fix the rust borrow checker".to_string(),
                assistant_response: "use a reference".to_string(),
                model: None,
                input_tokens: 0,
                output_tokens: 0,
                cache_read_tokens: 0,
                cost_usd: 0.0,
                tools_used: "[]".to_string(),
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();

        let hits = search(&db, "borrow checker").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].session_id, "s1");
    }

    #[test]
    fn search_with_no_matches_returns_empty() {
        let (_dir, db) = test_db();
        insert_session(&db, &sample_session("s1", "p1")).unwrap();
        let hits = search(&db, "nonexistent term").unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn recompute_session_aggregates_sums_turn_costs() {
        let (_dir, db) = test_db();
        insert_session(&db, &sample_session("s1", "p1")).unwrap();
        for i in 1..=2 {
            insert_turn(
                &db,
                &Turn {
                    id: format!("t{i}"),
                    session_id: "s1".to_string(),
                    turn_number: i,
                    user_message: "q".to_string(),
                    assistant_response: "a".to_string(),
                    model: None,
                    input_tokens: 0,
                    output_tokens: 0,
                    cache_read_tokens: 0,
                    cost_usd: 1.5,
                    tools_used: "[]".to_string(),
                    created_at: "2026-01-01T00:00:00Z".to_string(),
                },
            )
            .unwrap();
        }
        recompute_session_aggregates(&db, "s1").unwrap();
        let session = get_session(&db, "s1").unwrap();
        assert_eq!(session.turn_count, 2);
        assert!((session.total_cost_usd - 3.0).abs() < 1e-9);
    }
}
