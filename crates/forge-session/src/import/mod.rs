//! The transcript import pipeline (spec.md §4.I "Import pipeline" /
//! "Deduplication").

mod provider_a;
mod provider_b;
mod provider_c;
mod types;

use std::path::Path;

use serde::Serialize;

use crate::db::Database;
use crate::error::SessionResult;
use crate::models::{Session, Turn};
use crate::pricing::calculate_cost;
use crate::sessions::{insert_session, insert_turn, recompute_session_aggregates, session_exists, upsert_project};

pub use types::{ParsedSession, ParsedTurn};

/// Which provider's transcript format to import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Claude,
    Codex,
    Gemini,
}

impl Provider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::Codex => "codex",
            Provider::Gemini => "gemini",
        }
    }
}

/// Flags controlling the import pipeline (spec.md §4.I "Deduplication").
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Skip a transcript whose `(provider, provider_session_id)` is already
    /// in the database.
    pub skip_existing: bool,
    /// Skip transcripts with zero turns ("dead" sessions).
    pub skip_dead: bool,
    /// Derive a session title from the first user message when the
    /// transcript itself carries none.
    pub infer_titles: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            skip_existing: true,
            skip_dead: true,
            infer_titles: true,
        }
    }
}

/// Outcome of one `import_directory` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub imported_sessions: usize,
    pub imported_turns: usize,
    pub skipped_existing: usize,
    pub skipped_dead: usize,
    pub errors: Vec<String>,
}

/// Import every transcript found under `root` for `provider`, persisting
/// new sessions/turns and recomputing per-session cost aggregates.
///
/// # Errors
///
/// Returns [`crate::error::SessionError`] if the database cannot be
/// accessed. Per-transcript parse errors are recorded in the returned
/// [`ImportSummary`] rather than propagated, matching the tool indexer's
/// policy of never letting one bad input block the rest.
pub fn import_directory(db: &Database, provider: Provider, root: &Path, options: ImportOptions) -> SessionResult<ImportSummary> {
    let parsed = match provider {
        Provider::Claude => provider_a::scan(root)?,
        Provider::Codex => provider_b::scan(root)?,
        Provider::Gemini => provider_c::scan(root)?,
    };

    let mut summary = ImportSummary::default();
    for session in parsed {
        if options.skip_dead && session.turns.is_empty() {
            summary.skipped_dead += 1;
            continue;
        }
        if options.skip_existing && session_exists(db, provider.as_str(), &session.provider_session_id)? {
            summary.skipped_existing += 1;
            continue;
        }

        match persist_session(db, provider, &session, options) {
            Ok(turn_count) => {
                summary.imported_sessions += 1;
                summary.imported_turns += turn_count;
            }
            Err(e) => summary.errors.push(format!("{}: {e}", session.provider_session_id)),
        }
    }

    Ok(summary)
}

fn persist_session(db: &Database, provider: Provider, parsed: &ParsedSession, options: ImportOptions) -> SessionResult<usize> {
    let project_id = upsert_project(
        db,
        provider.as_str(),
        &parsed.project_name,
        parsed.project_path.as_deref(),
    )?;

    let title = options.infer_titles.then(|| types::infer_title(&parsed.turns)).flatten();
    let session_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    insert_session(
        db,
        &Session {
            id: session_id.clone(),
            project_id: Some(project_id),
            provider: provider.as_str().to_string(),
            provider_session_id: parsed.provider_session_id.clone(),
            title,
            model: parsed.model.clone(),
            cwd: parsed.cwd.clone(),
            started_at: now.clone(),
            ended_at: None,
            turn_count: 0,
            total_cost_usd: 0.0,
        },
    )?;

    for (i, turn) in parsed.turns.iter().enumerate() {
        let model = turn.model.clone().or_else(|| parsed.model.clone()).unwrap_or_default();
        let cost = calculate_cost(db, provider.as_str(), &model, turn.usage, &now)?;
        insert_turn(
            db,
            &Turn {
                id: uuid::Uuid::new_v4().to_string(),
                session_id: session_id.clone(),
                turn_number: (i + 1) as i64,
                user_message: turn.user_message.clone(),
                assistant_response: turn.assistant_response.clone(),
                model: Some(model),
                input_tokens: turn.usage.input_tokens,
                output_tokens: turn.usage.output_tokens,
                cache_read_tokens: turn.usage.cache_read_tokens,
                cost_usd: cost,
                tools_used: serde_json::to_string(&turn.tools_used).unwrap_or_else(|_| "[]".to_string()),
                created_at: now.clone(),
            },
        )?;
    }

    recompute_session_aggregates(db, &session_id)?;
    Ok(parsed.turns.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::ForgePaths;

    #[test]
    fn importing_claude_transcripts_dedups_on_second_pass() {
        let home = tempfile::tempdir().unwrap();
        let db = Database::open(&ForgePaths::from_root(home.path())).unwrap();

        let transcripts = tempfile::tempdir().unwrap();
        let project_dir = transcripts.path().join("demo-project");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(
            project_dir.join("sess-1.jsonl"),
            concat!(
                r#"{"type":"user","message":{"content":[{"type":"text","text":"hello there"}]}}"#,
                "\n",
                r#"{"type":"assistant","message":{"model":"claude-opus-5","content":[{"type":"text","text":"hi"}],"usage":{"input_tokens":10,"output_tokens":5,"cache_read_input_tokens":0}}}"#,
                "\n"
            ),
        )
        .unwrap();

        let options = ImportOptions::default();
        let first = import_directory(&db, Provider::Claude, transcripts.path(), options).unwrap();
        assert_eq!(first.imported_sessions, 1);
        assert_eq!(first.imported_turns, 1);
        assert!(first.errors.is_empty());

        let second = import_directory(&db, Provider::Claude, transcripts.path(), options).unwrap();
        assert_eq!(second.imported_sessions, 0);
        assert_eq!(second.skipped_existing, 1);
    }

    #[test]
    fn dead_sessions_are_skipped_when_skip_dead_is_set() {
        let home = tempfile::tempdir().unwrap();
        let db = Database::open(&ForgePaths::from_root(home.path())).unwrap();

        let transcripts = tempfile::tempdir().unwrap();
        let project_dir = transcripts.path().join("demo-project");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("sess-empty.jsonl"), "").unwrap();

        let summary = import_directory(&db, Provider::Claude, transcripts.path(), ImportOptions::default()).unwrap();
        assert_eq!(summary.imported_sessions, 0);
        assert_eq!(summary.skipped_dead, 1);
    }
}
