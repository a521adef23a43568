//! Parser for Codex-style transcripts:
//! `~/.codex/sessions/YYYY/MM/DD/<uuid>.jsonl` (spec.md §4.I "Provider B").
//!
//! Token accounting prefers the incremental per-turn `last_token_usage`
//! over the session-wide running total the source also emits (see
//! DESIGN.md's Open Question decision for this provider).

use std::path::Path;

use serde_json::Value;

use crate::error::{SessionError, SessionResult};
use crate::models::TokenUsage;

use super::types::{ParsedSession, ParsedTurn};

/// Recursively walk `root` (the `YYYY/MM/DD` tree) for `.jsonl` files and
/// parse each into a [`ParsedSession`].
///
/// # Errors
///
/// Returns [`SessionError::Io`] if `root` cannot be read.
pub fn scan(root: &Path) -> SessionResult<Vec<ParsedSession>> {
    let mut sessions = Vec::new();
    walk(root, &mut sessions)?;
    Ok(sessions)
}

fn walk(dir: &Path, sessions: &mut Vec<ParsedSession>) -> SessionResult<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir).map_err(|source| SessionError::Io {
        path: dir.to_path_buf(),
        source,
    })? {
        let entry = entry.map_err(|source| SessionError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            walk(&path, sessions)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            match parse_file(&path) {
                Ok(session) => sessions.push(session),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unparseable Codex transcript"),
            }
        }
    }
    Ok(())
}

fn parse_file(path: &Path) -> SessionResult<ParsedSession> {
    let contents = std::fs::read_to_string(path).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let fallback_id = path.file_stem().and_then(|s| s.to_str()).unwrap_or("unknown").to_string();

    let mut session_id = fallback_id.clone();
    let mut model: Option<String> = None;
    let mut cwd: Option<String> = None;
    let mut turns = Vec::new();

    let mut pending_user: Option<String> = None;
    let mut pending_tools: Vec<String> = Vec::new();
    let mut pending_usage = TokenUsage::default();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(event) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let event_type = event.get("type").and_then(Value::as_str);
        let payload = event.get("payload");

        match event_type {
            Some("session_meta") => {
                if let Some(id) = payload.and_then(|p| p.get("id")).and_then(Value::as_str) {
                    session_id = id.to_string();
                }
                if let Some(m) = payload.and_then(|p| p.get("model")).and_then(Value::as_str) {
                    model = Some(m.to_string());
                }
                if let Some(c) = payload.and_then(|p| p.get("cwd")).and_then(Value::as_str) {
                    cwd = Some(c.to_string());
                }
            }
            Some("turn_context") => {
                if let Some(m) = payload.and_then(|p| p.get("model")).and_then(Value::as_str) {
                    model = Some(m.to_string());
                }
                if let Some(c) = payload.and_then(|p| p.get("cwd")).and_then(Value::as_str) {
                    cwd = Some(c.to_string());
                }
            }
            Some("event_msg") => {
                let Some(payload) = payload else { continue };
                match payload.get("type").and_then(Value::as_str) {
                    Some("user_message") => {
                        if let Some(text) = payload.get("message").and_then(Value::as_str) {
                            pending_user = Some(text.to_string());
                        }
                    }
                    Some("agent_message") => {
                        let text = payload.get("message").and_then(Value::as_str).unwrap_or_default();
                        turns.push(ParsedTurn {
                            user_message: pending_user.take().unwrap_or_default(),
                            assistant_response: text.to_string(),
                            model: model.clone(),
                            usage: std::mem::take(&mut pending_usage),
                            tools_used: std::mem::take(&mut pending_tools),
                        });
                    }
                    Some("function_call") => {
                        if let Some(name) = payload.get("name").and_then(Value::as_str) {
                            pending_tools.push(name.to_string());
                        }
                    }
                    Some("token_count") => {
                        if let Some(last) = payload.get("info").and_then(|i| i.get("last_token_usage")) {
                            pending_usage.input_tokens += last.get("input_tokens").and_then(Value::as_i64).unwrap_or(0);
                            pending_usage.output_tokens += last.get("output_tokens").and_then(Value::as_i64).unwrap_or(0);
                            pending_usage.cache_read_tokens +=
                                last.get("cached_input_tokens").and_then(Value::as_i64).unwrap_or(0);
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    Ok(ParsedSession {
        provider_session_id: session_id,
        project_name: cwd.clone().unwrap_or_else(|| "unknown".to_string()),
        project_path: cwd.clone(),
        model,
        cwd,
        turns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_token_usage_is_applied_to_the_turn_it_precedes() {
        let dir = tempfile::tempdir().unwrap();
        let day_dir = dir.path().join("2026/01/15");
        std::fs::create_dir_all(&day_dir).unwrap();
        let transcript = day_dir.join("abc-123.jsonl");
        std::fs::write(
            &transcript,
            concat!(
                r#"{"type":"session_meta","payload":{"id":"abc-123","model":"gpt-5-codex","cwd":"/repo"}}"#,
                "\n",
                r#"{"type":"event_msg","payload":{"type":"user_message","message":"fix the bug"}}"#,
                "\n",
                r#"{"type":"event_msg","payload":{"type":"function_call","name":"shell"}}"#,
                "\n",
                r#"{"type":"event_msg","payload":{"type":"token_count","info":{"last_token_usage":{"input_tokens":100,"output_tokens":40,"cached_input_tokens":10}}}}"#,
                "\n",
                r#"{"type":"event_msg","payload":{"type":"agent_message","message":"fixed"}}"#,
                "\n"
            ),
        )
        .unwrap();

        let sessions = scan(dir.path()).unwrap();
        assert_eq!(sessions.len(), 1);
        let session = &sessions[0];
        assert_eq!(session.provider_session_id, "abc-123");
        assert_eq!(session.turns.len(), 1);
        assert_eq!(session.turns[0].user_message, "fix the bug");
        assert_eq!(session.turns[0].assistant_response, "fixed");
        assert_eq!(session.turns[0].usage.input_tokens, 100);
        assert_eq!(session.turns[0].tools_used, vec!["shell".to_string()]);
    }
}
