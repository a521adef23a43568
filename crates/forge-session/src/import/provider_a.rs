//! Parser for Claude-style transcripts: `~/.claude/projects/<projectDir>/<sessionId>.jsonl`
//! (spec.md §4.I "Provider A").

use std::path::Path;

use serde_json::Value;

use crate::error::{SessionError, SessionResult};
use crate::models::TokenUsage;

use super::types::{ParsedSession, ParsedTurn};

/// Walk every `<projectDir>/<sessionId>.jsonl` file under `root` and parse
/// each into a [`ParsedSession`].
///
/// # Errors
///
/// Returns [`SessionError::Io`] if `root` cannot be read.
pub fn scan(root: &Path) -> SessionResult<Vec<ParsedSession>> {
    let mut sessions = Vec::new();
    if !root.is_dir() {
        return Ok(sessions);
    }

    for project_entry in std::fs::read_dir(root).map_err(|source| SessionError::Io {
        path: root.to_path_buf(),
        source,
    })? {
        let project_entry = project_entry.map_err(|source| SessionError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        let project_dir = project_entry.path();
        if !project_dir.is_dir() {
            continue;
        }
        let project_name = project_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        for file_entry in std::fs::read_dir(&project_dir).map_err(|source| SessionError::Io {
            path: project_dir.clone(),
            source,
        })? {
            let file_entry = file_entry.map_err(|source| SessionError::Io {
                path: project_dir.clone(),
                source,
            })?;
            let path = file_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            match parse_file(&path, &project_name) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unparseable Claude transcript");
                }
            }
        }
    }

    Ok(sessions)
}

fn parse_file(path: &Path, project_name: &str) -> SessionResult<ParsedSession> {
    let contents = std::fs::read_to_string(path).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let session_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();

    let mut turns = Vec::new();
    let mut pending_user: Option<String> = None;
    let mut model: Option<String> = None;
    let mut cwd: Option<String> = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(event) = serde_json::from_str::<Value>(line) else {
            continue;
        };

        if cwd.is_none() {
            cwd = event.get("cwd").and_then(Value::as_str).map(str::to_string);
        }

        match event.get("type").and_then(Value::as_str) {
            Some("user") => {
                let text = extract_text_parts(event.get("message").and_then(|m| m.get("content")));
                // Pure tool-result events carry no text parts; they are not
                // user turns.
                if !text.is_empty() {
                    pending_user = Some(text);
                }
            }
            Some("assistant") => {
                let message = event.get("message");
                let text = extract_text_parts(message.and_then(|m| m.get("content")));
                let tools_used = extract_tool_names(message.and_then(|m| m.get("content")));
                if let Some(m) = message.and_then(|m| m.get("model")).and_then(Value::as_str) {
                    model = Some(m.to_string());
                }

                let usage = message.and_then(|m| m.get("usage")).or_else(|| event.get("usage"));
                let token_usage = TokenUsage {
                    input_tokens: usage.and_then(|u| u.get("input_tokens")).and_then(Value::as_i64).unwrap_or(0),
                    output_tokens: usage.and_then(|u| u.get("output_tokens")).and_then(Value::as_i64).unwrap_or(0),
                    cache_read_tokens: usage
                        .and_then(|u| u.get("cache_read_input_tokens"))
                        .and_then(Value::as_i64)
                        .unwrap_or(0),
                };

                turns.push(ParsedTurn {
                    user_message: pending_user.take().unwrap_or_default(),
                    assistant_response: text,
                    model: model.clone(),
                    usage: token_usage,
                    tools_used,
                });
            }
            _ => {}
        }
    }

    Ok(ParsedSession {
        provider_session_id: session_id,
        project_name: project_name.to_string(),
        project_path: cwd.clone(),
        model,
        cwd,
        turns,
    })
}

/// Concatenate every `{"type":"text","text":...}` part of a content array,
/// skipping tool-result/tool-use parts.
fn extract_text_parts(content: Option<&Value>) -> String {
    let Some(parts) = content.and_then(Value::as_array) else {
        return content.and_then(Value::as_str).unwrap_or_default().to_string();
    };
    parts
        .iter()
        .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_tool_names(content: Option<&Value>) -> Vec<String> {
    let Some(parts) = content.and_then(Value::as_array) else {
        return Vec::new();
    };
    parts
        .iter()
        .filter(|p| p.get("type").and_then(Value::as_str) == Some("tool_use"))
        .filter_map(|p| p.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_user_and_assistant_events_into_turns() {
        let dir = tempfile::tempdir().unwrap();
        let project_dir = dir.path().join("-Users-dev-demo");
        std::fs::create_dir_all(&project_dir).unwrap();
        let transcript = project_dir.join("sess-123.jsonl");
        std::fs::write(
            &transcript,
            concat!(
                r#"{"type":"user","cwd":"/Users/dev/demo","message":{"content":[{"type":"text","text":"hello"}]}}"#,
                "\n",
                r#"{"type":"assistant","message":{"model":"claude-opus-5","content":[{"type":"text","text":"hi"},{"type":"tool_use","name":"Bash"}],"usage":{"input_tokens":10,"output_tokens":5,"cache_read_input_tokens":2}}}"#,
                "\n"
            ),
        )
        .unwrap();

        let sessions = scan(dir.path()).unwrap();
        assert_eq!(sessions.len(), 1);
        let session = &sessions[0];
        assert_eq!(session.provider_session_id, "sess-123");
        assert_eq!(session.turns.len(), 1);
        assert_eq!(session.turns[0].user_message, "hello");
        assert_eq!(session.turns[0].assistant_response, "hi");
        assert_eq!(session.turns[0].tools_used, vec!["Bash".to_string()]);
        assert_eq!(session.turns[0].usage.cache_read_tokens, 2);
    }

    #[test]
    fn tool_result_only_events_do_not_become_user_turns() {
        let dir = tempfile::tempdir().unwrap();
        let project_dir = dir.path().join("proj");
        std::fs::create_dir_all(&project_dir).unwrap();
        let transcript = project_dir.join("sess-1.jsonl");
        std::fs::write(
            &transcript,
            concat!(
                r#"{"type":"user","message":{"content":[{"type":"tool_result","content":"ok"}]}}"#,
                "\n",
                r#"{"type":"user","message":{"content":[{"type":"text","text":"real question"}]}}"#,
                "\n",
                r#"{"type":"assistant","message":{"content":[{"type":"text","text":"answer"}],"usage":{"input_tokens":1,"output_tokens":1,"cache_read_input_tokens":0}}}"#,
                "\n"
            ),
        )
        .unwrap();

        let sessions = scan(dir.path()).unwrap();
        assert_eq!(sessions[0].turns[0].user_message, "real question");
    }
}
