//! Parser for Gemini-style transcripts: `~/.gemini/tmp/<sessionId>/logs.json`
//! (spec.md §4.I "Provider C").

use std::path::Path;

use serde_json::Value;

use crate::error::{SessionError, SessionResult};
use crate::models::TokenUsage;

use super::types::{ParsedSession, ParsedTurn};

/// Walk every `<sessionId>/logs.json` file under `root` and parse each into
/// a [`ParsedSession`].
///
/// # Errors
///
/// Returns [`SessionError::Io`] if `root` cannot be read.
pub fn scan(root: &Path) -> SessionResult<Vec<ParsedSession>> {
    let mut sessions = Vec::new();
    if !root.is_dir() {
        return Ok(sessions);
    }

    for entry in std::fs::read_dir(root).map_err(|source| SessionError::Io {
        path: root.to_path_buf(),
        source,
    })? {
        let entry = entry.map_err(|source| SessionError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        let session_dir = entry.path();
        if !session_dir.is_dir() {
            continue;
        }
        let log_path = session_dir.join("logs.json");
        if !log_path.is_file() {
            continue;
        }
        let session_id = session_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        match parse_file(&log_path, &session_id) {
            Ok(session) => sessions.push(session),
            Err(e) => tracing::warn!(path = %log_path.display(), error = %e, "skipping unparseable Gemini transcript"),
        }
    }

    Ok(sessions)
}

fn parse_file(path: &Path, session_id: &str) -> SessionResult<ParsedSession> {
    let contents = std::fs::read_to_string(path).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: Value = serde_json::from_str(&contents).map_err(|e| SessionError::TranscriptParse {
        path: path.to_path_buf(),
        provider: "gemini",
        message: e.to_string(),
    })?;

    let entries: Vec<&Value> = match &doc {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map
            .get("messages")
            .and_then(Value::as_array)
            .map(|items| items.iter().collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let mut turns = Vec::new();
    let mut pending_user: Option<String> = None;
    let mut model: Option<String> = None;

    for entry in entries {
        let role = entry.get("role").and_then(Value::as_str).unwrap_or_default();
        let text = entry_text(entry);

        match role {
            "user" => pending_user = Some(text),
            "model" | "assistant" => {
                if let Some(m) = entry.get("model").and_then(Value::as_str) {
                    model = Some(m.to_string());
                }
                let usage = entry.get("usageMetadata");
                let token_usage = TokenUsage {
                    input_tokens: usage.and_then(|u| u.get("promptTokenCount")).and_then(Value::as_i64).unwrap_or(0),
                    output_tokens: usage
                        .and_then(|u| u.get("candidatesTokenCount"))
                        .and_then(Value::as_i64)
                        .unwrap_or(0),
                    cache_read_tokens: usage
                        .and_then(|u| u.get("cachedContentTokenCount"))
                        .and_then(Value::as_i64)
                        .unwrap_or(0),
                };
                turns.push(ParsedTurn {
                    user_message: pending_user.take().unwrap_or_default(),
                    assistant_response: text,
                    model: model.clone(),
                    usage: token_usage,
                    tools_used: Vec::new(),
                });
            }
            _ => {}
        }
    }

    Ok(ParsedSession {
        provider_session_id: session_id.to_string(),
        project_name: "gemini".to_string(),
        project_path: None,
        model,
        cwd: None,
        turns,
    })
}

fn entry_text(entry: &Value) -> String {
    if let Some(s) = entry.get("content").and_then(Value::as_str) {
        return s.to_string();
    }
    if let Some(parts) = entry.get("parts").and_then(Value::as_array) {
        return parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_array_shape_pairs_user_and_model_entries() {
        let dir = tempfile::tempdir().unwrap();
        let session_dir = dir.path().join("sess-1");
        std::fs::create_dir_all(&session_dir).unwrap();
        std::fs::write(
            session_dir.join("logs.json"),
            r#"[{"role":"user","content":"hi"},{"role":"model","content":"hello back","usageMetadata":{"promptTokenCount":5,"candidatesTokenCount":3}}]"#,
        )
        .unwrap();

        let sessions = scan(dir.path()).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].turns.len(), 1);
        assert_eq!(sessions[0].turns[0].user_message, "hi");
        assert_eq!(sessions[0].turns[0].assistant_response, "hello back");
        assert_eq!(sessions[0].turns[0].usage.input_tokens, 5);
    }

    #[test]
    fn wrapped_messages_shape_is_also_supported() {
        let dir = tempfile::tempdir().unwrap();
        let session_dir = dir.path().join("sess-2");
        std::fs::create_dir_all(&session_dir).unwrap();
        std::fs::write(
            session_dir.join("logs.json"),
            r#"{"messages":[{"role":"user","parts":[{"text":"hi"}]},{"role":"model","parts":[{"text":"hello"}]}]}"#,
        )
        .unwrap();

        let sessions = scan(dir.path()).unwrap();
        assert_eq!(sessions[0].turns[0].user_message, "hi");
        assert_eq!(sessions[0].turns[0].assistant_response, "hello");
    }
}
