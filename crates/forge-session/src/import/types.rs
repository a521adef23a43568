//! The common shape every provider parser reduces a transcript file down
//! to, before the import pipeline persists it (spec.md §4.I "Import
//! pipeline").

use crate::models::TokenUsage;

/// A parsed transcript, not yet written to the database.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSession {
    pub provider_session_id: String,
    pub project_name: String,
    pub project_path: Option<String>,
    pub model: Option<String>,
    pub cwd: Option<String>,
    pub turns: Vec<ParsedTurn>,
}

/// A single user/assistant exchange within a [`ParsedSession`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedTurn {
    pub user_message: String,
    pub assistant_response: String,
    pub model: Option<String>,
    pub usage: TokenUsage,
    pub tools_used: Vec<String>,
}

/// Derive a title from the first user message, truncated to 100 chars on a
/// char boundary (spec.md §4.I, Provider A).
#[must_use]
pub fn infer_title(turns: &[ParsedTurn]) -> Option<String> {
    let first = turns.iter().find(|t| !t.user_message.trim().is_empty())?;
    let trimmed = first.user_message.trim();
    if trimmed.chars().count() <= 100 {
        Some(trimmed.to_string())
    } else {
        Some(trimmed.chars().take(100).collect())
    }
}
