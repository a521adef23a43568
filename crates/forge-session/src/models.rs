//! Row types for the session database (spec.md §4.I "Session DB entities").

use serde::{Deserialize, Serialize};

/// A provider-scoped grouping of sessions (e.g. one entry per working
/// directory a Claude/Codex/Gemini transcript was recorded under).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub provider: String,
    pub name: String,
    pub path: Option<String>,
    pub created_at: String,
}

/// A conversation container owning an ordered sequence of [`Turn`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project_id: Option<String>,
    pub provider: String,
    pub provider_session_id: String,
    pub title: Option<String>,
    pub model: Option<String>,
    pub cwd: Option<String>,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub turn_count: i64,
    pub total_cost_usd: f64,
}

/// Token counts for one turn, in the dimensions the cost model bills.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_read_tokens: i64,
}

/// A user+assistant message pair within a [`Session`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub session_id: String,
    pub turn_number: i64,
    pub user_message: String,
    pub assistant_response: String,
    pub model: Option<String>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_read_tokens: i64,
    pub cost_usd: f64,
    /// JSON array of tool names invoked during this turn.
    pub tools_used: String,
    pub created_at: String,
}

/// A tag that can be attached to sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

/// A per-MTok pricing row for a (provider, model-pattern) pair, time-scoped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub id: String,
    pub provider: String,
    /// A literal model name or a `LIKE` pattern (`%` wildcards).
    pub model_pattern: String,
    pub input_cost_per_mtok: f64,
    pub output_cost_per_mtok: f64,
    pub cache_read_cost_per_mtok: f64,
    pub effective_from: String,
    pub effective_until: Option<String>,
}

/// Mirrors a package's file-system install state for historical reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub version: String,
    pub installed_at: String,
}

/// One invocation of an installer/indexer run, for historical reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub package_id: Option<String>,
    pub kind: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub error: Option<String>,
}

/// A file produced or consumed by a [`Run`] (downloaded archive, extracted
/// tree, written lockfile).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub run_id: String,
    pub path: String,
    pub kind: String,
}

/// A historical snapshot of a package's lockfile content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockfileRecord {
    pub id: String,
    pub package_id: String,
    pub content: String,
    pub recorded_at: String,
}

/// An observability event recorded by any component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub id: String,
    pub timestamp: String,
    pub source: String,
    pub level: String,
    pub event_type: String,
    pub provider: Option<String>,
    pub session_id: Option<String>,
    pub terminal: Option<String>,
    pub duration_ms: Option<i64>,
    /// Arbitrary structured payload, stored as JSON text.
    pub payload: String,
}
