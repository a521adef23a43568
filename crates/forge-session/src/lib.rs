//! The embedded session database: schema migrations, provider transcript
//! import, full-text search, cost accounting, and an observability log
//! store (spec.md §4.I).

mod db;
mod error;
mod history;
mod import;
mod logs;
mod models;
mod pricing;
mod schema;
mod sessions;

pub use db::{shared, Database};
pub use error::{SessionError, SessionResult};
pub use history::{
    finish_run, get_package, latest_lockfile, list_runs, record_artifact, record_dependency, record_package,
    snapshot_lockfile, start_run,
};
pub use import::{import_directory, ImportOptions, ImportSummary, ParsedSession, ParsedTurn, Provider};
pub use logs::{cleanup_old_logs, query_logs, store_log_event, LogFilter};
pub use models::{
    Artifact, LockfileRecord, LogEvent, ModelPricing, PackageRecord, Project, Run, Session, Tag, TokenUsage, Turn,
};
pub use pricing::{calculate_cost, insert_pricing};
pub use schema::SCHEMA_VERSION;
pub use sessions::{
    get_project, get_session, insert_session, insert_turn, recompute_session_aggregates, search, session_exists,
    stats, upsert_project, SearchHit, SessionStats,
};
