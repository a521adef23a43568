//! Registers installed stacks as MCP servers into third-party AI-agent
//! client configs (Claude Desktop/Code, Cursor, Windsurf, Cline, Zed,
//! VS Code/Copilot, Gemini CLI, Codex CLI).

mod agents;
mod error;
mod mcp_entry;
mod registrar;
mod toml_doc;

pub use agents::{all_agents, AgentDescriptor, ConfigFormat, Family, ServerKey};
pub use error::{AgentError, AgentResult};
pub use mcp_entry::{apply_anthropic_quirk, build_mcp_config, McpEntry};
pub use registrar::{get_mcp_registration_summary, register_mcp_all, unregister_mcp_all, AgentOutcome};
