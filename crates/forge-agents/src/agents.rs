//! The fixed table of third-party AI-agent clients this registrar knows
//! how to write into (spec.md §4.H "Agent manifest").

use std::path::PathBuf;

use crate::error::{AgentError, AgentResult};

/// Which JSON key (or TOML table) an agent stores its MCP servers under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKey {
    /// A top-level JSON object keyed `mcpServers`.
    McpServers,
    /// A top-level JSON object keyed `context_servers` (Zed).
    ContextServers,
    /// A top-level JSON object keyed `servers` (VS Code).
    Servers,
    /// A top-level TOML table keyed `mcp_servers` (Codex).
    TomlMcpServers,
}

impl ServerKey {
    /// The literal key name used in the on-disk document.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ServerKey::McpServers => "mcpServers",
            ServerKey::TomlMcpServers => "mcp_servers",
            ServerKey::ContextServers => "context_servers",
            ServerKey::Servers => "servers",
        }
    }
}

/// On-disk format the agent's config file is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// A JSON document.
    Json,
    /// A restricted TOML subset (see [`crate::toml_doc`]).
    Toml,
}

/// Whether this agent's MCP entries need Anthropic's `type:"stdio"` quirk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// No quirks.
    Plain,
    /// Anthropic desktop/CLI clients: entries carry an explicit `type`.
    Anthropic,
}

/// A single known agent: identity, where it stores MCP servers, and how to
/// find its config file.
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    /// Stable identifier, e.g. `"claude-desktop"`.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// JSON key (or TOML table) this agent stores servers under.
    pub server_key: ServerKey,
    /// On-disk document format.
    pub format: ConfigFormat,
    /// Anthropic-family quirk flag.
    pub family: Family,
    /// Candidate config paths, checked in order; the first that exists is
    /// the agent's config file. When none exist, the agent is "not
    /// installed" and the first candidate is used as the write target.
    candidate_paths: fn() -> AgentResult<Vec<PathBuf>>,
}

impl AgentDescriptor {
    /// All candidate paths for this agent, most to least preferred.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NoHomeDirectory`] if the home directory cannot
    /// be resolved.
    pub fn candidate_paths(&self) -> AgentResult<Vec<PathBuf>> {
        (self.candidate_paths)()
    }

    /// The agent's config path: the first existing candidate, or the first
    /// candidate at all if none exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NoHomeDirectory`] if the home directory cannot
    /// be resolved.
    pub fn resolve_path(&self) -> AgentResult<PathBuf> {
        let candidates = self.candidate_paths()?;
        Ok(candidates
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .unwrap_or_else(|| candidates[0].clone()))
    }

    /// Whether any candidate path currently exists on disk.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NoHomeDirectory`] if the home directory cannot
    /// be resolved.
    pub fn is_installed(&self) -> AgentResult<bool> {
        Ok(self.candidate_paths()?.iter().any(|p| p.is_file()))
    }
}

fn home_dir() -> AgentResult<PathBuf> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| AgentError::NoHomeDirectory)
}

#[cfg(target_os = "macos")]
fn app_support(name: &str) -> AgentResult<PathBuf> {
    Ok(home_dir()?.join("Library/Application Support").join(name))
}

#[cfg(target_os = "windows")]
fn app_data(name: &str) -> AgentResult<PathBuf> {
    std::env::var("APPDATA")
        .map(|p| PathBuf::from(p).join(name))
        .map_err(|_| AgentError::NoHomeDirectory)
}

fn xdg_config(name: &str) -> AgentResult<PathBuf> {
    if let Ok(custom) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(custom).join(name));
    }
    Ok(home_dir()?.join(".config").join(name))
}

fn claude_desktop_paths() -> AgentResult<Vec<PathBuf>> {
    #[cfg(target_os = "macos")]
    {
        Ok(vec![app_support("Claude")?.join("claude_desktop_config.json")])
    }
    #[cfg(target_os = "windows")]
    {
        Ok(vec![app_data("Claude")?.join("claude_desktop_config.json")])
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Ok(vec![xdg_config("Claude")?.join("claude_desktop_config.json")])
    }
}

fn claude_code_paths() -> AgentResult<Vec<PathBuf>> {
    Ok(vec![home_dir()?.join(".claude.json")])
}

fn cursor_paths() -> AgentResult<Vec<PathBuf>> {
    Ok(vec![home_dir()?.join(".cursor/mcp.json")])
}

fn windsurf_paths() -> AgentResult<Vec<PathBuf>> {
    Ok(vec![home_dir()?.join(".codeium/windsurf/mcp_config.json")])
}

fn cline_paths() -> AgentResult<Vec<PathBuf>> {
    const SETTINGS_SUFFIX: &str =
        "globalStorage/saoudrizwan.claude-dev/settings/cline_mcp_settings.json";
    #[cfg(target_os = "macos")]
    {
        Ok(vec![app_support("Code/User")?.join(SETTINGS_SUFFIX)])
    }
    #[cfg(target_os = "windows")]
    {
        Ok(vec![app_data("Code/User")?.join(SETTINGS_SUFFIX)])
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Ok(vec![xdg_config("Code/User")?.join(SETTINGS_SUFFIX)])
    }
}

fn zed_paths() -> AgentResult<Vec<PathBuf>> {
    Ok(vec![xdg_config("zed")?.join("settings.json")])
}

fn vscode_paths() -> AgentResult<Vec<PathBuf>> {
    #[cfg(target_os = "macos")]
    {
        Ok(vec![app_support("Code/User")?.join("mcp.json")])
    }
    #[cfg(target_os = "windows")]
    {
        Ok(vec![app_data("Code/User")?.join("mcp.json")])
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Ok(vec![xdg_config("Code/User")?.join("mcp.json")])
    }
}

fn gemini_cli_paths() -> AgentResult<Vec<PathBuf>> {
    Ok(vec![home_dir()?.join(".gemini/settings.json")])
}

fn codex_cli_paths() -> AgentResult<Vec<PathBuf>> {
    Ok(vec![home_dir()?.join(".codex/config.toml")])
}

/// The fixed table of nine known agents.
#[must_use]
pub fn all_agents() -> Vec<AgentDescriptor> {
    vec![
        AgentDescriptor {
            id: "claude-desktop",
            name: "Claude Desktop",
            server_key: ServerKey::McpServers,
            format: ConfigFormat::Json,
            family: Family::Anthropic,
            candidate_paths: claude_desktop_paths,
        },
        AgentDescriptor {
            id: "claude-code",
            name: "Claude Code",
            server_key: ServerKey::McpServers,
            format: ConfigFormat::Json,
            family: Family::Anthropic,
            candidate_paths: claude_code_paths,
        },
        AgentDescriptor {
            id: "cursor",
            name: "Cursor",
            server_key: ServerKey::McpServers,
            format: ConfigFormat::Json,
            family: Family::Plain,
            candidate_paths: cursor_paths,
        },
        AgentDescriptor {
            id: "windsurf",
            name: "Windsurf",
            server_key: ServerKey::McpServers,
            format: ConfigFormat::Json,
            family: Family::Plain,
            candidate_paths: windsurf_paths,
        },
        AgentDescriptor {
            id: "cline",
            name: "Cline",
            server_key: ServerKey::McpServers,
            format: ConfigFormat::Json,
            family: Family::Plain,
            candidate_paths: cline_paths,
        },
        AgentDescriptor {
            id: "zed",
            name: "Zed",
            server_key: ServerKey::ContextServers,
            format: ConfigFormat::Json,
            family: Family::Plain,
            candidate_paths: zed_paths,
        },
        AgentDescriptor {
            id: "vscode",
            name: "VS Code / Copilot",
            server_key: ServerKey::Servers,
            format: ConfigFormat::Json,
            family: Family::Plain,
            candidate_paths: vscode_paths,
        },
        AgentDescriptor {
            id: "gemini-cli",
            name: "Gemini CLI",
            server_key: ServerKey::McpServers,
            format: ConfigFormat::Json,
            family: Family::Plain,
            candidate_paths: gemini_cli_paths,
        },
        AgentDescriptor {
            id: "codex",
            name: "Codex CLI",
            server_key: ServerKey::TomlMcpServers,
            format: ConfigFormat::Toml,
            family: Family::Plain,
            candidate_paths: codex_cli_paths,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_nine_agents_with_unique_ids() {
        let agents = all_agents();
        assert_eq!(agents.len(), 9);
        let mut ids: Vec<&str> = agents.iter().map(|a| a.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 9);
    }

    #[test]
    fn codex_is_the_only_toml_agent() {
        let toml_agents: Vec<&str> = all_agents()
            .iter()
            .filter(|a| a.format == ConfigFormat::Toml)
            .map(|a| a.id)
            .collect();
        assert_eq!(toml_agents, vec!["codex"]);
    }

    #[test]
    fn resolve_path_falls_back_to_first_candidate_when_nothing_exists() {
        // SAFETY: test runs single-threaded for env var mutation via serial harness default.
        unsafe { std::env::set_var("HOME", "/nonexistent-home-for-test") };
        let agents = all_agents();
        let cursor = agents.iter().find(|a| a.id == "cursor").unwrap();
        let path = cursor.resolve_path().unwrap();
        assert_eq!(path, PathBuf::from("/nonexistent-home-for-test/.cursor/mcp.json"));
        assert!(!cursor.is_installed().unwrap());
        unsafe { std::env::remove_var("HOME") };
    }
}
