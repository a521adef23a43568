//! Registers/unregisters a stack's MCP entry across every installed agent,
//! and reports the current registration snapshot (spec.md §4.H
//! "Operations").
//!
//! Deliberately does not take the Config Store's advisory lock: these are
//! third-party files Forge does not own, and serializing concurrent
//! install/uninstall of the *same* stack is left to the caller.

use std::collections::HashMap;
use std::path::Path;

use forge_manifest::StackManifest;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::agents::{all_agents, AgentDescriptor, ConfigFormat, Family, ServerKey};
use crate::error::{AgentError, AgentResult};
use crate::mcp_entry::{apply_anthropic_quirk, build_mcp_config, McpEntry};
use crate::toml_doc::{TomlDocument, TomlValue};

/// Outcome of a single agent's registration/unregistration attempt.
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutcome {
    /// Whether the operation completed without error.
    pub success: bool,
    /// Set when the agent was not installed, or had no entry to remove.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    /// Human-readable reason, set alongside `skipped` or on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The config file touched (or that would have been touched).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    /// Set when the operation failed outright.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentOutcome {
    fn ok(config_path: &Path) -> Self {
        Self {
            success: true,
            skipped: None,
            reason: None,
            config_path: Some(config_path.display().to_string()),
            error: None,
        }
    }

    fn skipped(reason: &str) -> Self {
        Self {
            success: true,
            skipped: Some(true),
            reason: Some(reason.to_string()),
            config_path: None,
            error: None,
        }
    }

    fn failed(config_path: &Path, error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            skipped: None,
            reason: None,
            config_path: Some(config_path.display().to_string()),
            error: Some(error.to_string()),
        }
    }
}

/// Register `stack_id`'s MCP entry into every installed agent, optionally
/// restricted to `target_agents` (agent ids).
///
/// Returns one [`AgentOutcome`] per considered agent. A stack whose
/// manifest is not an MCP server (`build_mcp_config` returns `None`) yields
/// a `skipped` outcome for every agent without touching any file.
#[must_use]
pub fn register_mcp_all(
    stack_id: &str,
    install_path: &Path,
    manifest: &StackManifest,
    target_agents: Option<&[String]>,
) -> HashMap<String, AgentOutcome> {
    let mut entry = match build_mcp_config(manifest, install_path) {
        Some(entry) => entry,
        None => {
            return all_agents()
                .into_iter()
                .filter(|a| agent_selected(a, target_agents))
                .map(|a| (a.id.to_string(), AgentOutcome::skipped("Stack is not an MCP server")))
                .collect();
        }
    };

    all_agents()
        .into_iter()
        .filter(|a| agent_selected(a, target_agents))
        .map(|agent| {
            let mut entry = entry.clone();
            if agent.family == Family::Anthropic {
                apply_anthropic_quirk(&mut entry);
            }
            (agent.id.to_string(), register_one(&agent, stack_id, &entry))
        })
        .collect()
}

fn agent_selected(agent: &AgentDescriptor, target_agents: Option<&[String]>) -> bool {
    target_agents.is_none_or(|targets| targets.iter().any(|t| t == agent.id))
}

fn register_one(agent: &AgentDescriptor, stack_id: &str, entry: &McpEntry) -> AgentOutcome {
    let path = match agent.resolve_path() {
        Ok(p) => p,
        Err(e) => return AgentOutcome::failed(Path::new(agent.id), e),
    };
    if !agent.is_installed().unwrap_or(false) {
        return AgentOutcome::skipped("Agent not installed");
    }

    let result = match agent.format {
        ConfigFormat::Json => register_json(&path, agent.server_key, stack_id, entry),
        ConfigFormat::Toml => register_toml(&path, stack_id, entry),
    };

    match result {
        Ok(()) => {
            debug!(agent = agent.id, path = %path.display(), "registered MCP entry");
            AgentOutcome::ok(&path)
        }
        Err(e) => {
            warn!(agent = agent.id, path = %path.display(), error = %e, "failed to register MCP entry");
            AgentOutcome::failed(&path, e)
        }
    }
}

/// Symmetrical removal of `stack_id` from every installed agent.
#[must_use]
pub fn unregister_mcp_all(stack_id: &str, target_agents: Option<&[String]>) -> HashMap<String, AgentOutcome> {
    all_agents()
        .into_iter()
        .filter(|a| agent_selected(a, target_agents))
        .map(|agent| (agent.id.to_string(), unregister_one(&agent, stack_id)))
        .collect()
}

fn unregister_one(agent: &AgentDescriptor, stack_id: &str) -> AgentOutcome {
    let path = match agent.resolve_path() {
        Ok(p) => p,
        Err(e) => return AgentOutcome::failed(Path::new(agent.id), e),
    };
    if !path.is_file() {
        return AgentOutcome::skipped("Agent not installed");
    }

    let result = match agent.format {
        ConfigFormat::Json => unregister_json(&path, agent.server_key, stack_id),
        ConfigFormat::Toml => unregister_toml(&path, stack_id),
    };

    match result {
        Ok(true) => AgentOutcome::ok(&path),
        Ok(false) => AgentOutcome::skipped("No entry for this stack"),
        Err(e) => AgentOutcome::failed(&path, e),
    }
}

/// A snapshot of which agents currently carry an entry for `stack_id`
/// (or, when `stack_id` is `None`, which agents are installed at all),
/// without mutating anything.
#[must_use]
pub fn get_mcp_registration_summary(stack_id: Option<&str>) -> HashMap<String, AgentOutcome> {
    all_agents()
        .into_iter()
        .map(|agent| {
            let outcome = summarize_one(&agent, stack_id);
            (agent.id.to_string(), outcome)
        })
        .collect()
}

fn summarize_one(agent: &AgentDescriptor, stack_id: Option<&str>) -> AgentOutcome {
    let path = match agent.resolve_path() {
        Ok(p) => p,
        Err(e) => return AgentOutcome::failed(Path::new(agent.id), e),
    };
    if !path.is_file() {
        return AgentOutcome::skipped("Agent not installed");
    }
    let Some(stack_id) = stack_id else {
        return AgentOutcome::ok(&path);
    };

    let has_entry = match agent.format {
        ConfigFormat::Json => read_json(&path)
            .ok()
            .map(|doc| has_json_entry(&doc, agent.server_key, stack_id))
            .unwrap_or(false),
        ConfigFormat::Toml => read_toml(&path)
            .map(|doc| doc.has_table(&mcp_servers_path(stack_id)))
            .unwrap_or(false),
    };

    if has_entry {
        AgentOutcome::ok(&path)
    } else {
        AgentOutcome::skipped("No entry for this stack")
    }
}

fn has_json_entry(doc: &Value, server_key: ServerKey, stack_id: &str) -> bool {
    doc.get(server_key.as_str())
        .and_then(Value::as_object)
        .is_some_and(|servers| servers.contains_key(stack_id))
}

fn mcp_servers_path(stack_id: &str) -> Vec<String> {
    vec!["mcp_servers".to_string(), stack_id.to_string()]
}

// ---------------------------------------------------------------------
// JSON agents
// ---------------------------------------------------------------------

fn read_json(path: &Path) -> AgentResult<Value> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).map_err(|e| AgentError::Parse {
            path: path.to_path_buf(),
            format: "json",
            message: e.to_string(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Value::Object(Map::new())),
        Err(source) => Err(AgentError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_json(path: &Path, doc: &Value) -> AgentResult<()> {
    let json = serde_json::to_string_pretty(doc).map_err(|e| AgentError::Parse {
        path: path.to_path_buf(),
        format: "json",
        message: e.to_string(),
    })?;
    write_atomic(path, json.as_bytes())
}

fn register_json(path: &Path, server_key: ServerKey, stack_id: &str, entry: &McpEntry) -> AgentResult<()> {
    let mut doc = read_json(path)?;
    let entry_value = serde_json::to_value(entry).map_err(|e| AgentError::Parse {
        path: path.to_path_buf(),
        format: "json",
        message: e.to_string(),
    })?;
    let root = doc.as_object_mut().ok_or_else(|| AgentError::Parse {
        path: path.to_path_buf(),
        format: "json",
        message: "document root is not an object".to_string(),
    })?;
    root.entry(server_key.as_str())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| AgentError::Parse {
            path: path.to_path_buf(),
            format: "json",
            message: format!("{} is not an object", server_key.as_str()),
        })?
        .insert(stack_id.to_string(), entry_value);
    write_json(path, &doc)
}

fn unregister_json(path: &Path, server_key: ServerKey, stack_id: &str) -> AgentResult<bool> {
    let mut doc = read_json(path)?;
    let Some(root) = doc.as_object_mut() else {
        return Ok(false);
    };
    let Some(servers) = root.get_mut(server_key.as_str()).and_then(Value::as_object_mut) else {
        return Ok(false);
    };
    let removed = servers.remove(stack_id).is_some();
    if removed {
        write_json(path, &doc)?;
    }
    Ok(removed)
}

// ---------------------------------------------------------------------
// TOML agent (codex)
// ---------------------------------------------------------------------

fn read_toml(path: &Path) -> AgentResult<TomlDocument> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(TomlDocument::parse(&contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TomlDocument::default()),
        Err(source) => Err(AgentError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_toml(path: &Path, doc: &TomlDocument) -> AgentResult<()> {
    write_atomic(path, doc.render().as_bytes())
}

fn register_toml(path: &Path, stack_id: &str, entry: &McpEntry) -> AgentResult<()> {
    let mut doc = read_toml(path)?;
    let table_path = mcp_servers_path(stack_id);

    let mut entries = vec![
        ("command".to_string(), TomlValue::Str(entry.command.clone())),
        (
            "args".to_string(),
            TomlValue::Array(entry.args.clone()),
        ),
        ("cwd".to_string(), TomlValue::Str(entry.cwd.clone())),
    ];
    if let Some(entry_type) = &entry.entry_type {
        entries.push(("type".to_string(), TomlValue::Str(entry_type.clone())));
    }
    doc.set_table(&table_path, entries);

    if let Some(env) = &entry.env {
        let mut env_path = table_path.clone();
        env_path.push("env".to_string());
        let env_entries = env
            .iter()
            .map(|(k, v)| (k.clone(), TomlValue::Str(v.clone())))
            .collect();
        doc.set_table(&env_path, env_entries);
    }

    write_toml(path, &doc)
}

fn unregister_toml(path: &Path, stack_id: &str) -> AgentResult<bool> {
    let mut doc = read_toml(path)?;
    let removed = doc.remove_table(&mcp_servers_path(stack_id));
    if removed {
        write_toml(path, &doc)?;
    }
    Ok(removed)
}

// ---------------------------------------------------------------------

fn write_atomic(path: &Path, contents: &[u8]) -> AgentResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| AgentError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("tmp")
    ));
    std::fs::write(&tmp_path, contents).map_err(|source| AgentError::Io {
        path: tmp_path.clone(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| AgentError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_manifest::StackRequires;

    fn manifest() -> StackManifest {
        StackManifest {
            id: "stack:demo".to_string(),
            name: "demo".to_string(),
            version: "1.0.0".to_string(),
            requires: StackRequires::default(),
            inputs: serde_json::Value::Null,
            outputs: serde_json::Value::Null,
            entry: None,
            command: vec!["node".to_string(), "index.js".to_string()],
        }
    }

    #[test]
    fn register_json_inserts_entry_and_preserves_existing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"mcpServers":{"other":{"command":"x"}},"theme":"dark"}"#).unwrap();

        register_json(&path, ServerKey::McpServers, "demo", &McpEntry {
            command: "node".to_string(),
            args: vec!["index.js".to_string()],
            cwd: dir.path().display().to_string(),
            env: None,
            entry_type: None,
        })
        .unwrap();

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["theme"], "dark");
        assert_eq!(doc["mcpServers"]["other"]["command"], "x");
        assert_eq!(doc["mcpServers"]["demo"]["command"], "node");
    }

    #[test]
    fn unregister_json_removes_only_named_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"mcpServers":{"demo":{"command":"node"},"other":{"command":"x"}}}"#,
        )
        .unwrap();

        let removed = unregister_json(&path, ServerKey::McpServers, "demo").unwrap();
        assert!(removed);

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(doc["mcpServers"].get("demo").is_none());
        assert_eq!(doc["mcpServers"]["other"]["command"], "x");
    }

    #[test]
    fn unregister_json_missing_entry_is_a_noop_skip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"mcpServers":{}}"#).unwrap();
        let removed = unregister_json(&path, ServerKey::McpServers, "demo").unwrap();
        assert!(!removed);
    }

    #[test]
    fn register_toml_writes_under_mcp_servers_dotted_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        register_toml(&path, "demo", &McpEntry {
            command: "node".to_string(),
            args: vec!["index.js".to_string()],
            cwd: "/install/demo".to_string(),
            env: Some(HashMap::from([("KEY".to_string(), "v".to_string())])),
            entry_type: None,
        })
        .unwrap();

        let rendered = std::fs::read_to_string(&path).unwrap();
        assert!(rendered.contains("[mcp_servers.demo]"));
        assert!(rendered.contains("command = \"node\""));
        assert!(rendered.contains("[mcp_servers.demo.env]"));
        assert!(rendered.contains("KEY = \"v\""));
    }

    #[test]
    fn build_mcp_config_none_yields_skip_for_every_agent() {
        let mut m = manifest();
        m.command.clear();
        let outcomes = register_mcp_all("stack:demo", Path::new("/install/demo"), &m, None);
        assert!(outcomes.values().all(|o| o.skipped == Some(true)));
    }
}
