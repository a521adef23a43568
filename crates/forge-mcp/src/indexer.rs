//! Sequential per-stack tool indexing and the on-disk tool-index cache
//! (spec.md §4.G "Tool indexing run").

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use forge_config::{FileSecretStore, ForgeConfig, SecretStore, StackConfig};
use forge_core::ForgePaths;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::McpStackClient;

/// One stack's outcome from an indexing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackIndexResult {
    /// The stack id that was indexed.
    pub stack_id: String,
    /// Tools discovered, empty when `error` is set.
    pub tools: Vec<forge_config::CachedTool>,
    /// Human-readable failure reason; absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The persisted `cache/tool-index.json` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolIndex {
    /// When this index was last refreshed.
    pub updated_at: chrono::DateTime<Utc>,
    /// Per-stack results, keyed by stack id.
    pub stacks: HashMap<String, StackIndexResult>,
}

/// Index every configured stack's MCP tool inventory, one subprocess spawn
/// at a time, and persist the result to `paths.tool_index_path()`.
///
/// A stack that fails to spawn, times out, or is missing a required secret
/// does not abort the run: its failure is recorded as a per-stack `error`
/// and the remaining stacks are still indexed.
///
/// # Errors
///
/// Returns an error only if the config document cannot be read or the
/// resulting index cannot be written.
pub async fn index_all(paths: &ForgePaths, config: &ForgeConfig) -> crate::error::McpResult<ToolIndex> {
    let secret_store = FileSecretStore::new(paths.secrets_path());
    let mut results = HashMap::new();

    for (stack_id, stack) in &config.stacks {
        let result = index_one(stack_id, stack, config, &secret_store).await;
        if let Some(error) = &result.error {
            warn!(stack = %stack_id, error, "stack indexing failed");
        } else {
            info!(stack = %stack_id, tool_count = result.tools.len(), "indexed stack");
        }
        results.insert(stack_id.clone(), result);
    }

    let index = ToolIndex {
        updated_at: Utc::now(),
        stacks: results,
    };
    write_index(paths, &index)?;
    Ok(index)
}

async fn index_one(
    stack_id: &str,
    stack: &StackConfig,
    config: &ForgeConfig,
    secret_store: &FileSecretStore,
) -> StackIndexResult {
    let failed = |error: String| StackIndexResult {
        stack_id: stack_id.to_string(),
        tools: Vec::new(),
        error: Some(error),
    };

    if !PathBuf::from(&stack.launch.bin).is_file() {
        return failed(format!("launch binary not found: {}", stack.launch.bin));
    }

    let mut missing = Vec::new();
    let mut env = HashMap::new();
    env.insert("PATH".to_string(), std::env::var("PATH").unwrap_or_default());
    for secret_ref in &stack.secrets {
        match secret_store.get(&secret_ref.name) {
            Ok(Some(value)) => {
                env.insert(secret_ref.name.clone(), value);
            }
            Ok(None) => {
                if secret_ref.required {
                    missing.push(secret_ref.name.clone());
                }
            }
            Err(e) => return failed(format!("failed to read secret {}: {e}", secret_ref.name)),
        }
    }
    if !missing.is_empty() {
        return failed(format!("missing required secrets: {}", missing.join(", ")));
    }

    prepend_runtime_paths(&mut env, config);

    let cwd = PathBuf::from(&stack.launch.cwd);
    let client = McpStackClient::spawn(&stack.launch.bin, &stack.launch.args, &cwd, &env);
    let mut client = match client {
        Ok(c) => c,
        Err(e) => return failed(e.to_string()),
    };

    let outcome = async {
        client.initialize().await?;
        client.list_tools().await
    }
    .await;

    client.shutdown().await;

    match outcome {
        Ok(tools) => StackIndexResult {
            stack_id: stack_id.to_string(),
            tools,
            error: None,
        },
        Err(e) => failed(e.to_string()),
    }
}

/// Prepend every installed runtime's `bin`-owning directory to `PATH`, so a
/// stack's `node`/`python` launch can resolve bundled runtimes before any
/// system install.
fn prepend_runtime_paths(env: &mut HashMap<String, String>, config: &ForgeConfig) {
    let mut dirs: Vec<String> = config
        .runtimes
        .values()
        .filter_map(|r| PathBuf::from(&r.bin).parent().map(|p| p.display().to_string()))
        .collect();
    if dirs.is_empty() {
        return;
    }
    let existing = env.get("PATH").cloned().unwrap_or_default();
    dirs.push(existing);
    env.insert("PATH".to_string(), dirs.join(":"));
}

fn write_index(paths: &ForgePaths, index: &ToolIndex) -> crate::error::McpResult<()> {
    let path = paths.tool_index_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_vec_pretty(index)
        .map_err(|e| crate::error::McpError::MalformedResponse(e.to_string()))?;
    std::fs::write(&tmp_path, &json)?;
    set_owner_only(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    set_owner_only(&path)?;
    Ok(())
}

fn set_owner_only(path: &std::path::Path) -> crate::error::McpResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_config::{CachedTool, LaunchConfig};

    fn test_config() -> ForgeConfig {
        let mut config = ForgeConfig::new(Utc::now());
        config.stacks.insert(
            "stack:missing-bin".to_string(),
            StackConfig {
                path: "/tmp/does-not-exist".to_string(),
                version: "1.0.0".to_string(),
                launch: LaunchConfig {
                    bin: "/tmp/does-not-exist/server".to_string(),
                    args: vec![],
                    cwd: "/tmp/does-not-exist".to_string(),
                },
                secrets: vec![],
                tools: None,
            },
        );
        config
    }

    #[tokio::test]
    async fn missing_launch_binary_is_recorded_as_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ForgePaths::from_root(dir.path());
        let config = test_config();

        let index = index_all(&paths, &config).await.unwrap();
        let result = &index.stacks["stack:missing-bin"];
        assert!(result.error.is_some());
        assert!(result.tools.is_empty());
    }

    #[test]
    fn prepend_runtime_paths_puts_bundled_dirs_first() {
        let mut config = ForgeConfig::new(Utc::now());
        config.runtimes.insert(
            "node".to_string(),
            forge_config::RuntimeConfig {
                path: "/home/.forge/runtimes/node".to_string(),
                bin: "/home/.forge/runtimes/node/bin/node".to_string(),
                version: "20.11.0".to_string(),
            },
        );
        let mut env = HashMap::new();
        env.insert("PATH".to_string(), "/usr/bin".to_string());
        prepend_runtime_paths(&mut env, &config);
        assert!(env["PATH"].starts_with("/home/.forge/runtimes/node/bin"));
        assert!(env["PATH"].ends_with("/usr/bin"));
    }

    #[test]
    fn tool_entry_round_trips_through_cached_tool() {
        let tool = CachedTool {
            name: "search".to_string(),
            description: "search".to_string(),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        let back: CachedTool = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "search");
    }
}
