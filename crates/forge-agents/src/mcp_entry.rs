//! Derives a third-party agent's MCP server entry from a stack's manifest
//! (spec.md §4.H "MCP config construction").

use std::collections::HashMap;
use std::path::Path;

use forge_manifest::StackManifest;
use serde::Serialize;

/// A resolved MCP server launch entry, ready to be inserted under an
/// agent's server key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct McpEntry {
    /// The executable to spawn.
    pub command: String,
    /// Arguments, with path-like entries already rewritten absolute.
    pub args: Vec<String>,
    /// Working directory (the stack's install directory).
    pub cwd: String,
    /// Environment variables parsed from the stack's `.env` file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    /// Present only for Anthropic-family agents (`"stdio"`).
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<String>,
}

/// Build the MCP entry for `manifest`, installed at `install_path`.
///
/// Returns `None` when the manifest declares neither a `command` array nor
/// a legacy `entry` string — such a stack is not an MCP server and the
/// registration operation should skip it silently.
#[must_use]
pub fn build_mcp_config(manifest: &StackManifest, install_path: &Path) -> Option<McpEntry> {
    let raw_command = if !manifest.command.is_empty() {
        manifest.command.clone()
    } else if let Some(entry) = &manifest.entry {
        vec![entry.clone()]
    } else {
        return None;
    };

    let (command, args) = rewrite_command(&raw_command, install_path);
    let (command, args) = optimize_compiled_entry(command, args, install_path);
    let env = read_dot_env(install_path);

    Some(McpEntry {
        command,
        args,
        cwd: install_path.display().to_string(),
        env,
        entry_type: None,
    })
}

/// `command[0]` is the executable; the remainder are arguments. Any
/// argument that "looks path-like" and is not already absolute is rewritten
/// against `install_path`.
fn rewrite_command(raw: &[String], install_path: &Path) -> (String, Vec<String>) {
    let command = raw.first().cloned().unwrap_or_default();
    let args = raw
        .iter()
        .skip(1)
        .map(|arg| {
            if looks_path_like(arg) && !Path::new(arg).is_absolute() {
                install_path.join(arg).display().to_string()
            } else {
                arg.clone()
            }
        })
        .collect();
    (command, args)
}

fn looks_path_like(s: &str) -> bool {
    s.starts_with('.') || s.contains('/') || s.contains('\\')
}

/// When `npx tsx <source>.ts` is invoked and a compiled `dist/X.js` sibling
/// exists, prefer launching the compiled file directly with `node` — a
/// measurable startup-time win over re-transpiling on every spawn.
fn optimize_compiled_entry(command: String, args: Vec<String>, install_path: &Path) -> (String, Vec<String>) {
    if command != "npx" || !args.iter().any(|a| a == "tsx") {
        return (command, args);
    }
    let Some(source) = args.iter().find(|a| a.ends_with(".ts")) else {
        return (command, args);
    };

    let relative_ts = Path::new(source)
        .strip_prefix(install_path)
        .unwrap_or(Path::new(source));
    let Some(file_name) = relative_ts.file_stem().and_then(|s| s.to_str()) else {
        return (command, args);
    };

    let compiled = install_path.join("dist").join(format!("{file_name}.js"));
    if compiled.is_file() {
        ("node".to_string(), vec![compiled.display().to_string()])
    } else {
        (command, args)
    }
}

/// Parse a stack's `.env` file (`KEY=VALUE`, optional quoting, `#`
/// comments); only non-empty values become environment entries.
fn read_dot_env(install_path: &Path) -> Option<HashMap<String, String>> {
    let contents = std::fs::read_to_string(install_path.join(".env")).ok()?;
    let mut values = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, raw_value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = unquote(raw_value.trim());
        if !value.is_empty() {
            values.insert(key.to_string(), value);
        }
    }
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

/// Apply Anthropic's `type:"stdio"` quirk to an already-built entry.
pub fn apply_anthropic_quirk(entry: &mut McpEntry) {
    entry.entry_type = Some("stdio".to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_manifest::StackRequires;

    fn manifest(command: Vec<&str>, entry: Option<&str>) -> StackManifest {
        StackManifest {
            id: "stack:demo".to_string(),
            name: "demo".to_string(),
            version: "1.0.0".to_string(),
            requires: StackRequires::default(),
            inputs: serde_json::Value::Null,
            outputs: serde_json::Value::Null,
            entry: entry.map(str::to_string),
            command: command.into_iter().map(str::to_string).collect(),
        }
    }

    #[test]
    fn no_command_and_no_entry_returns_none() {
        let m = manifest(vec![], None);
        assert!(build_mcp_config(&m, Path::new("/install")).is_none());
    }

    #[test]
    fn legacy_entry_string_becomes_single_element_command() {
        let m = manifest(vec![], Some("./server.js"));
        let entry = build_mcp_config(&m, Path::new("/install")).unwrap();
        assert_eq!(entry.command, "./server.js");
        assert!(entry.args.is_empty());
    }

    #[test]
    fn relative_path_like_args_are_rewritten_absolute() {
        let m = manifest(vec!["node", "dist/index.js"], None);
        let entry = build_mcp_config(&m, Path::new("/install/demo")).unwrap();
        assert_eq!(entry.command, "node");
        assert_eq!(entry.args, vec!["/install/demo/dist/index.js"]);
    }

    #[test]
    fn non_path_like_args_pass_through_unchanged() {
        let m = manifest(vec!["python3", "-u", "server"], None);
        let entry = build_mcp_config(&m, Path::new("/install/demo")).unwrap();
        assert_eq!(entry.args, vec!["-u", "server"]);
    }

    #[test]
    fn absolute_args_are_left_alone() {
        let m = manifest(vec!["node", "/opt/shared/index.js"], None);
        let entry = build_mcp_config(&m, Path::new("/install/demo")).unwrap();
        assert_eq!(entry.args, vec!["/opt/shared/index.js"]);
    }

    #[test]
    fn compiled_sibling_upgrades_tsx_invocation_to_node() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("dist")).unwrap();
        std::fs::write(dir.path().join("dist/index.js"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/index.ts"), "").unwrap();

        let ts_path = dir.path().join("src/index.ts").display().to_string();
        let m = manifest(vec!["npx", "tsx", &ts_path], None);
        let entry = build_mcp_config(&m, dir.path()).unwrap();
        assert_eq!(entry.command, "node");
        assert_eq!(entry.args, vec![dir.path().join("dist/index.js").display().to_string()]);
    }

    #[test]
    fn tsx_invocation_without_compiled_sibling_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let ts_path = dir.path().join("src/index.ts").display().to_string();
        let m = manifest(vec!["npx", "tsx", &ts_path], None);
        let entry = build_mcp_config(&m, dir.path()).unwrap();
        assert_eq!(entry.command, "npx");
    }

    #[test]
    fn dot_env_values_are_parsed_and_unquoted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".env"),
            "# a comment\nAPI_KEY=\"secret value\"\nEMPTY=\nPLAIN=bare\n",
        )
        .unwrap();
        let m = manifest(vec!["node", "index.js"], None);
        let entry = build_mcp_config(&m, dir.path()).unwrap();
        let env = entry.env.unwrap();
        assert_eq!(env.get("API_KEY"), Some(&"secret value".to_string()));
        assert_eq!(env.get("PLAIN"), Some(&"bare".to_string()));
        assert!(!env.contains_key("EMPTY"));
    }

    #[test]
    fn anthropic_quirk_sets_type_field() {
        let m = manifest(vec!["node", "index.js"], None);
        let mut entry = build_mcp_config(&m, Path::new("/install")).unwrap();
        apply_anthropic_quirk(&mut entry);
        assert_eq!(entry.entry_type.as_deref(), Some("stdio"));
    }
}
