//! Launch-config derivation (spec.md §4.F "createLaunchConfig").

use forge_core::ForgePaths;

use crate::types::LaunchConfig;

/// Command names replaced by their bundled-runtime equivalent.
const RUNTIME_BIN_NAMES: &[&str] = &["node", "python", "python3"];

/// Derive a stack's subprocess launch recipe from its manifest `command`
/// array, a runtime tag (`"node"`, `"python"`, …), and its install path.
#[must_use]
pub fn create_launch_config(
    command: &[String],
    runtime: Option<&str>,
    stack_path: &str,
    paths: &ForgePaths,
) -> LaunchConfig {
    if command.is_empty() {
        let is_python = runtime.is_some_and(|r| r.starts_with("python"));
        let runtime_name = runtime.unwrap_or("node");
        let bin = bundled_runtime_bin(paths, runtime_name);
        let args = if is_python {
            vec!["-u".to_string(), "src/server.py".to_string()]
        } else {
            vec!["dist/index.js".to_string()]
        };
        return LaunchConfig {
            bin,
            args,
            cwd: stack_path.to_string(),
        };
    }

    let (raw_bin, args) = command.split_first().expect("checked non-empty above");
    let bin = if RUNTIME_BIN_NAMES.contains(&raw_bin.as_str()) {
        bundled_runtime_bin(paths, raw_bin)
    } else if raw_bin == "npx" {
        bundled_npx_bin(paths)
    } else {
        raw_bin.clone()
    };

    LaunchConfig {
        bin,
        args: args.to_vec(),
        cwd: stack_path.to_string(),
    }
}

fn bundled_runtime_bin(paths: &ForgePaths, name: &str) -> String {
    let runtime_dir_name = if name.starts_with("python") { "python" } else { "node" };
    let exe = if name.starts_with("python") { name } else { "node" };
    paths
        .runtime_dir(runtime_dir_name)
        .join("bin")
        .join(exe)
        .display()
        .to_string()
}

fn bundled_npx_bin(paths: &ForgePaths) -> String {
    paths.runtime_dir("node").join("bin").join("npx").display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesises_python_command_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ForgePaths::from_root(dir.path());
        let launch = create_launch_config(&[], Some("python"), "/stacks/demo", &paths);
        assert_eq!(launch.args, vec!["-u", "src/server.py"]);
        assert!(launch.bin.ends_with("python"));
    }

    #[test]
    fn synthesises_node_command_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ForgePaths::from_root(dir.path());
        let launch = create_launch_config(&[], None, "/stacks/demo", &paths);
        assert_eq!(launch.args, vec!["dist/index.js"]);
        assert!(launch.bin.ends_with("node"));
    }

    #[test]
    fn replaces_node_with_bundled_binary() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ForgePaths::from_root(dir.path());
        let command = vec!["node".to_string(), "dist/index.js".to_string()];
        let launch = create_launch_config(&command, None, "/stacks/demo", &paths);
        assert!(launch.bin.ends_with("runtimes/node/bin/node") || launch.bin.contains("runtimes"));
        assert_eq!(launch.args, vec!["dist/index.js"]);
    }

    #[test]
    fn passes_through_unknown_binary() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ForgePaths::from_root(dir.path());
        let command = vec!["ffmpeg".to_string(), "-version".to_string()];
        let launch = create_launch_config(&command, None, "/stacks/demo", &paths);
        assert_eq!(launch.bin, "ffmpeg");
    }
}
