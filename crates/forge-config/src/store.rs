//! Read/modify/write operations on the central config document, under the
//! advisory lock (spec.md §4.F).

use chrono::Utc;
use forge_core::ForgePaths;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::launch::create_launch_config;
use crate::lockguard::acquire;
use crate::types::{
    BinaryConfig, ForgeConfig, NewStackInfo, RuntimeConfig, SecretConfig, SecretProvider,
    StackConfig,
};

/// Read the existing config document or create a fresh one with defaults
/// (`initConfig()`), persisting it if it did not already exist.
///
/// # Errors
///
/// Propagates [`ConfigError::Io`]/[`ConfigError::Serde`] from the
/// underlying read or write.
pub fn init_config(paths: &ForgePaths) -> ConfigResult<ForgeConfig> {
    let path = paths.config_path();
    match read_config(&path)? {
        Some(config) => Ok(config),
        None => {
            let config = ForgeConfig::new(Utc::now());
            write_config_locked(paths, &config)?;
            Ok(config)
        }
    }
}

fn read_config(path: &std::path::Path) -> ConfigResult<Option<ForgeConfig>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let config = serde_json::from_str(&contents).map_err(|e| ConfigError::Serde {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            Ok(Some(config))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Read-modify-write the config document inside the locked section
/// (`updateConfig(modifier)`).
///
/// # Errors
///
/// Returns [`ConfigError::LockTimeout`] if the lock cannot be acquired,
/// and propagates any I/O/serialization failure.
pub fn update_config<F>(paths: &ForgePaths, modifier: F) -> ConfigResult<ForgeConfig>
where
    F: FnOnce(&mut ForgeConfig),
{
    let path = paths.config_path();
    let lock_path = paths.config_lock_path();
    let _guard = acquire(&lock_path)?;

    let mut config = read_config(&path)?.unwrap_or_else(|| ForgeConfig::new(Utc::now()));
    modifier(&mut config);
    config.updated_at = Utc::now();
    write_config_unlocked(&path, &config)?;
    Ok(config)
}

fn write_config_locked(paths: &ForgePaths, config: &ForgeConfig) -> ConfigResult<()> {
    let _guard = acquire(&paths.config_lock_path())?;
    write_config_unlocked(&paths.config_path(), config)
}

fn write_config_unlocked(path: &std::path::Path, config: &ForgeConfig) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_vec_pretty(config).map_err(|e| ConfigError::Serde {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    std::fs::write(&tmp_path, &json).map_err(|source| ConfigError::Io {
        path: tmp_path.clone(),
        source,
    })?;
    set_owner_only(&tmp_path)?;
    std::fs::rename(&tmp_path, path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    set_owner_only(path)?;
    debug!(path = %path.display(), "wrote central config");
    Ok(())
}

fn set_owner_only(path: &std::path::Path) -> ConfigResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|source| {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Record a newly installed stack: derive its launch config, register its
/// secrets with platform-default providers, and insert the `StackConfig`
/// (`addStack(id, info)`).
///
/// # Errors
///
/// Propagates lock/I/O/serialization failures from [`update_config`].
pub fn add_stack(paths: &ForgePaths, id: &str, info: NewStackInfo) -> ConfigResult<ForgeConfig> {
    let launch = create_launch_config(&info.command, info.runtime.as_deref(), &info.path, paths);
    let secrets = info.secrets.clone();
    let stack = StackConfig {
        path: info.path,
        version: info.version,
        launch,
        secrets: secrets.clone(),
        tools: None,
    };

    update_config(paths, move |config| {
        config.stacks.insert(id.to_string(), stack);
        for secret in &secrets {
            config.secrets.entry(secret.name.clone()).or_insert_with(|| SecretConfig {
                configured: false,
                provider: SecretProvider::platform_default(),
                stack: Some(id.to_string()),
                required: secret.required,
                last_updated: None,
            });
        }
    })
}

/// Remove a stack, then prune any secret it owned that no remaining stack
/// still requires (`removeStack(id)`).
///
/// # Errors
///
/// Propagates lock/I/O/serialization failures from [`update_config`].
pub fn remove_stack(paths: &ForgePaths, id: &str) -> ConfigResult<ForgeConfig> {
    update_config(paths, |config| {
        config.stacks.remove(id);
        let still_required: std::collections::HashSet<String> = config
            .stacks
            .values()
            .flat_map(|s| s.secrets.iter().map(|sec| sec.name.clone()))
            .collect();
        config
            .secrets
            .retain(|name, secret| secret.stack.as_deref() != Some(id) || still_required.contains(name));
    })
}

/// Replace a stack's cached tool inventory (`updateStackTools(id, tools)`).
///
/// # Errors
///
/// Returns [`ConfigError::UnknownStack`] if `id` is not present, otherwise
/// propagates lock/I/O/serialization failures.
pub fn update_stack_tools(
    paths: &ForgePaths,
    id: &str,
    tools: Vec<crate::types::CachedTool>,
) -> ConfigResult<ForgeConfig> {
    let path = paths.config_path();
    let lock_path = paths.config_lock_path();
    let _guard = acquire(&lock_path)?;

    let mut config = read_config(&path)?.unwrap_or_else(|| ForgeConfig::new(Utc::now()));
    let stack = config
        .stacks
        .get_mut(id)
        .ok_or_else(|| ConfigError::UnknownStack(id.to_string()))?;
    stack.tools = Some(tools);
    config.updated_at = Utc::now();
    write_config_unlocked(&path, &config)?;
    Ok(config)
}

/// Record an installed runtime (`addRuntime`).
///
/// # Errors
///
/// Propagates lock/I/O/serialization failures from [`update_config`].
pub fn add_runtime(paths: &ForgePaths, name: &str, runtime: RuntimeConfig) -> ConfigResult<ForgeConfig> {
    update_config(paths, move |config| {
        config.runtimes.insert(name.to_string(), runtime);
    })
}

/// Record an installed standalone binary.
///
/// # Errors
///
/// Propagates lock/I/O/serialization failures from [`update_config`].
pub fn add_binary(paths: &ForgePaths, name: &str, binary: BinaryConfig) -> ConfigResult<ForgeConfig> {
    update_config(paths, move |config| {
        config.binaries.insert(name.to_string(), binary);
    })
}

/// Flip a secret's `configured` flag, touching `lastUpdated`
/// (`updateSecretStatus`).
///
/// # Errors
///
/// Propagates lock/I/O/serialization failures from [`update_config`].
pub fn update_secret_status(paths: &ForgePaths, name: &str, configured: bool) -> ConfigResult<ForgeConfig> {
    let now = Utc::now();
    update_config(paths, move |config| {
        let entry = config.secrets.entry(name.to_string()).or_insert_with(|| SecretConfig {
            configured: false,
            provider: SecretProvider::platform_default(),
            stack: None,
            required: false,
            last_updated: None,
        });
        entry.configured = configured;
        entry.last_updated = Some(now);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StackSecretRef;

    fn paths() -> (tempfile::TempDir, ForgePaths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = ForgePaths::from_root(dir.path());
        (dir, paths)
    }

    #[test]
    fn init_config_creates_then_reuses_document() {
        let (_dir, paths) = paths();
        let first = init_config(&paths).unwrap();
        assert!(paths.config_path().is_file());
        let second = init_config(&paths).unwrap();
        assert_eq!(first.installed_at, second.installed_at);
    }

    #[test]
    fn add_stack_registers_secrets_as_unconfigured() {
        let (_dir, paths) = paths();
        init_config(&paths).unwrap();
        let info = NewStackInfo {
            path: "/home/.forge/stacks/demo".to_string(),
            version: "1.0.0".to_string(),
            command: vec!["node".to_string(), "dist/index.js".to_string()],
            runtime: Some("node".to_string()),
            secrets: vec![StackSecretRef {
                name: "OPENAI_API_KEY".to_string(),
                required: true,
            }],
        };
        let config = add_stack(&paths, "stack:demo", info).unwrap();
        assert!(config.stacks.contains_key("stack:demo"));
        let secret = &config.secrets["OPENAI_API_KEY"];
        assert!(!secret.configured);
        assert_eq!(secret.stack.as_deref(), Some("stack:demo"));
    }

    #[test]
    fn remove_stack_prunes_orphaned_secret() {
        let (_dir, paths) = paths();
        init_config(&paths).unwrap();
        let info = NewStackInfo {
            path: "/p".to_string(),
            version: "1.0.0".to_string(),
            command: vec![],
            runtime: None,
            secrets: vec![StackSecretRef {
                name: "KEY".to_string(),
                required: true,
            }],
        };
        add_stack(&paths, "stack:demo", info).unwrap();
        let config = remove_stack(&paths, "stack:demo").unwrap();
        assert!(!config.stacks.contains_key("stack:demo"));
        assert!(!config.secrets.contains_key("KEY"));
    }

    #[test]
    fn update_secret_status_sets_configured_and_timestamp() {
        let (_dir, paths) = paths();
        init_config(&paths).unwrap();
        let config = update_secret_status(&paths, "KEY", true).unwrap();
        let secret = &config.secrets["KEY"];
        assert!(secret.configured);
        assert!(secret.last_updated.is_some());
    }

    #[test]
    fn config_file_has_owner_only_permissions() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let (_dir, paths) = paths();
            init_config(&paths).unwrap();
            let mode = std::fs::metadata(paths.config_path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
