//! Pluggable secret value storage (spec.md "Non-goals": "Secret storage
//! backend... keychain/file backends are pluggable").
//!
//! The core only declares which secrets a stack requires and reads values
//! through this trait; [`FileSecretStore`] is the default, file-backed
//! implementation used everywhere except macOS Keychain integrations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};

/// Reads and writes secret values by name, independent of where they are
/// actually persisted.
pub trait SecretStore: Send + Sync {
    /// Fetch a secret's value, if one is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, name: &str) -> ConfigResult<Option<String>>;

    /// Store (or overwrite) a secret's value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, name: &str, value: &str) -> ConfigResult<()>;

    /// Remove a secret's value, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn delete(&self, name: &str) -> ConfigResult<()>;
}

/// The default backend: a flat `name → value` map persisted at
/// `secrets.json` (mode 0600).
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    /// Point a store at `path` (normally `paths.secrets_path()`).
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_all(&self) -> ConfigResult<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| ConfigError::Serde {
                path: self.path.clone(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(source) => Err(ConfigError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn write_all(&self, values: &HashMap<String, String>) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(values).map_err(|e| ConfigError::Serde {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&tmp_path, &json).map_err(|source| ConfigError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        set_owner_only(&tmp_path)?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        set_owner_only(&self.path)
    }
}

fn set_owner_only(path: &Path) -> ConfigResult<()> {
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

impl SecretStore for FileSecretStore {
    fn get(&self, name: &str) -> ConfigResult<Option<String>> {
        Ok(self.read_all()?.get(name).cloned())
    }

    fn set(&self, name: &str, value: &str) -> ConfigResult<()> {
        let mut values = self.read_all()?;
        values.insert(name.to_string(), value.to_string());
        self.write_all(&values)
    }

    fn delete(&self, name: &str) -> ConfigResult<()> {
        let mut values = self.read_all()?;
        values.remove(name);
        self.write_all(&values)
    }
}

/// An in-memory [`SecretStore`] used only in tests.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    values: std::sync::Mutex<HashMap<String, String>>,
}

impl SecretStore for MemorySecretStore {
    fn get(&self, name: &str) -> ConfigResult<Option<String>> {
        Ok(self.values.lock().unwrap().get(name).cloned())
    }

    fn set(&self, name: &str, value: &str) -> ConfigResult<()> {
        self.values.lock().unwrap().insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, name: &str) -> ConfigResult<()> {
        self.values.lock().unwrap().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_and_respects_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path().join("secrets.json"));
        store.set("OPENAI_API_KEY", "sk-test").unwrap();
        assert_eq!(store.get("OPENAI_API_KEY").unwrap(), Some("sk-test".to_string()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(dir.path().join("secrets.json"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        store.delete("OPENAI_API_KEY").unwrap();
        assert_eq!(store.get("OPENAI_API_KEY").unwrap(), None);
    }
}
