//! Per-package YAML lockfiles (spec.md §3 "Lockfile").

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};

use forge_core::ForgePaths;

use crate::error::{InstallerError, InstallerResult};

/// A single dependency entry recorded in a lockfile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockedDependency {
    /// Fully qualified dependency id.
    pub id: String,
    /// Installed version.
    pub version: String,
    /// Short hex checksum of the dependency's identifying fields.
    pub checksum: String,
}

/// A per-package lockfile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lockfile {
    /// Fully qualified package id.
    pub id: String,
    /// Installed version.
    pub version: String,
    /// Display name.
    pub name: String,
    /// ISO-8601 UTC install timestamp.
    pub installed_at: chrono::DateTime<chrono::Utc>,
    /// Short hex checksum of this package's identifying fields.
    pub checksum: String,
    /// The dependencies this package was installed with.
    pub dependencies: Vec<LockedDependency>,
}

/// A short (not cryptographically load-bearing) hex digest over a stable
/// serialisation of `id|version|name`. This is identifying, not a
/// bit-for-bit content hash of the installed artifact.
#[must_use]
pub fn checksum(id: &str, version: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update(b"|");
    hasher.update(version.as_bytes());
    hasher.update(b"|");
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

impl Lockfile {
    /// Write this lockfile to its derived path (`locks/<kind-plural>/<name>.lock.yaml`).
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Serde`] if the YAML serialisation fails,
    /// and [`InstallerError::Io`] if the write fails.
    pub fn write(&self, paths: &ForgePaths, kind: forge_core::Kind, name: &str) -> InstallerResult<()> {
        let path = paths.lockfile_path(kind, name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| InstallerError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let yaml = serde_yaml::to_string(self).map_err(|e| InstallerError::Serde {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, yaml).map_err(|source| InstallerError::Io { path, source })
    }

    /// Read a package's lockfile, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Io`] on any read failure other than
    /// not-found, and [`InstallerError::Serde`] if the YAML fails to parse.
    pub fn read(
        paths: &ForgePaths,
        kind: forge_core::Kind,
        name: &str,
    ) -> InstallerResult<Option<Lockfile>> {
        let path = paths.lockfile_path(kind, name);
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let lock = serde_yaml::from_str(&contents).map_err(|e| InstallerError::Serde {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                Ok(Some(lock))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(InstallerError::Io { path, source }),
        }
    }

    /// Remove a package's lockfile, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Io`] on any removal failure other than
    /// not-found.
    pub fn remove(paths: &ForgePaths, kind: forge_core::Kind, name: &str) -> InstallerResult<()> {
        let path = paths.lockfile_path(kind, name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(InstallerError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_stable_for_same_inputs() {
        let a = checksum("stack:demo", "1.0.0", "demo");
        let b = checksum("stack:demo", "1.0.0", "demo");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn write_read_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ForgePaths::from_root(dir.path());
        let lock = Lockfile {
            id: "stack:demo".to_string(),
            version: "1.0.0".to_string(),
            name: "demo".to_string(),
            installed_at: chrono::Utc::now(),
            checksum: checksum("stack:demo", "1.0.0", "demo"),
            dependencies: vec![],
        };
        lock.write(&paths, forge_core::Kind::Stack, "demo").unwrap();
        let read_back = Lockfile::read(&paths, forge_core::Kind::Stack, "demo")
            .unwrap()
            .unwrap();
        assert_eq!(read_back.id, "stack:demo");

        Lockfile::remove(&paths, forge_core::Kind::Stack, "demo").unwrap();
        assert!(Lockfile::read(&paths, forge_core::Kind::Stack, "demo")
            .unwrap()
            .is_none());
    }
}
