//! Well-known directory layout under `$HOME/.forge/` and platform tagging.

use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// The well-known directory layout beneath the Forge home directory.
///
/// Resolved once at process start (or pointed at a temp dir in tests) and
/// threaded through every component that needs a path — there is no global
/// singleton.
#[derive(Debug, Clone)]
pub struct ForgePaths {
    root: PathBuf,
}

impl ForgePaths {
    /// Resolve the home directory.
    ///
    /// Checks `$FORGE_HOME` first (must be absolute), then falls back to
    /// `$HOME/.forge`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoHomeDirectory`] if neither is set, or
    /// [`CoreError::InvalidPackageId`]-adjacent validation fails for a
    /// relative `FORGE_HOME`.
    pub fn resolve() -> CoreResult<Self> {
        if let Ok(custom) = std::env::var("FORGE_HOME") {
            let p = PathBuf::from(&custom);
            if p.is_absolute() {
                return Ok(Self { root: p });
            }
        }
        let home = std::env::var("HOME").map_err(|_| CoreError::NoHomeDirectory)?;
        Ok(Self {
            root: PathBuf::from(home).join(".forge"),
        })
    }

    /// Build a `ForgePaths` rooted at an explicit directory (tests, or an
    /// explicit `--home` CLI override).
    #[must_use]
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `packages/` — reserved for future package-level scratch state.
    #[must_use]
    pub fn packages_dir(&self) -> PathBuf {
        self.root.join("packages")
    }

    /// `stacks/` — installed MCP server stacks, one subdirectory per name.
    #[must_use]
    pub fn stacks_dir(&self) -> PathBuf {
        self.root.join("stacks")
    }

    /// Install directory for a single stack.
    #[must_use]
    pub fn stack_dir(&self, name: &str) -> PathBuf {
        self.stacks_dir().join(name)
    }

    /// `prompts/` — installed prompt templates.
    #[must_use]
    pub fn prompts_dir(&self) -> PathBuf {
        self.root.join("prompts")
    }

    /// Install location for a single prompt (a directory; single-file
    /// Markdown prompts are written as `<name>.md` inside it).
    #[must_use]
    pub fn prompt_dir(&self, name: &str) -> PathBuf {
        self.prompts_dir().join(name)
    }

    /// `runtimes/` — installed language runtimes.
    #[must_use]
    pub fn runtimes_dir(&self) -> PathBuf {
        self.root.join("runtimes")
    }

    /// Install directory for a single runtime.
    #[must_use]
    pub fn runtime_dir(&self, name: &str) -> PathBuf {
        self.runtimes_dir().join(name)
    }

    /// `binaries/` — installed standalone binaries.
    #[must_use]
    pub fn binaries_dir(&self) -> PathBuf {
        self.root.join("binaries")
    }

    /// Install directory for a single binary.
    #[must_use]
    pub fn binary_dir(&self, name: &str) -> PathBuf {
        self.binaries_dir().join(name)
    }

    /// `agents/` — installed agent CLIs.
    #[must_use]
    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    /// Install directory for a single agent CLI.
    #[must_use]
    pub fn agent_dir(&self, name: &str) -> PathBuf {
        self.agents_dir().join(name)
    }

    /// Install directory for any `(kind, name)` pair.
    #[must_use]
    pub fn install_dir(&self, kind: crate::Kind, name: &str) -> PathBuf {
        match kind {
            crate::Kind::Stack => self.stack_dir(name),
            crate::Kind::Prompt => self.prompt_dir(name),
            crate::Kind::Runtime => self.runtime_dir(name),
            crate::Kind::Binary => self.binary_dir(name),
            crate::Kind::Agent => self.agent_dir(name),
        }
    }

    /// `<install_dir>/source.manifest.json` — the package's own manifest,
    /// preserved under this name for registry-sourced stacks/prompts since
    /// `manifest.json` itself holds the synthesised `InstalledRecord`.
    #[must_use]
    pub fn source_manifest_path(&self, kind: crate::Kind, name: &str) -> PathBuf {
        self.install_dir(kind, name).join("source.manifest.json")
    }

    /// `store/<runtime>-<ver>-<os>-<arch>/` — content-addressed extraction
    /// cache for runtime pre-releases.
    #[must_use]
    pub fn store_dir(&self, runtime: &str, version: &str, platform_arch: &str) -> PathBuf {
        self.root
            .join("store")
            .join(format!("{runtime}-{version}-{platform_arch}"))
    }

    /// `bins/` — symlink shims exposing installed binaries on `PATH`.
    #[must_use]
    pub fn bins_dir(&self) -> PathBuf {
        self.root.join("bins")
    }

    /// `locks/` root, containing one subdirectory per kind-plural.
    #[must_use]
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    /// Lockfile path for a given `(kind, name)`.
    #[must_use]
    pub fn lockfile_path(&self, kind: crate::Kind, name: &str) -> PathBuf {
        self.locks_dir()
            .join(kind.plural())
            .join(format!("{name}.lock.yaml"))
    }

    /// `vault/` — reserved for pluggable secret backends.
    #[must_use]
    pub fn vault_dir(&self) -> PathBuf {
        self.root.join("vault")
    }

    /// `db/forge.db` — the session database file.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.root.join("db").join("forge.db")
    }

    /// `cache/` root.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// `cache/registry.json` — cached registry index.
    #[must_use]
    pub fn registry_cache_path(&self) -> PathBuf {
        self.cache_dir().join("registry.json")
    }

    /// `cache/downloads/` — scratch directory for in-flight downloads.
    #[must_use]
    pub fn downloads_dir(&self) -> PathBuf {
        self.cache_dir().join("downloads")
    }

    /// `cache/tool-index.json` — the MCP tool index cache.
    #[must_use]
    pub fn tool_index_path(&self) -> PathBuf {
        self.cache_dir().join("tool-index.json")
    }

    /// `logs/` — reserved for daemon/CLI log files.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// `forge.json` — the central config document.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join("forge.json")
    }

    /// `forge.json.lock` — the advisory lock sentinel for the config file.
    #[must_use]
    pub fn config_lock_path(&self) -> PathBuf {
        self.root.join("forge.json.lock")
    }

    /// `forge.json.tmp` — the staging file for atomic config replacement.
    #[must_use]
    pub fn config_tmp_path(&self) -> PathBuf {
        self.root.join("forge.json.tmp")
    }

    /// `secrets.json` — the default file-backed secret store.
    #[must_use]
    pub fn secrets_path(&self) -> PathBuf {
        self.root.join("secrets.json")
    }

    /// Create every well-known directory that does not already exist.
    /// Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CreateDir`] if any directory cannot be created.
    pub fn ensure_directories(&self) -> CoreResult<()> {
        let dirs = [
            self.packages_dir(),
            self.stacks_dir(),
            self.prompts_dir(),
            self.runtimes_dir(),
            self.binaries_dir(),
            self.agents_dir(),
            self.root.join("store"),
            self.bins_dir(),
            self.locks_dir(),
            self.vault_dir(),
            self.root.join("db"),
            self.cache_dir(),
            self.downloads_dir(),
            self.logs_dir(),
        ];
        for dir in dirs {
            std::fs::create_dir_all(&dir).map_err(|source| CoreError::CreateDir {
                path: dir,
                source,
            })?;
        }
        for kind in crate::Kind::ALL {
            let dir = self.locks_dir().join(kind.plural());
            std::fs::create_dir_all(&dir).map_err(|source| CoreError::CreateDir {
                path: dir,
                source,
            })?;
        }
        Ok(())
    }
}

/// Returns the current `"<os>-<arch>"` platform tag.
///
/// Architectures are normalised to `x64` or `arm64`; anything else passes
/// through unchanged (spec.md §4.A).
#[must_use]
pub fn platform_arch() -> String {
    format!("{}-{}", current_os(), normalize_arch(std::env::consts::ARCH))
}

fn current_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

fn normalize_arch(arch: &str) -> String {
    match arch {
        "x86_64" => "x64".to_string(),
        "aarch64" => "arm64".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_arch_normalizes_known_arches() {
        assert_eq!(normalize_arch("x86_64"), "x64");
        assert_eq!(normalize_arch("aarch64"), "arm64");
        assert_eq!(normalize_arch("riscv64"), "riscv64");
    }

    #[test]
    fn platform_arch_has_expected_shape() {
        let tag = platform_arch();
        assert_eq!(tag.split('-').count(), 2);
    }

    #[test]
    fn ensure_directories_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ForgePaths::from_root(dir.path());
        paths.ensure_directories().unwrap();
        paths.ensure_directories().unwrap();
        assert!(paths.stacks_dir().is_dir());
        assert!(paths.locks_dir().join("binaries").is_dir());
    }

    #[test]
    fn install_dir_dispatches_by_kind() {
        let paths = ForgePaths::from_root("/home/u/.forge");
        assert_eq!(
            paths.install_dir(crate::Kind::Runtime, "node"),
            PathBuf::from("/home/u/.forge/runtimes/node")
        );
        assert_eq!(
            paths.lockfile_path(crate::Kind::Binary, "ripgrep"),
            PathBuf::from("/home/u/.forge/locks/binaries/ripgrep.lock.yaml")
        );
    }

    #[test]
    fn resolve_prefers_forge_home_when_absolute() {
        // SAFETY: test runs single-threaded for env var mutation via serial harness default.
        let dir = tempfile::tempdir().unwrap();
        unsafe { std::env::set_var("FORGE_HOME", dir.path()) };
        let paths = ForgePaths::resolve().unwrap();
        assert_eq!(paths.root(), dir.path());
        unsafe { std::env::remove_var("FORGE_HOME") };
    }
}
