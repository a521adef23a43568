//! The central config document shape (spec.md §3 "Central config document").

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// The single `<home>/forge.json` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    /// Document format version (bumped on breaking shape changes).
    pub version: u32,
    /// Schema version, kept distinct from `version` for forward migrations.
    pub schema_version: u32,
    /// Whether Forge has completed first-time initialisation.
    pub installed: bool,
    /// When this document was first created.
    pub installed_at: DateTime<Utc>,
    /// When this document was last written.
    pub updated_at: DateTime<Utc>,
    /// Installed runtimes, keyed by name.
    #[serde(default)]
    pub runtimes: HashMap<String, RuntimeConfig>,
    /// Installed stacks, keyed by fully qualified id.
    #[serde(default)]
    pub stacks: HashMap<String, StackConfig>,
    /// Installed standalone binaries, keyed by name.
    #[serde(default)]
    pub binaries: HashMap<String, BinaryConfig>,
    /// Declared secrets, keyed by name.
    #[serde(default)]
    pub secrets: HashMap<String, SecretConfig>,
}

impl ForgeConfig {
    /// Build a fresh document with default values (`createForgeConfig()`).
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            version: 1,
            schema_version: SCHEMA_VERSION,
            installed: true,
            installed_at: now,
            updated_at: now,
            runtimes: HashMap::new(),
            stacks: HashMap::new(),
            binaries: HashMap::new(),
            secrets: HashMap::new(),
        }
    }
}

/// An installed runtime, as recorded in the central config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Install directory.
    pub path: String,
    /// Absolute path to the primary binary.
    pub bin: String,
    /// Installed version.
    pub version: String,
}

/// An installed standalone binary, as recorded in the central config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryConfig {
    /// Install directory.
    pub path: String,
    /// Absolute path to the primary binary.
    pub bin: String,
    /// Installed version.
    pub version: String,
}

/// The resolved subprocess launch recipe for a stack's MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Absolute path to the executable.
    pub bin: String,
    /// Ordered argument list, relative paths already rewritten absolute.
    pub args: Vec<String>,
    /// Working directory to spawn in.
    pub cwd: String,
}

/// A secret requirement as recorded against a stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSecretRef {
    /// Secret name.
    pub name: String,
    /// Whether the stack refuses to spawn without it.
    pub required: bool,
}

/// A single tool entry cached from the MCP tool indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTool {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema describing the tool's input.
    pub input_schema: serde_json::Value,
}

/// An installed stack, as recorded in the central config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Install directory.
    pub path: String,
    /// Installed version.
    pub version: String,
    /// Derived subprocess launch recipe.
    pub launch: LaunchConfig,
    /// Secrets this stack requires.
    #[serde(default)]
    pub secrets: Vec<StackSecretRef>,
    /// Cached tool inventory, filled by the MCP tool indexer.
    #[serde(default)]
    pub tools: Option<Vec<CachedTool>>,
}

/// Where a secret's value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretProvider {
    /// macOS Keychain.
    Keychain,
    /// The default file-backed `secrets.json` store.
    #[serde(rename = "secrets.json")]
    SecretsFile,
}

impl SecretProvider {
    /// The provider used when none is specified, chosen per host platform.
    #[must_use]
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            SecretProvider::Keychain
        } else {
            SecretProvider::SecretsFile
        }
    }
}

/// A declared secret's status in the central config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretConfig {
    /// Whether a value has been stored for this secret.
    pub configured: bool,
    /// Which backend holds the value.
    pub provider: SecretProvider,
    /// The stack that first declared this secret, if any.
    #[serde(default)]
    pub stack: Option<String>,
    /// Whether any current stack treats this secret as required.
    pub required: bool,
    /// When `configured` was last flipped.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Input to [`crate::store::add_stack`]: what the installer learned about
/// a newly installed stack, before launch-config derivation.
pub struct NewStackInfo {
    /// Install directory.
    pub path: String,
    /// Installed version.
    pub version: String,
    /// The manifest's `command` array (may be empty).
    pub command: Vec<String>,
    /// The manifest's `requires.runtimes` primary entry, if any
    /// (`"node"`, `"python"`, …), used to pick a synthesised command when
    /// `command` is empty.
    pub runtime: Option<String>,
    /// Secrets this stack declares.
    pub secrets: Vec<StackSecretRef>,
}
