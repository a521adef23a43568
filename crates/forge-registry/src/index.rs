//! Registry index document shapes (spec.md §3 "Registry index").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use forge_core::Kind;

/// The top-level registry index: one catalog per pluralised kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryIndex {
    /// `stacks`, `prompts`, `runtimes`, `binaries`, `agents`.
    #[serde(flatten)]
    pub catalogs: HashMap<String, KindCatalog>,
}

impl RegistryIndex {
    /// Iterate every descriptor across every kind, in the fixed
    /// `Kind::ALL` order, official packages before community ones.
    pub fn iter_kind(&self, kind: Kind) -> impl Iterator<Item = &PackageDescriptor> {
        self.catalogs
            .get(kind.plural())
            .into_iter()
            .flat_map(|c| c.official.iter().chain(c.community.iter()))
    }

    /// Iterate all descriptors of all kinds, attaching their [`Kind`].
    pub fn iter_all(&self) -> impl Iterator<Item = (Kind, &PackageDescriptor)> {
        Kind::ALL
            .into_iter()
            .flat_map(move |kind| self.iter_kind(kind).map(move |d| (kind, d)))
    }
}

/// The official/community split within a single kind's catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KindCatalog {
    /// Packages curated by Forge itself.
    #[serde(default)]
    pub official: Vec<PackageDescriptor>,
    /// Packages contributed by the community.
    #[serde(default)]
    pub community: Vec<PackageDescriptor>,
}

/// A single catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Fully qualified id, `<kind>:<name>`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Semver version string.
    pub version: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Ordered, search-visible tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Registry-relative source directory, for stacks/prompts.
    #[serde(default)]
    pub path: Option<String>,
    /// npm package name, when this package installs via npm.
    #[serde(default)]
    pub npm_package: Option<String>,
    /// PyPI package name, when this package installs via pip.
    #[serde(default)]
    pub pip_package: Option<String>,
    /// Command names a binary/runtime install exports.
    #[serde(default)]
    pub binary: Option<String>,
    /// Multiple exported command names, when more than one binary ships.
    #[serde(default)]
    pub binaries: Vec<String>,
    /// Per-platform download manifests, keyed by `<os>-<arch>`.
    #[serde(default)]
    pub downloads: HashMap<String, Vec<DownloadEntry>>,
    /// Legacy single-URL download, keyed by `<os>-<arch>`.
    #[serde(default)]
    pub upstream: HashMap<String, String>,
    /// Legacy single-URL archive type, keyed by `<os>-<arch>`.
    #[serde(default)]
    pub extract: HashMap<String, String>,
    /// Transitive dependency declaration.
    #[serde(default)]
    pub requires: Requires,
    /// Expected SHA-256 of the downloaded artifact, when the registry
    /// supplies one.
    #[serde(default)]
    pub sha256: Option<String>,
}

/// A single entry in a `downloads[<os>-<arch>]` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadEntry {
    /// Artifact URL.
    pub url: String,
    /// Archive type: `zip`, `tar.gz`, `tgz`, or `tar.xz`. Inferred from the
    /// URL extension when absent.
    #[serde(rename = "type")]
    pub archive_type: Option<String>,
    /// The command name to relocate out of the extracted tree into the
    /// install root.
    pub binary: String,
}

/// `requires.{runtimes,binaries,agents}`, with legacy singular fallbacks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Requires {
    /// Runtime package-id references.
    #[serde(default)]
    pub runtimes: Vec<String>,
    /// Binary package-id references.
    #[serde(default)]
    pub binaries: Vec<String>,
    /// Agent package-id references.
    #[serde(default)]
    pub agents: Vec<String>,
    /// Legacy singular runtime reference.
    #[serde(default)]
    pub runtime: Option<String>,
    /// Legacy singular binaries-as-tools reference.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Names of secrets this package requires.
    #[serde(default)]
    pub secrets: Vec<SecretRequirement>,
}

impl Requires {
    /// All runtime references, merging `runtimes` and the legacy `runtime`
    /// singleton into one ordered sequence.
    #[must_use]
    pub fn all_runtimes(&self) -> Vec<String> {
        let mut out = self.runtimes.clone();
        if let Some(r) = &self.runtime {
            out.push(r.clone());
        }
        out
    }

    /// All binary references, merging `binaries` and the legacy `tools`
    /// singleton into one ordered sequence.
    #[must_use]
    pub fn all_binaries(&self) -> Vec<String> {
        let mut out = self.binaries.clone();
        out.extend(self.tools.iter().cloned());
        out
    }
}

/// A secret a package declares it needs at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRequirement {
    /// Secret name (environment-variable-shaped, e.g. `OPENAI_API_KEY`).
    pub name: String,
    /// Whether the stack refuses to spawn without it.
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}
