//! Installed-package records and progress events (spec.md §3, §4.E).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an installed package's bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Downloaded from the registry.
    Registry,
    /// Copied from a local directory (`installFromLocal`).
    Local,
    /// Shipped alongside Forge itself.
    Bundled,
    /// Installed via `npm`.
    Npm,
    /// Installed via `pip`.
    Pip,
    /// A stand-in record written after a failed download, so the registry
    /// state remains consistent and retries stay idempotent.
    Placeholder,
}

/// The per-install `manifest.json` record, and the shape persisted into
/// the central config's per-kind maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledRecord {
    /// Fully qualified package id.
    pub id: String,
    /// The package's kind.
    pub kind: forge_core::Kind,
    /// The package's bare name.
    pub name: String,
    /// Installed version.
    pub version: String,
    /// ISO-8601 UTC install timestamp.
    pub installed_at: DateTime<Utc>,
    /// Provenance of the installed bytes.
    pub source: Source,
    /// `<os>-<arch>` tag, when this is a binary/runtime install.
    #[serde(default)]
    pub platform_arch: Option<String>,
    /// Ordered set of command names this install exposes.
    #[serde(default)]
    pub binaries: Vec<String>,
    /// Populated only on a [`Source::Placeholder`] record.
    #[serde(default)]
    pub error: Option<String>,
    /// Populated only for [`Source::Local`] records (`installFromLocal`).
    #[serde(default)]
    pub source_path: Option<String>,
}

/// A lifecycle phase reported via [`ProgressEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Resolving the dependency tree.
    Resolving,
    /// Downloading an artifact.
    Downloading,
    /// Extracting a downloaded archive.
    Extracting,
    /// Installing (copying, running a package manager).
    Installing,
    /// Writing the lockfile.
    Lockfile,
    /// The package finished installing successfully.
    Installed,
}

/// A progress notification emitted during install. Consumers may ignore
/// it entirely; the installer never blocks on its delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Which lifecycle phase this event reports.
    pub phase: Phase,
    /// The package id this event concerns.
    pub package: String,
    /// Total units of work, for phases that know it up front.
    #[serde(default)]
    pub total: Option<u64>,
    /// Units of work completed so far.
    #[serde(default)]
    pub current: Option<u64>,
    /// A human-readable status line.
    #[serde(default)]
    pub message: Option<String>,
}

impl ProgressEvent {
    /// Build a bare phase/package event with no progress counters.
    #[must_use]
    pub fn phase(phase: Phase, package: &str) -> Self {
        Self {
            phase,
            package: package.to_string(),
            total: None,
            current: None,
            message: None,
        }
    }

    /// Attach a human-readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// The outcome of installing a single package within a batch.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    /// Whether the install succeeded.
    pub success: bool,
    /// The package id this outcome concerns.
    pub id: String,
    /// Populated when `success` is `false`.
    pub error: Option<String>,
    /// Set when the package was already installed and `force` was not
    /// requested, per spec.md S1.
    pub already_installed: bool,
}
