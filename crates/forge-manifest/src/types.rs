//! Manifest data shapes (spec.md §4.C): stack, prompt, and runtime.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use forge_core::Kind;

/// A parsed manifest, tagged by which of the three kinds it is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Manifest {
    /// A stack (MCP server) manifest.
    Stack(StackManifest),
    /// A prompt template manifest.
    Prompt(PromptManifest),
    /// A managed runtime manifest.
    Runtime(RuntimeManifest),
}

impl Manifest {
    /// The manifest's own declared id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Manifest::Stack(m) => &m.id,
            Manifest::Prompt(m) => &m.id,
            Manifest::Runtime(m) => &m.id,
        }
    }

    /// The [`Kind`] this manifest describes.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Manifest::Stack(_) => Kind::Stack,
            Manifest::Prompt(_) => Kind::Prompt,
            Manifest::Runtime(_) => Kind::Runtime,
        }
    }
}

/// A stack manifest: identity, launch command, and declared dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackManifest {
    /// Fully qualified `stack:<name>` id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Semver version string.
    pub version: String,
    /// Transitive dependency declaration.
    #[serde(default)]
    pub requires: StackRequires,
    /// Declared input parameters, free-form per stack.
    #[serde(default)]
    pub inputs: serde_json::Value,
    /// Declared output shape, free-form per stack.
    #[serde(default)]
    pub outputs: serde_json::Value,
    /// Legacy single-string entry point (superseded by `command`).
    #[serde(default)]
    pub entry: Option<String>,
    /// Launch command, array form preferred; a bare string is coerced to a
    /// single-element sequence during normalisation.
    #[serde(default, deserialize_with = "one_or_many_strings")]
    pub command: Vec<String>,
}

/// `requires.{runtimes,npm,pip,secrets}` on a stack manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackRequires {
    /// Runtime package-id references.
    #[serde(default)]
    pub runtimes: Vec<String>,
    /// npm package names the stack's own install step needs.
    #[serde(default)]
    pub npm: Vec<String>,
    /// PyPI package names the stack's own install step needs.
    #[serde(default)]
    pub pip: Vec<String>,
    /// Secrets the stack needs configured before it can spawn.
    #[serde(default)]
    pub secrets: Vec<StackSecret>,
}

/// A secret declared by a stack manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSecret {
    /// Environment-variable-shaped secret name.
    pub name: String,
    /// Whether the stack refuses to spawn without it.
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

/// A prompt template manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptManifest {
    /// Fully qualified `prompt:<name>` id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Inline template text. When absent, loaded from a sibling
    /// `prompt.md` file during normalisation.
    #[serde(default)]
    pub template: Option<String>,
    /// Declared template variables.
    #[serde(default)]
    pub variables: Vec<PromptVariable>,
}

/// A single variable referenced by a prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptVariable {
    /// Variable name, referenced in the template as `{{name}}`.
    pub name: String,
    /// Input widget type.
    #[serde(rename = "type", default)]
    pub var_type: PromptVariableType,
    /// Default value, when the caller supplies none.
    #[serde(default)]
    pub default: Option<String>,
    /// Whether the variable must be supplied.
    #[serde(default)]
    pub required: bool,
    /// Valid choices, for `select`-typed variables.
    #[serde(default)]
    pub options: Vec<String>,
}

/// How a prompt variable should be collected/displayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptVariableType {
    /// A single-line string.
    #[default]
    String,
    /// A multi-line block of text.
    Text,
    /// One of a fixed set of `options`.
    Select,
    /// A path to a file on disk.
    File,
}

/// A managed runtime manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeManifest {
    /// Fully qualified `runtime:<name>` id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Semver version string.
    pub version: String,
    /// Per-platform prebuilt binary download info, keyed by `<os>-<arch>`.
    #[serde(default)]
    pub binaries: HashMap<String, RuntimeBinaryEntry>,
}

/// A single `binaries[<os>-<arch>]` entry on a runtime manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeBinaryEntry {
    /// Download URL.
    pub url: String,
    /// Expected SHA-256 hex digest.
    pub sha256: String,
    /// Declared artifact size in bytes, for progress reporting.
    #[serde(default)]
    pub size: Option<u64>,
}

/// Deserialize a field that may be a bare string or a sequence of strings,
/// coercing the singleton case into a one-element sequence. The field's
/// absence is handled separately by `#[serde(default)]`.
fn one_or_many_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => Ok(vec![s]),
        OneOrMany::Many(v) => Ok(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_accepts_bare_string_and_array() {
        let from_string: StackManifest = serde_json::from_str(
            r#"{"id":"stack:demo","name":"demo","version":"1.0.0","command":"dist/index.js"}"#,
        )
        .unwrap();
        assert_eq!(from_string.command, vec!["dist/index.js".to_string()]);

        let from_array: StackManifest = serde_json::from_str(
            r#"{"id":"stack:demo","name":"demo","version":"1.0.0","command":["node","dist/index.js"]}"#,
        )
        .unwrap();
        assert_eq!(
            from_array.command,
            vec!["node".to_string(), "dist/index.js".to_string()]
        );

        let absent: StackManifest = serde_json::from_str(
            r#"{"id":"stack:demo","name":"demo","version":"1.0.0"}"#,
        )
        .unwrap();
        assert!(absent.command.is_empty());
    }
}
