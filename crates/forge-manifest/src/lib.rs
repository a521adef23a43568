//! Stack/prompt/runtime manifest parsing, normalisation, and template
//! rendering.
//!
//! Manifests are authored as YAML with a JSON fallback. This crate loads
//! either shape into a tagged [`Manifest`] sum type, fills in the defaults
//! the rest of Forge relies on (kind-prefixed `id`, `command` coerced to a
//! sequence), and validates the required fields per kind.

mod error;
mod parser;
mod template;
mod types;

pub use error::{ManifestError, ManifestResult};
pub use parser::{load_manifest, normalize, parse_document};
pub use template::{extract_variables, render};
pub use types::{
    Manifest, PromptManifest, PromptVariable, PromptVariableType, RuntimeBinaryEntry,
    RuntimeManifest, StackManifest, StackRequires, StackSecret,
};
