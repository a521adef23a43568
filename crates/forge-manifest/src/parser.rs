//! Manifest loading, normalisation, and validation (spec.md §4.C).

use std::path::Path;

use forge_core::Kind;
use tracing::debug;

use crate::error::{ManifestError, ManifestResult};
use crate::types::{Manifest, PromptManifest, RuntimeManifest, StackManifest};

/// Load a manifest document from `path`, trying YAML first and falling
/// back to JSON, then normalise and validate it.
///
/// # Errors
///
/// Returns [`ManifestError::Io`] if the file cannot be read,
/// [`ManifestError::ParseFailed`] if neither format parses, and
/// [`ManifestError::Invalid`] if validation fails.
pub fn load_manifest(path: &Path, kind: Kind) -> ManifestResult<Manifest> {
    let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut manifest = parse_document(&contents, kind, path)?;
    normalize(&mut manifest, path)?;
    validate(&manifest).map_err(|errors| ManifestError::Invalid {
        source: path.display().to_string(),
        errors,
    })?;
    Ok(manifest)
}

/// Parse a manifest from an in-memory string (YAML or JSON), without
/// touching the filesystem beyond what normalisation needs (e.g. a
/// sibling `prompt.md`).
///
/// # Errors
///
/// Returns [`ManifestError::ParseFailed`] if neither format parses.
pub fn parse_document(contents: &str, kind: Kind, origin: &Path) -> ManifestResult<Manifest> {
    let tagged = match kind {
        Kind::Stack => parse_as::<StackManifest>(contents).map(Manifest::Stack),
        Kind::Prompt => parse_as::<PromptManifest>(contents).map(Manifest::Prompt),
        Kind::Runtime => parse_as::<RuntimeManifest>(contents).map(Manifest::Runtime),
        other => {
            return Err(ManifestError::ParseFailed {
                path: origin.to_path_buf(),
                message: format!("{other} manifests are not parsed by forge-manifest"),
            })
        }
    };

    tagged.map_err(|message| ManifestError::ParseFailed {
        path: origin.to_path_buf(),
        message,
    })
}

fn parse_as<T>(contents: &str) -> Result<T, String>
where
    T: serde::de::DeserializeOwned,
{
    match serde_yaml::from_str::<T>(contents) {
        Ok(value) => Ok(value),
        Err(yaml_err) => serde_json::from_str::<T>(contents)
            .map_err(|json_err| format!("yaml: {yaml_err}; json: {json_err}")),
    }
}

/// Normalise a parsed manifest in place: ensure `id` carries the correct
/// kind prefix, and for prompts, load `template` from a sibling
/// `prompt.md` when absent.
///
/// # Errors
///
/// Returns [`ManifestError::InvalidId`] if the existing id uses a
/// different kind prefix than the manifest's own kind.
pub fn normalize(manifest: &mut Manifest, origin: &Path) -> ManifestResult<()> {
    let kind = manifest.kind();

    let normalized_id = normalize_id(manifest.id(), kind)?;
    match manifest {
        Manifest::Stack(m) => m.id = normalized_id,
        Manifest::Prompt(m) => m.id = normalized_id,
        Manifest::Runtime(m) => m.id = normalized_id,
    }

    if let Manifest::Prompt(prompt) = manifest {
        if prompt.template.is_none() {
            if let Some(dir) = origin.parent() {
                let sidecar = dir.join("prompt.md");
                if sidecar.exists() {
                    debug!(path = %sidecar.display(), "loading prompt template from sidecar file");
                    let text = std::fs::read_to_string(&sidecar).map_err(|source| {
                        ManifestError::Io {
                            path: sidecar.clone(),
                            source,
                        }
                    })?;
                    prompt.template = Some(text);
                }
            }
        }
    }

    Ok(())
}

fn normalize_id(id: &str, kind: Kind) -> ManifestResult<String> {
    let (existing_kind, name) = forge_core::parse_package_id(id)?;
    if existing_kind != kind && id.contains(':') {
        return Err(ManifestError::Invalid {
            source: id.to_string(),
            errors: vec![format!(
                "id prefix '{existing_kind}' does not match manifest kind '{kind}'"
            )],
        });
    }
    Ok(forge_core::create_package_id(kind, &name))
}

/// Validate required fields per kind (spec.md §4.C).
///
/// # Errors
///
/// Returns the list of validation failures, if any.
fn validate(manifest: &Manifest) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    match manifest {
        Manifest::Stack(m) => {
            if m.name.trim().is_empty() {
                errors.push("stack manifest missing 'name'".to_string());
            }
            if m.version.trim().is_empty() {
                errors.push("stack manifest missing 'version'".to_string());
            }
        }
        Manifest::Prompt(m) => {
            if m.name.trim().is_empty() {
                errors.push("prompt manifest missing 'name'".to_string());
            }
            if m.template.as_deref().unwrap_or("").trim().is_empty() {
                errors.push("prompt manifest has no template (inline or sidecar prompt.md)".to_string());
            }
        }
        Manifest::Runtime(m) => {
            if m.name.trim().is_empty() {
                errors.push("runtime manifest missing 'name'".to_string());
            }
            if m.version.trim().is_empty() {
                errors.push("runtime manifest missing 'version'".to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_id_with_kind_prefix() {
        let mut manifest = Manifest::Stack(StackManifest {
            id: "demo".to_string(),
            name: "Demo".to_string(),
            version: "1.0.0".to_string(),
            requires: Default::default(),
            inputs: serde_json::Value::Null,
            outputs: serde_json::Value::Null,
            entry: None,
            command: vec![],
        });
        normalize(&mut manifest, Path::new("/tmp/stack.yaml")).unwrap();
        assert_eq!(manifest.id(), "stack:demo");
    }

    #[test]
    fn rejects_mismatched_kind_prefix() {
        let mut manifest = Manifest::Stack(StackManifest {
            id: "prompt:demo".to_string(),
            name: "Demo".to_string(),
            version: "1.0.0".to_string(),
            requires: Default::default(),
            inputs: serde_json::Value::Null,
            outputs: serde_json::Value::Null,
            entry: None,
            command: vec![],
        });
        assert!(normalize(&mut manifest, Path::new("/tmp/stack.yaml")).is_err());
    }

    #[test]
    fn loads_prompt_template_from_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("prompt.md"), "Hello {{name}}").unwrap();
        std::fs::write(
            dir.path().join("manifest.yaml"),
            "id: prompt:greet\nname: Greet\n",
        )
        .unwrap();

        let manifest = load_manifest(&dir.path().join("manifest.yaml"), Kind::Prompt).unwrap();
        match manifest {
            Manifest::Prompt(p) => assert_eq!(p.template.as_deref(), Some("Hello {{name}}")),
            _ => panic!("expected prompt manifest"),
        }
    }

    #[test]
    fn validation_fails_without_required_fields() {
        let manifest = Manifest::Runtime(RuntimeManifest {
            id: "runtime:node".to_string(),
            name: String::new(),
            version: String::new(),
            binaries: Default::default(),
        });
        assert!(validate(&manifest).is_err());
    }
}
