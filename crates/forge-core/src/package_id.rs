//! Package identifier grammar.
//!
//! A fully qualified id has the form `<kind>:<name>` where `kind` is one of
//! the five [`Kind`] variants and `name` matches `[a-z0-9-]+`. A bare name
//! with no `<kind>:` prefix defaults to [`Kind::Stack`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// The five kinds of packages Forge knows how to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// A self-contained MCP server.
    Stack,
    /// A Markdown prompt template with a YAML sidecar.
    Prompt,
    /// A managed language runtime (Node.js, Python, ...).
    Runtime,
    /// A standalone native tool.
    Binary,
    /// A third-party AI-agent client.
    Agent,
}

impl Kind {
    /// The five kinds, in the fixed search/iteration order used throughout
    /// the registry client and installer.
    pub const ALL: [Kind; 5] = [
        Kind::Stack,
        Kind::Prompt,
        Kind::Runtime,
        Kind::Binary,
        Kind::Agent,
    ];

    /// The lowercase `<kind>` prefix string, e.g. `"stack"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Stack => "stack",
            Kind::Prompt => "prompt",
            Kind::Runtime => "runtime",
            Kind::Binary => "binary",
            Kind::Agent => "agent",
        }
    }

    /// The pluralised directory/registry-key form, e.g. `"stacks"`.
    ///
    /// `binary` pluralises irregularly to `binaries` (spec.md §4.E).
    #[must_use]
    pub fn plural(self) -> &'static str {
        match self {
            Kind::Stack => "stacks",
            Kind::Prompt => "prompts",
            Kind::Runtime => "runtimes",
            Kind::Binary => "binaries",
            Kind::Agent => "agents",
        }
    }

    fn from_prefix(s: &str) -> Option<Kind> {
        match s {
            "stack" => Some(Kind::Stack),
            "prompt" => Some(Kind::Prompt),
            "runtime" => Some(Kind::Runtime),
            "binary" => Some(Kind::Binary),
            "agent" => Some(Kind::Agent),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Parse a package id string into `(kind, name)`.
///
/// A bare name (no `<kind>:` prefix) defaults to [`Kind::Stack`]. Returns
/// [`CoreError::InvalidPackageId`] when the prefix names none of the five
/// kinds, or when the name fails `[a-z0-9-]+`.
pub fn parse_package_id(id: &str) -> CoreResult<(Kind, String)> {
    match id.split_once(':') {
        Some((prefix, name)) => {
            let kind = Kind::from_prefix(prefix)
                .ok_or_else(|| CoreError::InvalidPackageId(id.to_string()))?;
            if !valid_name(name) {
                return Err(CoreError::InvalidPackageId(id.to_string()));
            }
            Ok((kind, name.to_string()))
        },
        None => {
            if !valid_name(id) {
                return Err(CoreError::InvalidPackageId(id.to_string()));
            }
            Ok((Kind::Stack, id.to_string()))
        },
    }
}

/// Build a fully qualified `<kind>:<name>` string.
#[must_use]
pub fn create_package_id(kind: Kind, name: &str) -> String {
    format!("{kind}:{name}")
}

/// Strip a valid `<kind>:` prefix from a descriptor's own id, if present.
///
/// Used by the registry client when matching a bare name against catalog
/// entries that always store fully qualified ids.
#[must_use]
pub fn strip_kind_prefix(id: &str) -> &str {
    match id.split_once(':') {
        Some((prefix, rest)) if Kind::from_prefix(prefix).is_some() => rest,
        _ => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fully_qualified_ids() {
        assert_eq!(
            parse_package_id("runtime:node").unwrap(),
            (Kind::Runtime, "node".to_string())
        );
        assert_eq!(
            parse_package_id("binary:ripgrep").unwrap(),
            (Kind::Binary, "ripgrep".to_string())
        );
    }

    #[test]
    fn bare_name_defaults_to_stack() {
        assert_eq!(
            parse_package_id("demo").unwrap(),
            (Kind::Stack, "demo".to_string())
        );
    }

    #[test]
    fn rejects_unknown_kind_prefix() {
        assert!(parse_package_id("widget:foo").is_err());
    }

    #[test]
    fn rejects_invalid_name_characters() {
        assert!(parse_package_id("stack:Foo_Bar").is_err());
        assert!(parse_package_id("Foo Bar").is_err());
    }

    #[test]
    fn round_trips_through_create_and_parse() {
        for kind in Kind::ALL {
            let id = create_package_id(kind, "my-thing-2");
            assert_eq!(parse_package_id(&id).unwrap(), (kind, "my-thing-2".to_string()));
        }
    }

    #[test]
    fn strips_kind_prefix_only_for_valid_kinds() {
        assert_eq!(strip_kind_prefix("stack:demo"), "demo");
        assert_eq!(strip_kind_prefix("widget:demo"), "widget:demo");
        assert_eq!(strip_kind_prefix("demo"), "demo");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(Kind::Binary.plural(), "binaries");
        assert_eq!(Kind::Stack.plural(), "stacks");
    }
}
