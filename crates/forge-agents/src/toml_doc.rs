//! A minimal TOML reader/writer for the one agent (`codex`) that does not
//! speak JSON (spec.md §4.H "Config formats").
//!
//! Supports exactly the restricted subset the registrar needs: top-level
//! key-values, bracketed tables addressed by dotted paths, and
//! string/bool/number/array-of-string values. Anything this parser does
//! not recognise — comments, blank lines, unrelated tables — is kept
//! verbatim so editing one stack's entry never disturbs the rest of a
//! third-party config file.

use std::fmt::Write as _;

/// A scalar or array value in the restricted subset.
#[derive(Debug, Clone, PartialEq)]
pub enum TomlValue {
    /// A quoted string.
    Str(String),
    /// `true` / `false`.
    Bool(bool),
    /// An integer or float, kept as its original text to avoid any
    /// precision round-trip loss.
    Number(String),
    /// An array of strings.
    Array(Vec<String>),
}

impl TomlValue {
    fn render(&self) -> String {
        match self {
            TomlValue::Str(s) => quote(s),
            TomlValue::Bool(b) => b.to_string(),
            TomlValue::Number(n) => n.clone(),
            TomlValue::Array(items) => {
                let rendered: Vec<String> = items.iter().map(|s| quote(s)).collect();
                format!("[{}]", rendered.join(", "))
            }
        }
    }
}

fn quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn unquote(s: &str) -> String {
    s.replace("\\\"", "\"").replace("\\\\", "\\")
}

/// One line within a table, or at top level: a parsed key-value, or an
/// opaque line (comment, blank, or anything this parser doesn't model)
/// kept verbatim.
#[derive(Debug, Clone, PartialEq)]
enum Item {
    KeyValue(String, TomlValue),
    Raw(String),
}

#[derive(Debug, Clone)]
struct Table {
    path: Vec<String>,
    items: Vec<Item>,
}

/// A parsed document: top-level items plus an ordered list of tables.
#[derive(Debug, Clone, Default)]
pub struct TomlDocument {
    top: Vec<Item>,
    tables: Vec<Table>,
}

impl TomlDocument {
    /// Parse a document, preserving anything outside the restricted
    /// subset verbatim.
    #[must_use]
    pub fn parse(contents: &str) -> Self {
        let mut doc = TomlDocument::default();
        let mut current_table: Option<usize> = None;

        for line in contents.lines() {
            let trimmed = line.trim();
            if let Some(path) = parse_table_header(trimmed) {
                doc.tables.push(Table {
                    path,
                    items: Vec::new(),
                });
                current_table = Some(doc.tables.len() - 1);
                continue;
            }

            let item = if trimmed.is_empty() || trimmed.starts_with('#') {
                Item::Raw(line.to_string())
            } else if let Some((key, value)) = parse_key_value(trimmed) {
                Item::KeyValue(key, value)
            } else {
                Item::Raw(line.to_string())
            };

            match current_table {
                Some(idx) => doc.tables[idx].items.push(item),
                None => doc.top.push(item),
            }
        }
        doc
    }

    /// Render the document back to text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for item in &self.top {
            write_item(&mut out, item);
        }
        for table in &self.tables {
            if !out.is_empty() && !out.ends_with("\n\n") {
                out.push('\n');
            }
            let _ = writeln!(out, "[{}]", table.path.iter().map(|s| render_key(s)).collect::<Vec<_>>().join("."));
            for item in &table.items {
                write_item(&mut out, item);
            }
        }
        out
    }

    /// Replace (or insert) the table at `path` with exactly `entries`,
    /// dropping whatever it previously held.
    pub fn set_table(&mut self, path: &[String], entries: Vec<(String, TomlValue)>) {
        let items = entries.into_iter().map(|(k, v)| Item::KeyValue(k, v)).collect();
        if let Some(table) = self.tables.iter_mut().find(|t| t.path == path) {
            table.items = items;
        } else {
            self.tables.push(Table {
                path: path.to_vec(),
                items,
            });
        }
    }

    /// Remove the table at `path` and any nested table whose path starts
    /// with it (e.g. removing `mcp_servers.demo` also removes
    /// `mcp_servers.demo.env`). Returns whether anything was removed.
    pub fn remove_table(&mut self, path: &[String]) -> bool {
        let before = self.tables.len();
        self.tables.retain(|t| !(t.path == path || t.path.starts_with(path)));
        self.tables.len() != before
    }

    /// Whether a table at exactly `path` exists.
    #[must_use]
    pub fn has_table(&self, path: &[String]) -> bool {
        self.tables.iter().any(|t| t.path == path)
    }

    /// List the single-segment child keys of `prefix` (e.g. every stack id
    /// registered under `mcp_servers`).
    #[must_use]
    pub fn table_children(&self, prefix: &[String]) -> Vec<String> {
        self.tables
            .iter()
            .filter_map(|t| {
                if t.path.len() == prefix.len() + 1 && t.path.starts_with(prefix) {
                    t.path.last().cloned()
                } else {
                    None
                }
            })
            .collect()
    }
}

fn write_item(out: &mut String, item: &Item) {
    match item {
        Item::Raw(line) => {
            out.push_str(line);
            out.push('\n');
        }
        Item::KeyValue(key, value) => {
            let _ = writeln!(out, "{} = {}", render_key(key), value.render());
        }
    }
}

fn render_key(key: &str) -> String {
    let is_bare = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if is_bare {
        key.to_string()
    } else {
        quote(key)
    }
}

fn parse_table_header(line: &str) -> Option<Vec<String>> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?;
    Some(
        inner
            .split('.')
            .map(|segment| {
                let segment = segment.trim();
                if segment.len() >= 2 && segment.starts_with('"') && segment.ends_with('"') {
                    unquote(&segment[1..segment.len() - 1])
                } else {
                    segment.to_string()
                }
            })
            .collect(),
    )
}

fn parse_key_value(line: &str) -> Option<(String, TomlValue)> {
    let (raw_key, raw_value) = line.split_once('=')?;
    let key = raw_key.trim();
    let key = if key.len() >= 2 && key.starts_with('"') && key.ends_with('"') {
        unquote(&key[1..key.len() - 1])
    } else {
        key.to_string()
    };
    let value = parse_value(raw_value.trim())?;
    Some((key, value))
}

fn parse_value(raw: &str) -> Option<TomlValue> {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return Some(TomlValue::Str(unquote(&raw[1..raw.len() - 1])));
    }
    if raw == "true" {
        return Some(TomlValue::Bool(true));
    }
    if raw == "false" {
        return Some(TomlValue::Bool(false));
    }
    if raw.starts_with('[') && raw.ends_with(']') {
        let inner = &raw[1..raw.len() - 1];
        if inner.trim().is_empty() {
            return Some(TomlValue::Array(Vec::new()));
        }
        let items = inner
            .split(',')
            .map(|item| {
                let item = item.trim();
                if item.len() >= 2 && item.starts_with('"') && item.ends_with('"') {
                    unquote(&item[1..item.len() - 1])
                } else {
                    item.to_string()
                }
            })
            .collect();
        return Some(TomlValue::Array(items));
    }
    if raw.parse::<f64>().is_ok() {
        return Some(TomlValue::Number(raw.to_string()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_an_untouched_document() {
        let src = "# header comment\ntitle = \"codex\"\n\n[profile]\nmodel = \"o1\"\n";
        let doc = TomlDocument::parse(src);
        assert_eq!(doc.render(), src);
    }

    #[test]
    fn set_table_inserts_a_new_table_with_blank_line_before_header() {
        let mut doc = TomlDocument::parse("title = \"codex\"\n");
        doc.set_table(
            &["mcp_servers".to_string(), "demo".to_string()],
            vec![
                ("command".to_string(), TomlValue::Str("node".to_string())),
                (
                    "args".to_string(),
                    TomlValue::Array(vec!["index.js".to_string()]),
                ),
            ],
        );
        let rendered = doc.render();
        assert!(rendered.contains("\n\n[mcp_servers.demo]\n"));
        assert!(rendered.contains("command = \"node\""));
        assert!(rendered.contains("args = [\"index.js\"]"));
    }

    #[test]
    fn set_table_replaces_existing_entries_in_place() {
        let mut doc = TomlDocument::parse("[mcp_servers.demo]\ncommand = \"old\"\n");
        doc.set_table(
            &["mcp_servers".to_string(), "demo".to_string()],
            vec![("command".to_string(), TomlValue::Str("new".to_string()))],
        );
        assert_eq!(doc.tables.len(), 1);
        assert!(doc.render().contains("command = \"new\""));
        assert!(!doc.render().contains("old"));
    }

    #[test]
    fn remove_table_drops_nested_children() {
        let mut doc = TomlDocument::parse(
            "[mcp_servers.demo]\ncommand = \"node\"\n\n[mcp_servers.demo.env]\nKEY = \"v\"\n\n[other]\nx = 1\n",
        );
        let removed = doc.remove_table(&["mcp_servers".to_string(), "demo".to_string()]);
        assert!(removed);
        assert_eq!(doc.tables.len(), 1);
        assert!(doc.render().contains("[other]"));
    }

    #[test]
    fn table_children_lists_direct_descendants_only() {
        let doc = TomlDocument::parse(
            "[mcp_servers.demo]\ncommand = \"node\"\n\n[mcp_servers.demo.env]\nKEY = \"v\"\n\n[mcp_servers.other]\ncommand = \"x\"\n",
        );
        let mut children = doc.table_children(&["mcp_servers".to_string()]);
        children.sort();
        assert_eq!(children, vec!["demo".to_string(), "other".to_string()]);
    }

    #[test]
    fn preserves_unrelated_tables_untouched() {
        let mut doc = TomlDocument::parse("[profile]\nmodel = \"o1\"\n");
        doc.set_table(
            &["mcp_servers".to_string(), "demo".to_string()],
            vec![("command".to_string(), TomlValue::Str("node".to_string()))],
        );
        assert!(doc.render().contains("[profile]"));
        assert!(doc.render().contains("model = \"o1\""));
    }
}
