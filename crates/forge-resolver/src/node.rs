//! Resolved dependency tree (spec.md §3 "Resolved node", §4.D).

use std::collections::HashSet;

use forge_core::{ForgePaths, Kind};
use forge_registry::RegistryClient;
use tracing::debug;

use crate::error::{ResolverError, ResolverResult};

/// A node in the resolved dependency tree rooted at the requested package.
///
/// The resolver does not produce a DAG: the same dependency can appear
/// under multiple parents. Deduplication happens later, in
/// [`crate::install_order`].
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    /// Fully qualified package id.
    pub id: String,
    /// The package's kind.
    pub kind: Kind,
    /// The package's bare name.
    pub name: String,
    /// The descriptor's declared version.
    pub version: String,
    /// Whether this package is already present on disk.
    pub installed: bool,
    /// Direct dependencies. Never recursively resolved further: the
    /// registry schema guarantees runtimes/binaries/agents are leaves.
    pub dependencies: Vec<ResolvedNode>,
}

/// Resolve `id` (short or fully qualified, defaulting to `stack:`) against
/// the registry index, building its dependency tree one level deep.
///
/// # Errors
///
/// Returns [`ResolverError::InvalidId`] if `id` fails the package-id
/// grammar, and [`ResolverError::Registry`] if the registry client cannot
/// fetch the index or a fallback fails.
pub async fn resolve(
    id: &str,
    client: &RegistryClient,
    paths: &ForgePaths,
) -> ResolverResult<ResolvedNode> {
    let (kind, name) = forge_core::parse_package_id(id)?;
    let qualified = forge_core::create_package_id(kind, &name);

    let index = client.fetch_index(false).await?;
    let descriptor = client.get_package(&index, &qualified)?;

    let mut dependency_ids = Vec::new();
    dependency_ids.extend(descriptor.requires.all_runtimes());
    dependency_ids.extend(descriptor.requires.all_binaries());
    dependency_ids.extend(descriptor.requires.agents.iter().cloned());

    let mut dependencies = Vec::new();
    let mut missing = Vec::new();
    for dep_id in &dependency_ids {
        match resolve_leaf(dep_id, client, &index, paths) {
            Ok(node) => dependencies.push(node),
            Err(_) => missing.push(dep_id.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(ResolverError::DependencyUnsatisfied { missing });
    }

    let installed = is_installed_on_disk(paths, kind, &name);
    debug!(id = %qualified, deps = dependencies.len(), installed, "resolved package");

    Ok(ResolvedNode {
        id: qualified,
        kind,
        name,
        version: descriptor.version.clone(),
        installed,
        dependencies,
    })
}

fn resolve_leaf(
    dep_id: &str,
    client: &RegistryClient,
    index: &forge_registry::RegistryIndex,
    paths: &ForgePaths,
) -> ResolverResult<ResolvedNode> {
    let (kind, name) = forge_core::parse_package_id(dep_id)?;
    let qualified = forge_core::create_package_id(kind, &name);
    let descriptor = client.get_package(index, &qualified)?;
    Ok(ResolvedNode {
        id: qualified,
        kind,
        name: name.clone(),
        version: descriptor.version.clone(),
        installed: is_installed_on_disk(paths, kind, &name),
        dependencies: Vec::new(),
    })
}

fn is_installed_on_disk(paths: &ForgePaths, kind: Kind, name: &str) -> bool {
    paths.install_dir(kind, name).join("manifest.json").is_file()
}

/// Depth-first post-order traversal producing a valid install order: every
/// dependency precedes its dependent, nodes already installed are skipped,
/// and duplicates are removed via a `visited` set keyed by id.
///
/// When `force` is set, the root package is appended even if it was
/// already marked installed.
#[must_use]
pub fn install_order(root: &ResolvedNode, force: bool) -> Vec<ResolvedNode> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(root, true, force, &mut visited, &mut order);
    order
}

fn visit(
    node: &ResolvedNode,
    is_root: bool,
    force: bool,
    visited: &mut HashSet<String>,
    order: &mut Vec<ResolvedNode>,
) {
    if visited.contains(&node.id) {
        return;
    }
    for dep in &node.dependencies {
        visit(dep, false, false, visited, order);
    }
    visited.insert(node.id.clone());
    if node.installed && !(is_root && force) {
        return;
    }
    order.push(node.clone());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: &str, kind: Kind, installed: bool) -> ResolvedNode {
        let (_, name) = forge_core::parse_package_id(id).unwrap();
        ResolvedNode {
            id: id.to_string(),
            kind,
            name,
            version: "1.0.0".to_string(),
            installed,
            dependencies: vec![],
        }
    }

    #[test]
    fn install_order_places_dependencies_before_dependents() {
        let root = ResolvedNode {
            id: "stack:demo".to_string(),
            kind: Kind::Stack,
            name: "demo".to_string(),
            version: "1.0.0".to_string(),
            installed: false,
            dependencies: vec![
                leaf("runtime:node", Kind::Runtime, false),
                leaf("binary:ripgrep", Kind::Binary, false),
            ],
        };

        let order = install_order(&root, false);
        let ids: Vec<_> = order.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["runtime:node", "binary:ripgrep", "stack:demo"]);
    }

    #[test]
    fn install_order_skips_already_installed_dependencies() {
        let root = ResolvedNode {
            id: "stack:demo".to_string(),
            kind: Kind::Stack,
            name: "demo".to_string(),
            version: "1.0.0".to_string(),
            installed: false,
            dependencies: vec![leaf("runtime:node", Kind::Runtime, true)],
        };

        let order = install_order(&root, false);
        let ids: Vec<_> = order.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["stack:demo"]);
    }

    #[test]
    fn install_order_dedups_shared_dependencies() {
        let shared = leaf("runtime:node", Kind::Runtime, false);
        let root = ResolvedNode {
            id: "stack:demo".to_string(),
            kind: Kind::Stack,
            name: "demo".to_string(),
            version: "1.0.0".to_string(),
            installed: false,
            dependencies: vec![shared.clone(), shared],
        };

        let order = install_order(&root, false);
        let ids: Vec<_> = order.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["runtime:node", "stack:demo"]);
    }

    #[test]
    fn force_appends_already_installed_root() {
        let root = leaf("stack:demo", Kind::Stack, true);
        let order = install_order(&root, true);
        assert_eq!(order.len(), 1);
        assert_eq!(order[0].id, "stack:demo");

        let order_no_force = install_order(&root, false);
        assert!(order_no_force.is_empty());
    }
}
