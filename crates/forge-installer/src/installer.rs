//! Install orchestration: resolve, walk install order, install each node,
//! write lockfiles (spec.md §4.D, §4.E).

use std::path::Path;

use forge_core::{ForgePaths, Kind};
use forge_registry::RegistryClient;
use forge_resolver::{install_order, resolve};
use tracing::{info, warn};

use crate::command_runner::CommandRunner;
use crate::error::{InstallerError, InstallerResult};
use crate::lockfile::{checksum, LockedDependency, Lockfile};
use crate::strategies;
use crate::types::{InstallOutcome, InstalledRecord, Phase, ProgressEvent};

/// Options controlling a single [`install`] call.
#[derive(Default)]
pub struct InstallOptions<'a> {
    /// Reinstall even if already present on disk.
    pub force: bool,
    /// Invoked for every [`ProgressEvent`] emitted during the install.
    pub on_progress: Option<&'a dyn Fn(ProgressEvent)>,
}

/// Resolve `id`'s dependency tree, install every unresolved node in
/// dependency order, and write a lockfile for the root package.
///
/// A failure installing any node aborts the remaining batch; packages
/// already installed earlier in the batch are not rolled back (spec.md
/// §4.E failure policy).
///
/// # Errors
///
/// Propagates [`forge_resolver::ResolverError`] (wrapped) if resolution
/// fails, and any per-node install failure that is not absorbed into a
/// placeholder record.
pub async fn install(
    id: &str,
    paths: &ForgePaths,
    client: &RegistryClient,
    runner: &dyn CommandRunner,
    options: InstallOptions<'_>,
) -> InstallerResult<InstallOutcome> {
    let noop = |_: ProgressEvent| {};
    let emit: &dyn Fn(ProgressEvent) = options.on_progress.unwrap_or(&noop);

    emit(ProgressEvent::phase(Phase::Resolving, id));
    let root = resolve(id, client, paths).await?;

    if root.installed && !options.force {
        info!(id = %root.id, "already installed, skipping");
        return Ok(InstallOutcome {
            success: true,
            id: root.id,
            error: None,
            already_installed: true,
        });
    }

    let order = install_order(&root, options.force);
    let mut installed_records: Vec<InstalledRecord> = Vec::new();

    for node in &order {
        let index = client.fetch_index(false).await?;
        let descriptor = client.get_package(&index, &node.id)?;

        let record = match node.kind {
            Kind::Runtime | Kind::Binary => {
                strategies::install_runtime_or_binary(&descriptor, node.kind, paths, runner, emit).await?
            }
            Kind::Agent => strategies::install_agent(&descriptor, paths, runner, emit).await?,
            Kind::Stack | Kind::Prompt => {
                strategies::install_stack_or_prompt(&descriptor, node.kind, paths, client, emit).await?
            }
        };

        if let Some(error) = &record.error {
            warn!(id = %node.id, error, "install recorded a placeholder after failure");
        }
        installed_records.push(record);
    }

    emit(ProgressEvent::phase(Phase::Lockfile, &root.id));
    let dependencies: Vec<LockedDependency> = root
        .dependencies
        .iter()
        .map(|dep| LockedDependency {
            id: dep.id.clone(),
            version: dep.version.clone(),
            checksum: checksum(&dep.id, &dep.version, &dep.name),
        })
        .collect();
    let lock = Lockfile {
        id: root.id.clone(),
        version: root.version.clone(),
        name: root.name.clone(),
        installed_at: chrono::Utc::now(),
        checksum: checksum(&root.id, &root.version, &root.name),
        dependencies,
    };
    lock.write(paths, root.kind, &root.name)?;

    emit(ProgressEvent::phase(Phase::Installed, &root.id));
    Ok(InstallOutcome {
        success: true,
        id: root.id,
        error: None,
        already_installed: false,
    })
}

/// Install from a local directory instead of the registry
/// (`installFromLocal`): reads the stack manifest, replaces any existing
/// install directory, and copies the tree excluding `node_modules`/`.git`.
///
/// # Errors
///
/// Returns [`InstallerError::LocalSourceMissing`] if `source_dir` does not
/// exist, and propagates manifest parse/validation and I/O failures.
pub fn install_from_local(source_dir: &Path, paths: &ForgePaths) -> InstallerResult<InstalledRecord> {
    if !source_dir.is_dir() {
        return Err(InstallerError::LocalSourceMissing(source_dir.to_path_buf()));
    }

    let manifest_path = ["stack.yaml", "manifest.yaml", "stack.json", "manifest.json"]
        .iter()
        .map(|f| source_dir.join(f))
        .find(|p| p.is_file())
        .ok_or_else(|| InstallerError::LocalSourceMissing(source_dir.join("stack.yaml")))?;

    let manifest = forge_manifest::load_manifest(&manifest_path, Kind::Stack)?;
    let forge_manifest::Manifest::Stack(stack) = manifest else {
        return Err(InstallerError::LocalSourceMissing(manifest_path));
    };

    let install_dir = paths.stack_dir(&stack.name);
    if install_dir.exists() {
        std::fs::remove_dir_all(&install_dir).map_err(|source| InstallerError::Io {
            path: install_dir.clone(),
            source,
        })?;
    }
    copy_tree_excluding(source_dir, &install_dir, &["node_modules", ".git"])?;

    // Preserve the copied stack manifest before manifest.json is overwritten
    // with the synthesised InstalledRecord below (only matters when the
    // source file was itself named manifest.json).
    let copied_manifest = install_dir.join("manifest.json");
    let preserved_manifest = install_dir.join("source.manifest.json");
    if copied_manifest.is_file() {
        std::fs::rename(&copied_manifest, &preserved_manifest).map_err(|source| InstallerError::Io {
            path: preserved_manifest.clone(),
            source,
        })?;
    }

    let record = InstalledRecord {
        id: stack.id.clone(),
        kind: Kind::Stack,
        name: stack.name.clone(),
        version: stack.version.clone(),
        installed_at: chrono::Utc::now(),
        source: crate::types::Source::Local,
        platform_arch: None,
        binaries: vec![],
        error: None,
        source_path: Some(source_dir.display().to_string()),
    };
    let manifest_out = install_dir.join("manifest.json");
    std::fs::write(
        &manifest_out,
        serde_json::to_vec_pretty(&record).map_err(|e| InstallerError::Serde {
            path: manifest_out.clone(),
            message: e.to_string(),
        })?,
    )
    .map_err(|source| InstallerError::Io {
        path: manifest_out,
        source,
    })?;

    Ok(record)
}

fn copy_tree_excluding(src: &Path, dest: &Path, excluded: &[&str]) -> InstallerResult<()> {
    std::fs::create_dir_all(dest).map_err(|source| InstallerError::Io {
        path: dest.to_path_buf(),
        source,
    })?;
    for entry in walkdir::WalkDir::new(src).min_depth(1).into_iter().filter_entry(|e| {
        !excluded.contains(&e.file_name().to_string_lossy().as_ref())
    }) {
        let entry = entry.map_err(|e| InstallerError::Io {
            path: src.to_path_buf(),
            source: std::io::Error::other(e.to_string()),
        })?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(relative);

        if entry.file_type().is_symlink() {
            continue;
        }
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|source| InstallerError::Io {
                path: target.clone(),
                source,
            })?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|source| InstallerError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            std::fs::copy(entry.path(), &target).map_err(|source| InstallerError::Io {
                path: target.clone(),
                source,
            })?;
        }
    }
    Ok(())
}

/// Remove an installed package's directory and lockfile.
///
/// # Errors
///
/// Returns [`InstallerError::Io`] if the install directory cannot be
/// removed.
pub fn uninstall(id: &str, paths: &ForgePaths) -> InstallerResult<()> {
    let (kind, name) = forge_core::parse_package_id(id)?;
    let install_dir = paths.install_dir(kind, &name);
    if install_dir.exists() {
        std::fs::remove_dir_all(&install_dir).map_err(|source| InstallerError::Io {
            path: install_dir,
            source,
        })?;
    }
    Lockfile::remove(paths, kind, &name)?;
    Ok(())
}

/// List every installed package, across all kinds, by reading each
/// install directory's `manifest.json`.
///
/// # Errors
///
/// Returns [`InstallerError::Io`] if a kind directory cannot be read.
pub fn list_installed(paths: &ForgePaths) -> InstallerResult<Vec<InstalledRecord>> {
    let mut records = Vec::new();
    for kind in Kind::ALL {
        let dir = match kind {
            Kind::Stack => paths.stacks_dir(),
            Kind::Prompt => paths.prompts_dir(),
            Kind::Runtime => paths.runtimes_dir(),
            Kind::Binary => paths.binaries_dir(),
            Kind::Agent => paths.agents_dir(),
        };
        if !dir.is_dir() {
            continue;
        }
        let entries = std::fs::read_dir(&dir).map_err(|source| InstallerError::Io {
            path: dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| InstallerError::Io {
                path: dir.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let manifest_path = entry.path().join("manifest.json");
            let legacy_path = entry.path().join("runtime.json");
            let record = if manifest_path.is_file() {
                read_record(&manifest_path)?
            } else if legacy_path.is_file() {
                continue;
            } else {
                continue;
            };
            if let Some(record) = record {
                records.push(record);
            }
        }
    }
    Ok(records)
}

fn read_record(path: &Path) -> InstallerResult<Option<InstalledRecord>> {
    let contents = std::fs::read_to_string(path).map_err(|source| InstallerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match serde_json::from_str(&contents) {
        Ok(record) => Ok(Some(record)),
        Err(_) => Ok(None),
    }
}

/// Reinstall `id` with `force: true`.
///
/// # Errors
///
/// Same as [`install`].
pub async fn update(
    id: &str,
    paths: &ForgePaths,
    client: &RegistryClient,
    runner: &dyn CommandRunner,
    on_progress: Option<&dyn Fn(ProgressEvent)>,
) -> InstallerResult<InstallOutcome> {
    install(
        id,
        paths,
        client,
        runner,
        InstallOptions {
            force: true,
            on_progress,
        },
    )
    .await
}

/// Reinstall every currently installed package, collecting a per-package
/// outcome without aborting the batch on individual failures.
pub async fn update_all(
    paths: &ForgePaths,
    client: &RegistryClient,
    runner: &dyn CommandRunner,
    on_progress: Option<&dyn Fn(ProgressEvent)>,
) -> InstallerResult<Vec<InstallOutcome>> {
    let installed = list_installed(paths)?;
    let mut outcomes = Vec::with_capacity(installed.len());
    for record in installed {
        match update(&record.id, paths, client, runner, on_progress).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => outcomes.push(InstallOutcome {
                success: false,
                id: record.id,
                error: Some(err.to_string()),
                already_installed: false,
            }),
        }
    }
    Ok(outcomes)
}
