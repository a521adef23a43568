//! Per-kind install strategies (spec.md §4.B, §4.E).

use std::path::{Path, PathBuf};

use chrono::Utc;
use forge_core::{Kind, ForgePaths};
use forge_registry::{ArchiveKind, PackageDescriptor, RegistryClient};
use tracing::{info, warn};

use crate::command_runner::CommandRunner;
use crate::error::{InstallerError, InstallerResult};
use crate::types::{InstalledRecord, Phase, ProgressEvent, Source};

const RUNTIME_RELEASE_BASE: &str = "https://runtimes.forge.dev";

/// Install a `runtime` or `binary` package: prefers `npmPackage`/`pipPackage`
/// hints, then a tarball download, then falls back to a placeholder record
/// on total failure so retries stay idempotent.
pub async fn install_runtime_or_binary(
    descriptor: &PackageDescriptor,
    kind: Kind,
    paths: &ForgePaths,
    runner: &dyn CommandRunner,
    on_progress: &dyn Fn(ProgressEvent),
) -> InstallerResult<InstalledRecord> {
    let install_dir = paths.install_dir(kind, &descriptor.name);

    if let Some(npm_package) = &descriptor.npm_package {
        return install_via_npm(descriptor, kind, npm_package, &install_dir, paths, runner, on_progress).await;
    }
    if let Some(pip_package) = &descriptor.pip_package {
        return install_via_pip(descriptor, kind, pip_package, &install_dir, paths, runner, on_progress).await;
    }

    match try_tarball_install(descriptor, kind, &install_dir, on_progress).await {
        Ok(record) => Ok(record),
        Err(err) => {
            warn!(id = %descriptor.id, error = %err, "download failed, writing placeholder install");
            write_placeholder(descriptor, kind, &install_dir, &err.to_string())
        }
    }
}

async fn try_tarball_install(
    descriptor: &PackageDescriptor,
    kind: Kind,
    install_dir: &Path,
    on_progress: &dyn Fn(ProgressEvent),
) -> InstallerResult<InstalledRecord> {
    let platform_arch = forge_core::platform_arch();
    on_progress(ProgressEvent::phase(Phase::Downloading, &descriptor.id));

    let http = reqwest::Client::new();
    let download_dir = tempfile::tempdir().map_err(|source| InstallerError::Io {
        path: std::env::temp_dir(),
        source,
    })?;

    let binaries = if let Some(entries) = descriptor.downloads.get(&platform_arch) {
        multi_download(&http, entries, download_dir.path(), install_dir, on_progress, &descriptor.id).await?
    } else if let (Some(url), Some(archive_type)) = (
        descriptor.upstream.get(&platform_arch),
        descriptor.extract.get(&platform_arch),
    ) {
        legacy_download(
            &http,
            url,
            archive_type,
            descriptor.binary.as_deref().unwrap_or(&descriptor.name),
            download_dir.path(),
            install_dir,
            on_progress,
            &descriptor.id,
        )
        .await?
    } else if kind == Kind::Runtime {
        runtime_prerelease_download(&http, &descriptor.name, &descriptor.version, &platform_arch, install_dir, on_progress, &descriptor.id).await?
    } else {
        return Err(InstallerError::Registry(
            forge_registry::RegistryError::PackageNotFound(format!(
                "{}: no download strategy for {platform_arch}",
                descriptor.id
            )),
        ));
    };

    on_progress(ProgressEvent::phase(Phase::Installing, &descriptor.id));
    write_manifest(descriptor, kind, install_dir, Source::Registry, Some(platform_arch), binaries.clone())?;
    on_progress(ProgressEvent::phase(Phase::Installed, &descriptor.id));

    Ok(InstalledRecord {
        id: descriptor.id.clone(),
        kind,
        name: descriptor.name.clone(),
        version: descriptor.version.clone(),
        installed_at: Utc::now(),
        source: Source::Registry,
        platform_arch: Some(forge_core::platform_arch()),
        binaries,
        error: None,
        source_path: None,
    })
}

async fn multi_download(
    http: &reqwest::Client,
    entries: &[forge_registry::DownloadEntry],
    download_dir: &Path,
    install_dir: &Path,
    on_progress: &dyn Fn(ProgressEvent),
    package_id: &str,
) -> InstallerResult<Vec<String>> {
    std::fs::create_dir_all(install_dir).map_err(|source| InstallerError::Io {
        path: install_dir.to_path_buf(),
        source,
    })?;

    let mut fetched_archives: std::collections::HashMap<String, PathBuf> = std::collections::HashMap::new();
    let mut binaries = Vec::new();

    for entry in entries {
        let extract_dir = download_dir.join(sanitize(&entry.url));
        if !fetched_archives.contains_key(&entry.url) {
            let archive = forge_registry::download_to(http, &entry.url, download_dir).await?;
            let kind = entry
                .archive_type
                .as_deref()
                .and_then(ArchiveKind::from_declared)
                .unwrap_or_else(|| ArchiveKind::infer_from_url(&entry.url));
            forge_registry::extract_archive(&archive, kind, &extract_dir, 0)?;
            fetched_archives.insert(entry.url.clone(), extract_dir.clone());
        }
        let extracted_root = &fetched_archives[&entry.url];
        let found = forge_registry::resolve_glob_binary(extracted_root, &entry.binary)?;
        let relocated = forge_registry::relocate_executable(&found, install_dir)?;
        on_progress(
            ProgressEvent::phase(Phase::Extracting, package_id)
                .with_message(format!("relocated {}", relocated.display())),
        );
        if let Some(name) = relocated.file_name().and_then(|n| n.to_str()) {
            binaries.push(name.to_string());
        }
    }
    Ok(binaries)
}

#[allow(clippy::too_many_arguments)]
async fn legacy_download(
    http: &reqwest::Client,
    url: &str,
    archive_type: &str,
    binary_name: &str,
    download_dir: &Path,
    install_dir: &Path,
    on_progress: &dyn Fn(ProgressEvent),
    package_id: &str,
) -> InstallerResult<Vec<String>> {
    std::fs::create_dir_all(install_dir).map_err(|source| InstallerError::Io {
        path: install_dir.to_path_buf(),
        source,
    })?;
    let archive = forge_registry::download_to(http, url, download_dir).await?;
    let kind = ArchiveKind::from_declared(archive_type).unwrap_or_else(|| ArchiveKind::infer_from_url(url));
    let extract_dir = download_dir.join("extracted");
    forge_registry::extract_archive(&archive, kind, &extract_dir, 0)?;
    let found = forge_registry::resolve_glob_binary(&extract_dir, binary_name)
        .or_else(|_| forge_registry::resolve_glob_binary(&extract_dir, &format!("**/{binary_name}")))
        .unwrap_or_else(|_| extract_dir.join(binary_name));
    let relocated = forge_registry::relocate_executable(&found, install_dir)?;
    on_progress(ProgressEvent::phase(Phase::Extracting, package_id));
    Ok(relocated
        .file_name()
        .and_then(|n| n.to_str())
        .map(|s| vec![s.to_string()])
        .unwrap_or_default())
}

async fn runtime_prerelease_download(
    http: &reqwest::Client,
    runtime_name: &str,
    version: &str,
    platform_arch: &str,
    install_dir: &Path,
    on_progress: &dyn Fn(ProgressEvent),
    package_id: &str,
) -> InstallerResult<Vec<String>> {
    let short_version = version.split('.').next().unwrap_or(version);
    let url = format!(
        "{RUNTIME_RELEASE_BASE}/{runtime_name}-{short_version}-{platform_arch}.tar.gz"
    );
    let download_dir = tempfile::tempdir().map_err(|source| InstallerError::Io {
        path: std::env::temp_dir(),
        source,
    })?;
    let archive = forge_registry::download_to(http, &url, download_dir.path()).await?;
    forge_registry::extract_archive(&archive, ArchiveKind::TarGz, install_dir, 1)?;
    on_progress(ProgressEvent::phase(Phase::Extracting, package_id));

    let runtime_json = serde_json::json!({
        "name": runtime_name,
        "version": version,
        "platformArch": platform_arch,
    });
    std::fs::write(
        install_dir.join("runtime.json"),
        serde_json::to_vec_pretty(&runtime_json).unwrap_or_default(),
    )
    .map_err(|source| InstallerError::Io {
        path: install_dir.join("runtime.json"),
        source,
    })?;

    Ok(vec![])
}

/// Install an `agent` package, preferring `npmPackage`/`pipPackage` hints.
pub async fn install_agent(
    descriptor: &PackageDescriptor,
    paths: &ForgePaths,
    runner: &dyn CommandRunner,
    on_progress: &dyn Fn(ProgressEvent),
) -> InstallerResult<InstalledRecord> {
    let install_dir = paths.agent_dir(&descriptor.name);
    if let Some(npm_package) = &descriptor.npm_package {
        return install_via_npm(
            descriptor,
            Kind::Agent,
            npm_package,
            &install_dir,
            paths,
            runner,
            on_progress,
        )
        .await;
    }
    if let Some(pip_package) = &descriptor.pip_package {
        return install_via_pip(
            descriptor,
            Kind::Agent,
            pip_package,
            &install_dir,
            paths,
            runner,
            on_progress,
        )
        .await;
    }
    write_placeholder(
        descriptor,
        Kind::Agent,
        &install_dir,
        "agent descriptor has neither npmPackage nor pipPackage",
    )
}

/// npm-backed install: initialises a local package directory and installs
/// via the bundled Node's package manager when present, else system `npm`.
async fn install_via_npm(
    descriptor: &PackageDescriptor,
    kind: Kind,
    npm_package: &str,
    install_dir: &Path,
    paths: &ForgePaths,
    runner: &dyn CommandRunner,
    on_progress: &dyn Fn(ProgressEvent),
) -> InstallerResult<InstalledRecord> {
    std::fs::create_dir_all(install_dir).map_err(|source| InstallerError::Io {
        path: install_dir.to_path_buf(),
        source,
    })?;

    let package_json = serde_json::json!({
        "name": format!("forge-{}-install", descriptor.name),
        "private": true,
        "dependencies": { npm_package: "*" },
    });
    std::fs::write(
        install_dir.join("package.json"),
        serde_json::to_vec_pretty(&package_json).unwrap_or_default(),
    )
    .map_err(|source| InstallerError::Io {
        path: install_dir.join("package.json"),
        source,
    })?;

    on_progress(ProgressEvent::phase(Phase::Installing, &descriptor.id));
    let npm_bin = bundled_npm_path(paths).unwrap_or_else(|| "npm".to_string());
    let output = runner
        .run(&npm_bin, &["install".to_string()], install_dir)
        .await
        .map_err(|source| InstallerError::Io {
            path: install_dir.to_path_buf(),
            source,
        })?;
    if !output.success {
        return Err(InstallerError::CommandFailed {
            program: npm_bin,
            status: output.status,
            stderr: output.stderr,
        });
    }

    write_manifest(descriptor, kind, install_dir, Source::Npm, None, vec![])?;
    on_progress(ProgressEvent::phase(Phase::Installed, &descriptor.id));
    Ok(InstalledRecord {
        id: descriptor.id.clone(),
        kind,
        name: descriptor.name.clone(),
        version: descriptor.version.clone(),
        installed_at: Utc::now(),
        source: Source::Npm,
        platform_arch: None,
        binaries: vec![],
        error: None,
        source_path: None,
    })
}

/// pip-backed install: creates an isolated virtualenv under
/// `<install>/venv` using the bundled Python when present, else system
/// `python3`.
async fn install_via_pip(
    descriptor: &PackageDescriptor,
    kind: Kind,
    pip_package: &str,
    install_dir: &Path,
    paths: &ForgePaths,
    runner: &dyn CommandRunner,
    on_progress: &dyn Fn(ProgressEvent),
) -> InstallerResult<InstalledRecord> {
    std::fs::create_dir_all(install_dir).map_err(|source| InstallerError::Io {
        path: install_dir.to_path_buf(),
        source,
    })?;

    let python_bin = bundled_python_path(paths).unwrap_or_else(|| "python3".to_string());
    let venv_dir = install_dir.join("venv");

    on_progress(ProgressEvent::phase(Phase::Installing, &descriptor.id));
    let venv_output = runner
        .run(
            &python_bin,
            &["-m".to_string(), "venv".to_string(), venv_dir.display().to_string()],
            install_dir,
        )
        .await
        .map_err(|source| InstallerError::Io {
            path: install_dir.to_path_buf(),
            source,
        })?;
    if !venv_output.success {
        return Err(InstallerError::CommandFailed {
            program: python_bin,
            status: venv_output.status,
            stderr: venv_output.stderr,
        });
    }

    let venv_pip = venv_dir.join("bin").join("pip");
    let pip_output = runner
        .run(
            &venv_pip.display().to_string(),
            &["install".to_string(), pip_package.to_string()],
            install_dir,
        )
        .await
        .map_err(|source| InstallerError::Io {
            path: install_dir.to_path_buf(),
            source,
        })?;
    if !pip_output.success {
        return Err(InstallerError::CommandFailed {
            program: venv_pip.display().to_string(),
            status: pip_output.status,
            stderr: pip_output.stderr,
        });
    }

    write_manifest(descriptor, kind, install_dir, Source::Pip, None, vec![])?;
    on_progress(ProgressEvent::phase(Phase::Installed, &descriptor.id));
    Ok(InstalledRecord {
        id: descriptor.id.clone(),
        kind,
        name: descriptor.name.clone(),
        version: descriptor.version.clone(),
        installed_at: Utc::now(),
        source: Source::Pip,
        platform_arch: None,
        binaries: vec![],
        error: None,
        source_path: None,
    })
}

fn bundled_npm_path(paths: &ForgePaths) -> Option<String> {
    if let Ok(resources) = std::env::var("RESOURCES_PATH") {
        let candidate = PathBuf::from(resources).join("bundled-runtimes/node/bin/npm");
        if candidate.is_file() {
            return Some(candidate.display().to_string());
        }
    }
    let candidate = paths.runtime_dir("node").join("bin").join("npm");
    candidate.is_file().then(|| candidate.display().to_string())
}

fn bundled_python_path(paths: &ForgePaths) -> Option<String> {
    let candidate = paths.runtime_dir("python").join("bin").join("python3");
    candidate.is_file().then(|| candidate.display().to_string())
}

/// Install a `stack` or `prompt` package by source download, then write a
/// synthesised `manifest.json` recording `source:"registry"`.
pub async fn install_stack_or_prompt(
    descriptor: &PackageDescriptor,
    kind: Kind,
    paths: &ForgePaths,
    client: &RegistryClient,
    on_progress: &dyn Fn(ProgressEvent),
) -> InstallerResult<InstalledRecord> {
    let install_dir = paths.install_dir(kind, &descriptor.name);
    std::fs::create_dir_all(&install_dir).map_err(|source| InstallerError::Io {
        path: install_dir.clone(),
        source,
    })?;

    on_progress(ProgressEvent::phase(Phase::Downloading, &descriptor.id));
    client.download_source_directory(descriptor, &install_dir).await?;

    // The download just wrote the package's own manifest.json (kind-specific
    // shape, e.g. a StackManifest). Preserve it under a distinct name before
    // overwriting manifest.json with the synthesised InstalledRecord below —
    // agent registration and tool indexing need the original shape later.
    let source_manifest = install_dir.join("manifest.json");
    let preserved_manifest = install_dir.join("source.manifest.json");
    if source_manifest.is_file() {
        std::fs::rename(&source_manifest, &preserved_manifest).map_err(|source| InstallerError::Io {
            path: preserved_manifest.clone(),
            source,
        })?;
    }

    write_manifest(descriptor, kind, &install_dir, Source::Registry, None, vec![])?;
    on_progress(ProgressEvent::phase(Phase::Installed, &descriptor.id));

    info!(id = %descriptor.id, path = %install_dir.display(), "installed source-directory package");
    Ok(InstalledRecord {
        id: descriptor.id.clone(),
        kind,
        name: descriptor.name.clone(),
        version: descriptor.version.clone(),
        installed_at: Utc::now(),
        source: Source::Registry,
        platform_arch: None,
        binaries: vec![],
        error: None,
        source_path: None,
    })
}

fn write_manifest(
    descriptor: &PackageDescriptor,
    kind: Kind,
    install_dir: &Path,
    source: Source,
    platform_arch: Option<String>,
    binaries: Vec<String>,
) -> InstallerResult<()> {
    let record = InstalledRecord {
        id: descriptor.id.clone(),
        kind,
        name: descriptor.name.clone(),
        version: descriptor.version.clone(),
        installed_at: Utc::now(),
        source,
        platform_arch,
        binaries,
        error: None,
        source_path: None,
    };
    let path = install_dir.join("manifest.json");
    std::fs::write(
        &path,
        serde_json::to_vec_pretty(&record).map_err(|e| InstallerError::Serde {
            path: path.clone(),
            message: e.to_string(),
        })?,
    )
    .map_err(|source| InstallerError::Io { path, source })
}

fn write_placeholder(
    descriptor: &PackageDescriptor,
    kind: Kind,
    install_dir: &Path,
    error: &str,
) -> InstallerResult<InstalledRecord> {
    std::fs::create_dir_all(install_dir).map_err(|source| InstallerError::Io {
        path: install_dir.to_path_buf(),
        source,
    })?;
    let record = InstalledRecord {
        id: descriptor.id.clone(),
        kind,
        name: descriptor.name.clone(),
        version: descriptor.version.clone(),
        installed_at: Utc::now(),
        source: Source::Placeholder,
        platform_arch: None,
        binaries: vec![],
        error: Some(error.to_string()),
        source_path: None,
    };
    let path = install_dir.join("manifest.json");
    std::fs::write(
        &path,
        serde_json::to_vec_pretty(&record).map_err(|e| InstallerError::Serde {
            path: path.clone(),
            message: e.to_string(),
        })?,
    )
    .map_err(|source| InstallerError::Io { path, source })?;
    Ok(record)
}

fn sanitize(url: &str) -> String {
    url.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
