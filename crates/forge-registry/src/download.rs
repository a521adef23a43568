//! Artifact download, archive extraction, and hash verification
//! (spec.md §4.B).

use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};

/// Supported archive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `.zip`
    Zip,
    /// `.tar.gz` / `.tgz`
    TarGz,
    /// `.tar.xz`
    TarXz,
}

impl ArchiveKind {
    /// Parse a declared archive type string (`"zip"`, `"tar.gz"`, `"tgz"`,
    /// `"tar.xz"`).
    #[must_use]
    pub fn from_declared(s: &str) -> Option<ArchiveKind> {
        match s {
            "zip" => Some(ArchiveKind::Zip),
            "tar.gz" | "tgz" => Some(ArchiveKind::TarGz),
            "tar.xz" => Some(ArchiveKind::TarXz),
            _ => None,
        }
    }

    /// Infer the archive kind from a URL when the registry did not declare
    /// one. `.tar.gz|.tgz → tar.gz`, `.tar.xz → tar.xz`, `.zip → zip`,
    /// otherwise defaults to `tar.gz`.
    #[must_use]
    pub fn infer_from_url(url: &str) -> ArchiveKind {
        let lower = url.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            ArchiveKind::TarGz
        } else if lower.ends_with(".tar.xz") {
            ArchiveKind::TarXz
        } else if lower.ends_with(".zip") {
            ArchiveKind::Zip
        } else {
            ArchiveKind::TarGz
        }
    }

    fn label(self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::TarGz => "tar.gz",
            ArchiveKind::TarXz => "tar.xz",
        }
    }
}

/// Download `url` to a file inside `dest_dir`, returning the path written.
///
/// The file name is derived from the URL's last path segment, falling back
/// to `artifact.bin` when it cannot be determined.
///
/// # Errors
///
/// Returns [`RegistryError::DownloadFailed`] on a non-2xx response or a
/// transport failure, and [`RegistryError::Io`] if the response body cannot
/// be written to disk.
pub async fn download_to(
    client: &reqwest::Client,
    url: &str,
    dest_dir: &Path,
) -> RegistryResult<PathBuf> {
    let response =
        client
            .get(url)
            .send()
            .await
            .map_err(|_| RegistryError::DownloadFailed {
                url: url.to_string(),
                status: None,
            })?;

    let status = response.status();
    if !status.is_success() {
        return Err(RegistryError::DownloadFailed {
            url: url.to_string(),
            status: Some(status.as_u16()),
        });
    }

    let file_name = url
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("artifact.bin");
    let dest_path = dest_dir.join(file_name);

    std::fs::create_dir_all(dest_dir).map_err(|source| RegistryError::Io {
        path: dest_dir.display().to_string(),
        source,
    })?;

    let bytes = response
        .bytes()
        .await
        .map_err(|_| RegistryError::DownloadFailed {
            url: url.to_string(),
            status: None,
        })?;

    std::fs::write(&dest_path, &bytes).map_err(|source| RegistryError::Io {
        path: dest_path.display().to_string(),
        source,
    })?;

    debug!(url, path = %dest_path.display(), bytes = bytes.len(), "downloaded artifact");
    Ok(dest_path)
}

/// Extract `archive` (of the given kind) into `dest_dir`.
///
/// # Errors
///
/// Returns [`RegistryError::ExtractFailed`] if the archive cannot be read
/// or a member cannot be written.
pub fn extract_archive(
    archive: &Path,
    kind: ArchiveKind,
    dest_dir: &Path,
    strip_components: usize,
) -> RegistryResult<()> {
    std::fs::create_dir_all(dest_dir).map_err(|source| RegistryError::Io {
        path: dest_dir.display().to_string(),
        source,
    })?;

    let result = match kind {
        ArchiveKind::Zip => extract_zip(archive, dest_dir),
        ArchiveKind::TarGz => extract_tar(archive, dest_dir, strip_components, |f| {
            Box::new(flate2::read::GzDecoder::new(f))
        }),
        ArchiveKind::TarXz => extract_tar(archive, dest_dir, strip_components, |f| {
            Box::new(xz2::read::XzDecoder::new(f))
        }),
    };

    result.map_err(|message| RegistryError::ExtractFailed {
        archive: archive.display().to_string(),
        kind: kind.label().to_string(),
        message,
    })
}

fn extract_zip(archive: &Path, dest_dir: &Path) -> Result<(), String> {
    let file = std::fs::File::open(archive).map_err(|e| e.to_string())?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;
    zip.extract(dest_dir).map_err(|e| e.to_string())?;
    Ok(())
}

fn extract_tar<'a>(
    archive: &Path,
    dest_dir: &Path,
    strip_components: usize,
    decoder: impl FnOnce(std::fs::File) -> Box<dyn Read + 'a>,
) -> Result<(), String> {
    let file = std::fs::File::open(archive).map_err(|e| e.to_string())?;
    let reader = decoder(file);
    let mut archive = tar::Archive::new(reader);

    if strip_components == 0 {
        archive.unpack(dest_dir).map_err(|e| e.to_string())?;
        return Ok(());
    }

    for entry in archive.entries().map_err(|e| e.to_string())? {
        let mut entry = entry.map_err(|e| e.to_string())?;
        let path = entry.path().map_err(|e| e.to_string())?.into_owned();
        let stripped: PathBuf = path.components().skip(strip_components).collect();
        if stripped.as_os_str().is_empty() {
            continue;
        }
        let out_path = dest_dir.join(stripped);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        entry.unpack(&out_path).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Resolve a declared `binary` glob (e.g. `"*/bin/rg"`) against the
/// extracted tree, where a `*` segment matches any single path component,
/// first match wins.
///
/// # Errors
///
/// Returns [`RegistryError::ExtractFailed`] if no file matches the pattern.
pub fn resolve_glob_binary(extracted_root: &Path, pattern: &str) -> RegistryResult<PathBuf> {
    let full_pattern = extracted_root.join(pattern);
    let pattern_str = full_pattern.to_string_lossy().to_string();

    let mut matches = glob::glob(&pattern_str).map_err(|e| RegistryError::ExtractFailed {
        archive: extracted_root.display().to_string(),
        kind: "glob".to_string(),
        message: e.to_string(),
    })?;

    match matches.find_map(Result::ok) {
        Some(path) => Ok(path),
        None => Err(RegistryError::ExtractFailed {
            archive: extracted_root.display().to_string(),
            kind: "glob".to_string(),
            message: format!("no file matched pattern {pattern}"),
        }),
    }
}

/// Copy `source` into `install_root` under its own file name and mark it
/// executable (mode `0755` on Unix).
///
/// # Errors
///
/// Returns [`RegistryError::Io`] if the copy or permission change fails.
pub fn relocate_executable(source: &Path, install_root: &Path) -> RegistryResult<PathBuf> {
    let file_name = source.file_name().ok_or_else(|| RegistryError::Io {
        path: source.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
    })?;
    let dest = install_root.join(file_name);
    std::fs::create_dir_all(install_root).map_err(|source_err| RegistryError::Io {
        path: install_root.display().to_string(),
        source: source_err,
    })?;
    std::fs::copy(source, &dest).map_err(|source_err| RegistryError::Io {
        path: dest.display().to_string(),
        source: source_err,
    })?;
    make_executable(&dest)?;
    Ok(dest)
}

/// Set mode `0755` on Unix; a no-op on other platforms.
///
/// # Errors
///
/// Returns [`RegistryError::Io`] if the permission change fails.
pub fn make_executable(path: &Path) -> RegistryResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(
            |source| RegistryError::Io {
                path: path.display().to_string(),
                source,
            },
        )?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Compute the SHA-256 digest of a file, hex-encoded.
///
/// # Errors
///
/// Returns [`RegistryError::Io`] if the file cannot be read.
pub fn compute_hash(path: &Path) -> RegistryResult<String> {
    let mut file = std::fs::File::open(path).map_err(|source| RegistryError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Verify that a file's SHA-256 digest matches `expected_hex` (case
/// insensitive).
///
/// # Errors
///
/// Returns [`RegistryError::HashMismatch`] if the digests differ, or
/// propagates I/O errors from [`compute_hash`].
pub fn verify_hash(path: &Path, expected_hex: &str) -> RegistryResult<()> {
    let actual = compute_hash(path)?;
    if actual.eq_ignore_ascii_case(expected_hex) {
        Ok(())
    } else {
        warn!(path = %path.display(), expected = expected_hex, actual, "hash mismatch");
        Err(RegistryError::HashMismatch {
            path: path.display().to_string(),
            expected: expected_hex.to_string(),
            actual,
        })
    }
}

/// A single entry returned by the registry-hosting platform's directory
/// contents API.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ContentEntry {
    /// File or directory name, relative to its parent.
    pub name: String,
    /// `"file"` or `"dir"`.
    #[serde(rename = "type")]
    pub entry_type: String,
    /// Raw-content URL, present for files.
    pub download_url: Option<String>,
}

/// Files always fetched for a stack/prompt source-directory install, when
/// present.
pub const OPTIONAL_TOP_LEVEL_FILES: &[&str] =
    &["package.json", ".env.example", "tsconfig.json", "requirements.txt"];

/// Subdirectories recursively mirrored in full when present at the top
/// level of a source-directory install.
pub const MIRRORED_SUBDIRECTORIES: &[&str] = &["src", "dist", "node", "python", "lib"];

/// List the contents of a single directory via the registry-hosting
/// platform's contents API (`GET <contents_api_base>/<path>`).
///
/// # Errors
///
/// Returns [`RegistryError::DownloadFailed`] on a non-2xx response or
/// transport failure.
pub async fn list_directory(
    client: &reqwest::Client,
    contents_api_base: &str,
    path: &str,
) -> RegistryResult<Vec<ContentEntry>> {
    let url = format!("{}/{}", contents_api_base.trim_end_matches('/'), path);
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|_| RegistryError::DownloadFailed {
            url: url.clone(),
            status: None,
        })?;
    if !response.status().is_success() {
        return Err(RegistryError::DownloadFailed {
            url,
            status: Some(response.status().as_u16()),
        });
    }
    response
        .json::<Vec<ContentEntry>>()
        .await
        .map_err(|_| RegistryError::DownloadFailed { url, status: None })
}

/// Download a single file's bytes and write them to `dest`.
///
/// # Errors
///
/// Returns [`RegistryError::DownloadFailed`] or [`RegistryError::Io`].
pub async fn download_file_to(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> RegistryResult<()> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|_| RegistryError::DownloadFailed {
            url: url.to_string(),
            status: None,
        })?;
    if !response.status().is_success() {
        return Err(RegistryError::DownloadFailed {
            url: url.to_string(),
            status: Some(response.status().as_u16()),
        });
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|source| RegistryError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|_| RegistryError::DownloadFailed {
            url: url.to_string(),
            status: None,
        })?;
    std::fs::write(dest, &bytes).map_err(|source| RegistryError::Io {
        path: dest.display().to_string(),
        source,
    })
}

/// Recursively mirror a single directory entry (one of
/// [`MIRRORED_SUBDIRECTORIES`]) into `dest_dir`.
///
/// # Errors
///
/// Propagates [`RegistryError::DownloadFailed`]/[`RegistryError::Io`] from
/// the underlying listing/download calls.
pub async fn download_directory_recursive(
    client: &reqwest::Client,
    contents_api_base: &str,
    remote_path: &str,
    dest_dir: &Path,
) -> RegistryResult<()> {
    let entries = list_directory(client, contents_api_base, remote_path).await?;
    for entry in entries {
        let child_remote = format!("{remote_path}/{}", entry.name);
        let child_dest = dest_dir.join(&entry.name);
        if entry.entry_type == "dir" {
            Box::pin(download_directory_recursive(
                client,
                contents_api_base,
                &child_remote,
                &child_dest,
            ))
            .await?;
        } else if let Some(download_url) = entry.download_url {
            download_file_to(client, &download_url, &child_dest).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_archive_kind_from_extension() {
        assert_eq!(
            ArchiveKind::infer_from_url("https://x/y.tar.gz"),
            ArchiveKind::TarGz
        );
        assert_eq!(
            ArchiveKind::infer_from_url("https://x/y.tgz"),
            ArchiveKind::TarGz
        );
        assert_eq!(
            ArchiveKind::infer_from_url("https://x/y.tar.xz"),
            ArchiveKind::TarXz
        );
        assert_eq!(
            ArchiveKind::infer_from_url("https://x/y.zip"),
            ArchiveKind::Zip
        );
        assert_eq!(
            ArchiveKind::infer_from_url("https://x/y"),
            ArchiveKind::TarGz
        );
    }

    #[test]
    fn declared_type_parses_known_strings() {
        assert_eq!(ArchiveKind::from_declared("tgz"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_declared("bogus"), None);
    }

    #[test]
    fn compute_and_verify_hash_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"hello world").unwrap();
        let digest = compute_hash(&path).unwrap();
        assert!(verify_hash(&path, &digest).is_ok());
        assert!(verify_hash(&path, "deadbeef").is_err());
    }

    #[test]
    fn resolve_glob_binary_matches_single_star_segment() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("rg-1.0-linux").join("bin");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("rg"), b"#!/bin/sh").unwrap();

        let found = resolve_glob_binary(dir.path(), "*/bin/rg").unwrap();
        assert_eq!(found, nested.join("rg"));
    }
}
