//! Registry index fetch/cache and search (spec.md §4.B).

use std::time::Duration;

use chrono::{DateTime, Utc};
use forge_core::{Kind, ForgePaths};
use tracing::{debug, info, warn};

use crate::download::{
    download_directory_recursive, download_file_to, list_directory, MIRRORED_SUBDIRECTORIES,
    OPTIONAL_TOP_LEVEL_FILES,
};
use crate::error::{RegistryError, RegistryResult};
use crate::index::{PackageDescriptor, RegistryIndex};

/// Cached index entries are considered fresh for this long before a refetch
/// is attempted.
pub const CACHE_FRESHNESS: Duration = Duration::from_secs(24 * 60 * 60);

/// Overrides the remote index URL; mainly for local development against a
/// registry mirror.
pub const ENV_REGISTRY_URL: &str = "FORGE_REGISTRY_URL";
/// Points directly at a local index JSON file, bypassing HTTP entirely.
pub const ENV_REGISTRY_INDEX_PATH: &str = "FORGE_REGISTRY_INDEX_PATH";

const DEFAULT_REGISTRY_URL: &str = "https://registry.forge.dev/index.json";

/// Fetches, caches, and searches the registry index.
pub struct RegistryClient {
    http: reqwest::Client,
    paths: ForgePaths,
    registry_url: String,
}

impl RegistryClient {
    /// Build a client pointed at `paths`'s cache location, honoring
    /// [`ENV_REGISTRY_URL`] when set.
    #[must_use]
    pub fn new(paths: ForgePaths) -> Self {
        let registry_url =
            std::env::var(ENV_REGISTRY_URL).unwrap_or_else(|_| DEFAULT_REGISTRY_URL.to_string());
        Self {
            http: reqwest::Client::new(),
            paths,
            registry_url,
        }
    }

    /// Fetch the registry index, consulting the on-disk cache first.
    ///
    /// Resolution order:
    /// 1. [`ENV_REGISTRY_INDEX_PATH`], when set, is read directly and never
    ///    cached — a pure local override for development.
    /// 2. The cached copy, when it exists and is younger than
    ///    [`CACHE_FRESHNESS`] and `force` is `false`.
    /// 3. An HTTP fetch of `registry_url`, written back to the cache on
    ///    success.
    /// 4. On network failure, the cached copy regardless of age, with a
    ///    warning logged.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::RegistryUnavailable`] when no network
    /// response and no cache (fresh or stale) are available.
    pub async fn fetch_index(&self, force: bool) -> RegistryResult<RegistryIndex> {
        if let Ok(local_path) = std::env::var(ENV_REGISTRY_INDEX_PATH) {
            debug!(path = %local_path, "loading registry index from local override");
            return self.read_index_file(&local_path);
        }

        let cache_path = self.paths.registry_cache_path();

        if !force {
            if let Some(index) = self.read_cache_if_fresh(&cache_path) {
                return Ok(index);
            }
        }

        match self.fetch_remote().await {
            Ok(index) => {
                self.write_cache(&cache_path, &index);
                Ok(index)
            }
            Err(err) => {
                if let Some(index) = self.read_cache_ignoring_age(&cache_path) {
                    warn!(error = %err, "registry fetch failed, falling back to cached index");
                    return Ok(index);
                }
                Err(RegistryError::RegistryUnavailable(err.to_string()))
            }
        }
    }

    async fn fetch_remote(&self) -> Result<RegistryIndex, String> {
        let response = self
            .http
            .get(&self.registry_url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("registry returned {}", response.status()));
        }
        response
            .json::<RegistryIndex>()
            .await
            .map_err(|e| e.to_string())
    }

    fn read_index_file(&self, path: &str) -> RegistryResult<RegistryIndex> {
        let contents = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_string(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| RegistryError::Json {
            path: path.to_string(),
            source,
        })
    }

    fn read_cache_if_fresh(&self, cache_path: &std::path::Path) -> Option<RegistryIndex> {
        let metadata = std::fs::metadata(cache_path).ok()?;
        let modified = metadata.modified().ok()?;
        let age = modified.elapsed().ok()?;
        if age > CACHE_FRESHNESS {
            return None;
        }
        self.read_index_file(cache_path.to_str()?).ok()
    }

    fn read_cache_ignoring_age(&self, cache_path: &std::path::Path) -> Option<RegistryIndex> {
        self.read_index_file(cache_path.to_str()?).ok()
    }

    fn write_cache(&self, cache_path: &std::path::Path, index: &RegistryIndex) {
        let Some(parent) = cache_path.parent() else {
            return;
        };
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(error = %e, "failed to create registry cache directory");
            return;
        }
        match serde_json::to_vec_pretty(index) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(cache_path, bytes) {
                    warn!(error = %e, "failed to write registry cache");
                } else {
                    info!(path = %cache_path.display(), "refreshed registry cache");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize registry index"),
        }
    }

    /// Case-insensitive substring search across id, name, description, and
    /// tags, optionally restricted to one [`Kind`].
    #[must_use]
    pub fn search<'a>(
        &self,
        index: &'a RegistryIndex,
        query: &str,
        kind: Option<Kind>,
    ) -> Vec<&'a PackageDescriptor> {
        let needle = query.to_ascii_lowercase();
        let matches = |d: &PackageDescriptor| -> bool {
            d.id.to_ascii_lowercase().contains(&needle)
                || d.name.to_ascii_lowercase().contains(&needle)
                || d.description.to_ascii_lowercase().contains(&needle)
                || d.tags.iter().any(|t| t.to_ascii_lowercase().contains(&needle))
        };

        match kind {
            Some(k) => index.iter_kind(k).filter(|d| matches(d)).collect(),
            None => index
                .iter_all()
                .filter(|(_, d)| matches(d))
                .map(|(_, d)| d)
                .collect(),
        }
    }

    /// Download a stack/prompt's source directory (`descriptor.path`) from
    /// the registry-hosting platform's contents API into `dest_dir`.
    ///
    /// `manifest.json` is required; `package.json`, `.env.example`,
    /// `tsconfig.json`, and `requirements.txt` are fetched when present;
    /// any of `src/`, `dist/`, `node/`, `python/`, `lib/` present at the
    /// top level are mirrored recursively. A single-file `*.md` descriptor
    /// (prompts with no directory) is fetched verbatim instead.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::PackageNotFound`] if the descriptor has no
    /// `path`, and propagates download/listing failures otherwise.
    pub async fn download_source_directory(
        &self,
        descriptor: &PackageDescriptor,
        dest_dir: &std::path::Path,
    ) -> RegistryResult<()> {
        let path = descriptor
            .path
            .as_deref()
            .ok_or_else(|| RegistryError::PackageNotFound(descriptor.id.clone()))?;

        if path.to_ascii_lowercase().ends_with(".md") {
            let url = format!("{}/{}", self.contents_api_base().trim_end_matches('/'), path);
            let file_name = path.rsplit('/').next().unwrap_or("prompt.md");
            download_file_to(&self.http, &url, &dest_dir.join(file_name)).await?;
            return Ok(());
        }

        let entries = list_directory(&self.http, &self.contents_api_base(), path).await?;
        let mut saw_manifest = false;
        for entry in &entries {
            if entry.entry_type != "file" {
                continue;
            }
            let is_manifest = entry.name == "manifest.json";
            let is_optional = OPTIONAL_TOP_LEVEL_FILES.contains(&entry.name.as_str());
            if !is_manifest && !is_optional {
                continue;
            }
            if let Some(url) = &entry.download_url {
                download_file_to(&self.http, url, &dest_dir.join(&entry.name)).await?;
            }
            saw_manifest |= is_manifest;
        }
        if !saw_manifest {
            return Err(RegistryError::PackageNotFound(format!(
                "{}: no manifest.json at {path}",
                descriptor.id
            )));
        }

        for dir_name in MIRRORED_SUBDIRECTORIES {
            if entries
                .iter()
                .any(|e| e.entry_type == "dir" && e.name == *dir_name)
            {
                let remote_path = format!("{path}/{dir_name}");
                download_directory_recursive(
                    &self.http,
                    &self.contents_api_base(),
                    &remote_path,
                    &dest_dir.join(dir_name),
                )
                .await?;
            }
        }
        Ok(())
    }

    fn contents_api_base(&self) -> String {
        std::env::var("FORGE_REGISTRY_CONTENTS_BASE")
            .unwrap_or_else(|_| "https://registry.forge.dev/contents".to_string())
    }

    /// Resolve a single package by fully-qualified id or bare name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::PackageNotFound`] if no descriptor matches.
    pub fn get_package<'a>(
        &self,
        index: &'a RegistryIndex,
        id_or_name: &str,
    ) -> RegistryResult<&'a PackageDescriptor> {
        if let Ok((kind, name)) = forge_core::parse_package_id(id_or_name) {
            if let Some(found) = index
                .iter_kind(kind)
                .find(|d| d.id == forge_core::create_package_id(kind, &name))
            {
                return Ok(found);
            }
        }

        index
            .iter_all()
            .map(|(_, d)| d)
            .find(|d| d.name == id_or_name || forge_core::strip_kind_prefix(&d.id) == id_or_name)
            .ok_or_else(|| RegistryError::PackageNotFound(id_or_name.to_string()))
    }
}

#[allow(dead_code)]
fn freshness_cutoff() -> DateTime<Utc> {
    Utc::now() - chrono::Duration::from_std(CACHE_FRESHNESS).expect("fits in chrono::Duration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    fn sample_index_json() -> &'static str {
        r#"{
            "stacks": {
                "official": [
                    {
                        "id": "stack:scribe",
                        "name": "scribe",
                        "version": "1.0.0",
                        "description": "a writing assistant",
                        "tags": ["writing", "docs"]
                    }
                ],
                "community": []
            }
        }"#
    }

    #[tokio::test]
    async fn fetch_index_reads_local_override() {
        let _guard = ENV_GUARD.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("index.json");
        let mut f = std::fs::File::create(&index_path).unwrap();
        f.write_all(sample_index_json().as_bytes()).unwrap();

        unsafe {
            std::env::set_var(ENV_REGISTRY_INDEX_PATH, index_path.to_str().unwrap());
        }
        let paths = ForgePaths::from_root(dir.path().join("home"));
        let client = RegistryClient::new(paths);
        let index = client.fetch_index(false).await.unwrap();
        unsafe {
            std::env::remove_var(ENV_REGISTRY_INDEX_PATH);
        }

        assert_eq!(index.iter_kind(Kind::Stack).count(), 1);
    }

    #[tokio::test]
    async fn search_matches_tags_case_insensitively() {
        let _guard = ENV_GUARD.lock().unwrap();
        let index: RegistryIndex = serde_json::from_str(sample_index_json()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let client = RegistryClient::new(ForgePaths::from_root(dir.path()));

        let results = client.search(&index, "WRITING", None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "stack:scribe");

        let none = client.search(&index, "nonexistent", Some(Kind::Runtime));
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn get_package_resolves_bare_name_and_qualified_id() {
        let _guard = ENV_GUARD.lock().unwrap();
        let index: RegistryIndex = serde_json::from_str(sample_index_json()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let client = RegistryClient::new(ForgePaths::from_root(dir.path()));

        assert!(client.get_package(&index, "scribe").is_ok());
        assert!(client.get_package(&index, "stack:scribe").is_ok());
        assert!(client.get_package(&index, "stack:missing").is_err());
    }
}
