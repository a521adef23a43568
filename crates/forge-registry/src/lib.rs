//! Registry index fetch/cache, search, and artifact download.
//!
//! This crate owns everything needed to go from a package id to bytes on
//! disk: the index document shape, the HTTP client that fetches and caches
//! it, and the download/extract/verify primitives `forge-installer` drives
//! per install strategy.

mod client;
mod download;
mod error;
mod index;

pub use client::{RegistryClient, CACHE_FRESHNESS, ENV_REGISTRY_INDEX_PATH, ENV_REGISTRY_URL};
pub use download::{
    compute_hash, download_directory_recursive, download_file_to, download_to, extract_archive,
    list_directory, make_executable, relocate_executable, resolve_glob_binary, verify_hash,
    ArchiveKind, ContentEntry, MIRRORED_SUBDIRECTORIES, OPTIONAL_TOP_LEVEL_FILES,
};
pub use error::{RegistryError, RegistryResult};
pub use index::{DownloadEntry, KindCatalog, PackageDescriptor, RegistryIndex, Requires, SecretRequirement};
