//! Paths, platform tags, and package identifiers shared across every Forge
//! crate.
//!
//! This crate has no async runtime dependency and no I/O beyond directory
//! creation; it exists so that every other crate can agree on where things
//! live and how packages are named without depending on each other.

mod error;
mod package_id;
mod paths;

pub use error::{CoreError, CoreResult};
pub use package_id::{create_package_id, parse_package_id, strip_kind_prefix, Kind};
pub use paths::{platform_arch, ForgePaths};
