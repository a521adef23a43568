//! Dependency graph construction and install ordering.
//!
//! Turns a requested package id into a [`ResolvedNode`] tree one level
//! deep (runtimes/binaries/agents are leaves, never recursively resolved),
//! then reduces that tree to a deduplicated, dependency-first install
//! order.

mod error;
mod node;
mod version;

pub use error::{ResolverError, ResolverResult};
pub use node::{install_order, resolve, ResolvedNode};
pub use version::satisfies_version;
