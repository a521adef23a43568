//! Install/uninstall/update orchestration for every package kind
//! (spec.md §4.B, §4.D, §4.E).

mod command_runner;
mod error;
mod installer;
mod lockfile;
mod strategies;
mod types;

pub use command_runner::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use error::{InstallerError, InstallerResult};
pub use installer::{install, install_from_local, list_installed, uninstall, update, update_all, InstallOptions};
pub use lockfile::{checksum, LockedDependency, Lockfile};
pub use types::{InstallOutcome, InstalledRecord, Phase, ProgressEvent, Source};
