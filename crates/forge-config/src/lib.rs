//! The central config document: atomic reads/writes under an advisory
//! lock, launch-config derivation, and pluggable secret storage
//! (spec.md §4.F).

mod error;
mod launch;
mod lockguard;
mod secrets;
mod store;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use launch::create_launch_config;
pub use lockguard::{acquire as acquire_lock, LockGuard};
pub use secrets::{FileSecretStore, MemorySecretStore, SecretStore};
pub use store::{
    add_binary, add_runtime, add_stack, init_config, remove_stack, update_config,
    update_secret_status, update_stack_tools,
};
pub use types::{
    BinaryConfig, CachedTool, ForgeConfig, LaunchConfig, NewStackInfo, RuntimeConfig,
    SecretConfig, SecretProvider, StackConfig, StackSecretRef, SCHEMA_VERSION,
};
