use thiserror::Error;

/// Errors raised while resolving a package's dependency tree.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The requested id, or one of its dependency references, does not
    /// parse as a valid package id.
    #[error(transparent)]
    InvalidId(#[from] forge_core::CoreError),
    /// A dependency descriptor could not be found in the registry index.
    #[error("dependency unsatisfied: {missing:?}")]
    DependencyUnsatisfied {
        /// The dependency ids that could not be resolved.
        missing: Vec<String>,
    },
    /// Underlying registry client failure while fetching a descriptor.
    #[error(transparent)]
    Registry(#[from] forge_registry::RegistryError),
}

/// Specialized result type for resolver operations.
pub type ResolverResult<T> = Result<T, ResolverError>;
