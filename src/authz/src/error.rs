//! Error types for the scope resolution core

use crate::roles::GraphError;
use thiserror::Error;

/// Scope resolution errors
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The role set failed validation and was not compiled
    #[error("Invalid roles: {0}")]
    InvalidRoles(#[from] GraphError),

    /// Fixed-point expansion did not converge within the configured cap.
    ///
    /// A validated role set never reaches this; seeing it means the validator
    /// and the compiler disagree.
    #[error("Scope expansion exceeded {limit} steps")]
    IterationLimitExceeded {
        /// Configured cap that was exceeded
        limit: usize,
    },

    /// Role or client storage could not be read
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The service has not completed its initial load
    #[error("Scope resolver is not ready")]
    NotReady,

    /// Malformed role or client document
    #[error("Invalid document: {0}")]
    InvalidDocument(#[from] serde_json::Error),
}

/// Result type for scope resolution operations
pub type Result<T> = std::result::Result<T, ResolverError>;
