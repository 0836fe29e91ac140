//! Error types for the dispatch planner.

use thiserror::Error;

/// Errors surfaced to callers of the public operations.
///
/// Provider failures never appear here: they are absorbed by the resolver and
/// the enricher, which degrade to straight-line estimates.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("background task failed: {0}")]
    Task(String),
}

/// Failures reported by a document or cache store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("write conflict: {0}")]
    Conflict(String),
}

/// Failures talking to an external routing provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("routing provider credentials are not configured")]
    MissingCredentials,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {status}: {message}")]
    Status { status: String, message: String },
    #[error("provider returned no route")]
    NoRoute,
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

pub type Result<T, E = DispatchError> = std::result::Result<T, E>;
