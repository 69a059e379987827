use thiserror::Error;

/// Errors that can occur during cache operations.
///
/// These never reach callers of the cached repositories: every cache
/// failure degrades to a repository read or a logged, skipped eviction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Cache operation timed out after {0}ms")]
    Timeout(u64),
    #[error("Cache is closed")]
    Closed,
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
