//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

/// Boxed error produced by a fetch fallback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The fallback passed to a fetch failed; nothing was cached
    #[error("Fallback failed for key {key}: {source}")]
    Fallback {
        key: String,
        #[source]
        source: BoxError,
    },
}

impl CacheError {
    // == Classifiers ==
    /// Returns true if this is the "key not found" kind.
    ///
    /// Lets callers branch on a plain miss versus a failed fallback.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }

    /// Returns true if a fetch fallback produced this error.
    pub fn is_fallback(&self) -> bool {
        matches!(self, CacheError::Fallback { .. })
    }

    /// Unwraps the fallback's own error, if this is the fallback kind.
    pub fn into_fallback_source(self) -> Option<BoxError> {
        match self {
            CacheError::Fallback { source, .. } => Some(source),
            CacheError::NotFound(_) => None,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
