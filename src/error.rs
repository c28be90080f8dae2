//! Error types for the tiered cache
//!
//! Provides structured error types for the key builder, tier registry,
//! storage backends, and the administrative surface.

use thiserror::Error;

/// Unified error type for the cache subsystem
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Caller Errors
    // =========================================================================
    /// Malformed namespace or key components. Always a caller bug.
    #[error("Invalid cache key: {reason}")]
    InvalidKey { reason: String },

    /// A tier was referenced that does not exist in the registry.
    #[error("Unknown cache tier: {tier}")]
    UnknownTier { tier: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// The persistent backend cannot be reached or an operation failed.
    ///
    /// Recoverable on the read path (degrade to miss); surfaced on the
    /// write and administrative paths.
    #[error("Persistent store unavailable during {operation}: {reason}")]
    StoreUnavailable { operation: String, reason: String },

    /// A value could not be converted to or from its storage representation.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short machine-readable kind, used in admin API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidKey { .. } => "invalid_key",
            Error::UnknownTier { .. } => "unknown_tier",
            Error::Configuration(_) => "configuration",
            Error::StoreUnavailable { .. } => "store_unavailable",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
        }
    }

    /// Check if this error is a caller/configuration bug rather than a
    /// runtime condition. Caller errors are never retried.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidKey { .. } | Error::UnknownTier { .. } | Error::Configuration(_)
        )
    }

    /// Check if this error may be recovered by degrading to a cache miss.
    ///
    /// Only persistent-store failures on the read path qualify; the caller
    /// must still be informed when a mutation may not have taken effect.
    pub fn is_degradable(&self) -> bool {
        matches!(self, Error::StoreUnavailable { .. })
    }

    pub(crate) fn store_unavailable(operation: &str, reason: impl ToString) -> Self {
        Error::StoreUnavailable {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::StoreUnavailable {
            operation: "sqlite".to_string(),
            reason: e.to_string(),
        }
    }
}

/// Result type alias for the cache subsystem
pub type Result<T> = std::result::Result<T, Error>;
