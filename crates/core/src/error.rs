//! Error types for Polystore
//!
//! This module defines the single error type used across the workspace.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! | Variant | Raised when | Reaches the backend? |
//! |---------|-------------|----------------------|
//! | `Schema` | Bad operator/order spelling, duplicate storage name, uncoercible value | Never |
//! | `Binding` | No datastore bound to the session or pack context | Never |
//! | `Adapter` | The backend client reported a failure | Yes, propagated verbatim |
//! | `Serialization` | Structured value text could not be encoded/decoded | - |
//! | `Config` | Configuration file unreadable, unparsable, or names an unknown backend | Never |

use thiserror::Error;

/// Boxed error surfaced by a backend client
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for Polystore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Polystore
#[derive(Debug, Error)]
pub enum Error {
    /// Local validation failure: unknown operator or order spelling,
    /// invalid schema definition, or a value that cannot be coerced
    #[error("Schema error: {0}")]
    Schema(String),

    /// No datastore is bound where one is required
    #[error("Binding error: {0}")]
    Binding(String),

    /// Failure reported by the underlying backend client
    #[error("Adapter error ({backend}): {source}")]
    Adapter {
        /// Name of the backend that failed
        backend: &'static str,
        /// The client error, unmodified
        #[source]
        source: BoxError,
    },

    /// Structured value encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration failure
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Schema error from any displayable reason
    pub fn schema(reason: impl Into<String>) -> Self {
        Error::Schema(reason.into())
    }

    /// Binding error from any displayable reason
    pub fn binding(reason: impl Into<String>) -> Self {
        Error::Binding(reason.into())
    }

    /// Wrap a backend client error
    pub fn adapter<E>(backend: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Adapter {
            backend,
            source: Box::new(source),
        }
    }

    /// Configuration error from any displayable reason
    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config(reason.into())
    }

    /// True for errors raised by local validation before any backend call
    pub fn is_local(&self) -> bool {
        matches!(self, Error::Schema(_) | Error::Binding(_) | Error::Config(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
