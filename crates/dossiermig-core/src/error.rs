//! Error types shared by sources, destinations, and the destination index.

use std::error::Error;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for source provider operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for destination API operations.
pub type DestinationResult<T> = Result<T, DestinationError>;

/// Result type for destination index operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Failures raised by a source provider while listing or reading files.
#[derive(Debug, Error)]
pub enum SourceError {
    /// IO failures while reading from the source store.
    #[error("source io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The traversal root cannot be used.
    #[error("source root invalid")]
    InvalidRoot {
        /// Offending root.
        path: PathBuf,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// Adapter specific failure while listing or fetching.
    #[error("source operation failed")]
    Backend {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl SourceError {
    /// Wrap an IO error with operation and path context.
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Wrap an adapter specific error.
    pub fn backend(
        operation: &'static str,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }
}

/// Failures raised by the destination system.
#[derive(Debug, Error)]
pub enum DestinationError {
    /// The destination rejected the credentials (HTTP 401/403).
    #[error("destination rejected credentials")]
    Unauthorized {
        /// Operation identifier.
        operation: &'static str,
        /// Status code returned by the destination.
        status: u16,
    },
    /// The destination answered with an unexpected status.
    #[error("destination returned unexpected status")]
    Status {
        /// Operation identifier.
        operation: &'static str,
        /// Status code returned by the destination.
        status: u16,
        /// Response body when available.
        body: Option<String>,
    },
    /// Transport failures before a response was received.
    #[error("destination request failed")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Response payload could not be interpreted.
    #[error("destination payload invalid")]
    Payload {
        /// Operation identifier.
        operation: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

impl DestinationError {
    /// Returns true when the failure must stop the run instead of being retried.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Wrap a transport error.
    pub fn transport(
        operation: &'static str,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::Transport {
            operation,
            source: source.into(),
        }
    }
}

/// Failures raised while building or querying the destination index.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Two customers normalize to the same number.
    #[error("duplicate customer number")]
    DuplicateCustomerNumber {
        /// Normalized customer number.
        number: String,
        /// Identifier of the customer already indexed.
        existing_id: String,
        /// Identifier of the conflicting customer.
        conflicting_id: String,
    },
    /// A destination call made on behalf of the index failed.
    #[error("destination index load failed")]
    Destination {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying destination error.
        source: DestinationError,
    },
}

impl CoreError {
    pub(crate) const fn destination(operation: &'static str, source: DestinationError) -> Self {
        Self::Destination { operation, source }
    }

    /// Returns true when the underlying destination refused the credentials.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Destination { source, .. } if source.is_unauthorized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_detected_through_index_errors() {
        let err = CoreError::destination(
            "index.load_customers",
            DestinationError::Unauthorized {
                operation: "customers.list",
                status: 403,
            },
        );
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "destination index load failed");
    }

    #[test]
    fn status_errors_are_not_unauthorized() {
        let err = DestinationError::Status {
            operation: "items.create",
            status: 500,
            body: None,
        };
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn source_helpers_keep_context() {
        let err = SourceError::io(
            "source.read",
            "/srv/share/a.pdf",
            io::Error::new(io::ErrorKind::NotFound, "missing"),
        );
        match err {
            SourceError::Io {
                operation, path, ..
            } => {
                assert_eq!(operation, "source.read");
                assert_eq!(path, PathBuf::from("/srv/share/a.pdf"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
