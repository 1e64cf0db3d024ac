//! Errors for durable run state.

use std::io;
use std::path::PathBuf;

use dossiermig_core::SourceError;
use thiserror::Error;

/// Result type for runtime state operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Failures while reading or appending run state.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// IO failures on a log file.
    #[error("runtime log io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Log file involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The source could not start a traversal.
    #[error("runtime traversal failed to start")]
    Source {
        /// Root handed to the source.
        root: String,
        /// Underlying source error.
        source: SourceError,
    },
}

impl RuntimeError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}
