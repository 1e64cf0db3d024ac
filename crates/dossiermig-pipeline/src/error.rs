//! # Design
//!
//! - Errors here are configuration or data faults that stop the run.
//! - Routine item skips never surface as errors; see `Step::Abandon`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for pipeline construction and execution.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Fatal pipeline failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A configured regular expression failed to compile.
    #[error("pipeline pattern invalid")]
    InvalidPattern {
        /// Configuration field holding the pattern.
        field: &'static str,
        /// Offending pattern.
        pattern: String,
        /// Underlying regex error.
        source: regex::Error,
    },
    /// A customer pattern lacks one of the required named groups.
    #[error("pipeline pattern missing named group")]
    MissingGroup {
        /// Offending pattern.
        pattern: String,
        /// Missing group name.
        group: &'static str,
    },
    /// A mutator needed the relative source directory before it was set.
    #[error("pipeline relative source dir missing")]
    MissingRelativeSourceDir {
        /// Mutator that required the value.
        mutator: &'static str,
        /// File being processed.
        file: String,
    },
    /// A mapping table row could not be parsed.
    #[error("pipeline mapping table malformed")]
    MalformedTable {
        /// Table file when loaded from disk.
        path: Option<PathBuf>,
        /// One-based line number.
        line: usize,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// IO failures on mapping files.
    #[error("pipeline io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The source failed to start a traversal for template generation.
    #[error("pipeline source traversal failed")]
    Source {
        /// Underlying source error.
        source: dossiermig_core::SourceError,
    },
}

impl PipelineError {
    pub(crate) fn invalid_pattern(
        field: &'static str,
        pattern: &str,
        source: regex::Error,
    ) -> Self {
        Self::InvalidPattern {
            field,
            pattern: pattern.to_string(),
            source,
        }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}
