//! Error types for profile loading and validation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Profile file could not be read.
    #[error("profile io failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path of the profile.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// Profile file is not a valid profile document.
    #[error("profile parse failure")]
    Parse {
        /// Path of the profile when loaded from disk.
        path: Option<PathBuf>,
        /// Source JSON error.
        source: serde_json::Error,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: &'static str,
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Required environment variable is missing or blank.
    #[error("environment variable missing")]
    MissingEnv {
        /// Name of the variable.
        variable: &'static str,
    },
}

impl ConfigError {
    pub(crate) const fn invalid(
        section: &'static str,
        field: &'static str,
        reason: &'static str,
        value: Option<String>,
    ) -> Self {
        Self::InvalidField {
            section,
            field,
            reason,
            value,
        }
    }
}
