//! Errors raised while constructing the destination client.

use thiserror::Error;

/// Result alias for client construction.
pub type ClientResult<T> = Result<T, ClientError>;

/// Failures raised before any request is sent.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A required setting is missing or blank.
    #[error("client setting missing")]
    MissingSetting {
        /// Name of the missing setting.
        field: &'static str,
    },
    /// A setting cannot be used as given.
    #[error("client setting invalid")]
    InvalidSetting {
        /// Name of the offending setting.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when it is safe to report.
        value: Option<String>,
    },
    /// The underlying HTTP client could not be built.
    #[error("http client construction failed")]
    Build {
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
}

impl ClientError {
    pub(crate) const fn invalid(
        field: &'static str,
        reason: &'static str,
        value: Option<String>,
    ) -> Self {
        Self::InvalidSetting {
            field,
            reason,
            value,
        }
    }
}
