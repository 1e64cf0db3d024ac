//! # Design
//!
//! - Centralize run-level errors for bootstrap and orchestration.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Every variant here ends the run; item-level skips never become errors.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Profile or environment configuration failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: dossiermig_config::ConfigError,
    },
    /// Destination client could not be built.
    #[error("destination client setup failed")]
    Client {
        /// Operation identifier.
        operation: &'static str,
        /// Source client error.
        source: dossiermig_client::ClientError,
    },
    /// Telemetry setup failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: anyhow::Error,
    },
    /// Run state logs or traversal failed.
    #[error("runtime state operation failed")]
    Runtime {
        /// Operation identifier.
        operation: &'static str,
        /// Source runtime error.
        source: dossiermig_runtime::RuntimeError,
    },
    /// Pipeline construction or a mutator failed.
    #[error("pipeline operation failed")]
    Pipeline {
        /// Operation identifier.
        operation: &'static str,
        /// Source pipeline error.
        source: dossiermig_pipeline::PipelineError,
    },
    /// Destination index could not be loaded.
    #[error("destination index operation failed")]
    Index {
        /// Operation identifier.
        operation: &'static str,
        /// Source index error.
        source: dossiermig_core::CoreError,
    },
    /// A direct destination call failed.
    #[error("destination operation failed")]
    Destination {
        /// Operation identifier.
        operation: &'static str,
        /// Source destination error.
        source: dossiermig_core::DestinationError,
    },
    /// Delivery engine failed.
    #[error("delivery operation failed")]
    Delivery {
        /// Operation identifier.
        operation: &'static str,
        /// Source delivery error.
        source: dossiermig_delivery::DeliveryError,
    },
    /// An item reached customer resolution without a destination directory.
    #[error("destination directory not set")]
    MissingDestination {
        /// Relative path of the file.
        file: String,
    },
    /// The destination directory of an item does not exist remotely.
    #[error("destination directory unknown")]
    UnknownDirectory {
        /// Relative path of the file.
        file: String,
        /// Resolved customer identifier.
        customer_id: String,
        /// Directory path that was looked up.
        path: String,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: dossiermig_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn runtime(
        operation: &'static str,
        source: dossiermig_runtime::RuntimeError,
    ) -> Self {
        Self::Runtime { operation, source }
    }

    pub(crate) const fn pipeline(
        operation: &'static str,
        source: dossiermig_pipeline::PipelineError,
    ) -> Self {
        Self::Pipeline { operation, source }
    }

    pub(crate) const fn index(operation: &'static str, source: dossiermig_core::CoreError) -> Self {
        Self::Index { operation, source }
    }

    pub(crate) const fn delivery(
        operation: &'static str,
        source: dossiermig_delivery::DeliveryError,
    ) -> Self {
        Self::Delivery { operation, source }
    }

    /// Whether the run stopped because the destination refused the credentials.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        match self {
            Self::Index { source, .. } => source.is_unauthorized(),
            Self::Destination { source, .. } => source.is_unauthorized(),
            Self::Delivery { source, .. } => {
                matches!(source, dossiermig_delivery::DeliveryError::Unauthorized { .. })
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossiermig_core::DestinationError;
    use std::error::Error;

    #[test]
    fn unauthorized_is_detected_across_sources() {
        let direct = AppError::Destination {
            operation: "dedup.item_exists",
            source: DestinationError::Unauthorized {
                operation: "items.search",
                status: 401,
            },
        };
        assert!(direct.is_unauthorized());

        let delivery = AppError::delivery(
            "delivery.finalize",
            dossiermig_delivery::DeliveryError::Unauthorized {
                request_id: uuid::Uuid::nil(),
                name: "a.pdf".to_string(),
                source: DestinationError::Unauthorized {
                    operation: "items.create",
                    status: 403,
                },
            },
        );
        assert!(delivery.is_unauthorized());

        let missing = AppError::MissingDestination {
            file: "a.pdf".to_string(),
        };
        assert!(!missing.is_unauthorized());
    }

    #[test]
    fn messages_are_constant_and_sources_preserved() {
        let err = AppError::config(
            "profile.load",
            dossiermig_config::ConfigError::MissingEnv {
                variable: "DOSSIERMIG_TENANT",
            },
        );
        assert_eq!(err.to_string(), "configuration operation failed");
        assert!(err.source().is_some());
    }
}
