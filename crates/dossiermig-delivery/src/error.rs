//! Delivery errors. Ordinary upload failures are not errors; they end up in the report.

use dossiermig_core::DestinationError;
use thiserror::Error;
use uuid::Uuid;

/// Result type for delivery operations.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Failures that stop delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The destination rejected the credentials.
    #[error("delivery unauthorized")]
    Unauthorized {
        /// Request that received the rejection.
        request_id: Uuid,
        /// Filename of the request.
        name: String,
        /// Underlying destination error.
        source: DestinationError,
    },
    /// Engine settings are unusable.
    #[error("delivery config invalid")]
    InvalidConfig {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
    },
}
