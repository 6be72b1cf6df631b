//! Downstream delivery boundary.
//!
//! Recovered crash records leave the pipeline through [`CrashDelivery`].
//! Transport, batching, and retry policy all live behind it. The pipeline
//! deletes the on-disk evidence whether or not delivery succeeds, so a
//! record is handed over at most once.

use async_trait::async_trait;
use thiserror::Error;

use crate::report::NativeCrashRecord;

/// Error returned by a delivery collaborator.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The record was rejected by the downstream collaborator.
    #[error("crash record rejected: {message}")]
    Rejected {
        /// Description of the rejection.
        message: String,
    },

    /// The downstream collaborator was unreachable.
    #[error("delivery endpoint unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

impl DeliveryError {
    /// Create a rejection error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Accepts recovered crash records for downstream processing.
#[async_trait]
pub trait CrashDelivery: Send + Sync {
    /// Hand over a recovered crash record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be accepted. The caller
    /// logs the failure and moves on; it does not retry.
    async fn send(&self, record: &NativeCrashRecord) -> Result<(), DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_display() {
        let err = DeliveryError::rejected("payload too large");
        assert!(err.to_string().contains("payload too large"));

        let err = DeliveryError::unavailable("connection refused");
        assert!(err.to_string().contains("connection refused"));
    }
}
