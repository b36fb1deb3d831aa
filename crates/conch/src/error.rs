use std::time::Duration;

use farm_parameters::ParameterStoreError;
use thiserror::Error;

/// Errors that can occur while acquiring or releasing the conch.
#[derive(Debug, Error)]
pub enum Error {
    /// Gave up waiting for the lease.
    #[error("could not acquire lease {name} after {attempts} attempts ({waited:?})")]
    AcquireTimeout {
        /// Name of the lease record.
        name: String,
        /// Number of create attempts made.
        attempts: usize,
        /// Total time spent waiting.
        waited: Duration,
    },

    /// The configured TTL cannot be represented as a wall-clock offset.
    #[error("lease ttl out of range: {0:?}")]
    InvalidTtl(Duration),

    /// Lease record could not be serialized.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The underlying parameter store failed.
    #[error("parameter store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub(crate) fn store<E: ParameterStoreError>(error: E) -> Self {
        Self::Store(Box::new(error))
    }
}
