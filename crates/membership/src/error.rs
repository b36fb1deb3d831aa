use crate::model::ComponentType;
use crate::view::DualPrimaryError;

use farm_parameters::ParameterStoreError;
use thiserror::Error;

/// Result type for membership operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or mutating membership.
#[derive(Debug, Error)]
pub enum Error {
    /// A member update tried to change an immutable component type.
    #[error("{instance_id} is a {stored}, cannot become a {requested}")]
    ComponentTypeMismatch {
        /// The member being updated.
        instance_id: String,
        /// Type already recorded.
        stored: ComponentType,
        /// Type in the update.
        requested: ComponentType,
    },

    /// Lease error.
    #[error(transparent)]
    Conch(#[from] farm_conch::Error),

    /// The stored membership record is not valid (including unknown component types).
    #[error("membership record is corrupt and must be corrected: {0}")]
    Decode(#[source] serde_json::Error),

    /// Two brokers are marked primary.
    #[error(transparent)]
    DualPrimary(#[from] DualPrimaryError),

    /// Membership could not be serialized.
    #[error("could not encode membership: {0}")]
    Encode(#[source] serde_json::Error),

    /// A new member was submitted without a component type.
    #[error("new member {0} has no component type")]
    MissingComponentType(String),

    /// A non-broker was marked primary.
    #[error("{instance_id} is a {component_type} and cannot be primary")]
    PrimaryNotBroker {
        /// The offending member.
        instance_id: String,
        /// Its component type.
        component_type: ComponentType,
    },

    /// A primary claim lost against an already recorded primary.
    #[error("cannot make {candidate} primary: {existing} already is")]
    PrimaryConflict {
        /// The primary already recorded.
        existing: String,
        /// The member that claimed primacy.
        candidate: String,
    },

    /// The underlying parameter store failed.
    #[error("parameter store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub(crate) fn store<E: ParameterStoreError>(error: E) -> Self {
        Self::Store(Box::new(error))
    }
}
