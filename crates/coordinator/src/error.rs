use thiserror::Error;

/// Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that end a coordinator invocation.
#[derive(Debug, Error)]
pub enum Error {
    /// An external collaborator failed.
    #[error("{service} call failed: {source}")]
    External {
        /// Which collaborator failed.
        service: &'static str,
        /// The collaborator's error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Notification payload was not JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Membership error.
    #[error(transparent)]
    Membership(#[from] farm_membership::Error),

    /// A required setting is missing.
    #[error("required setting {0} is missing")]
    MissingConfig(&'static str),
}

impl Error {
    pub(crate) fn external<E>(service: &'static str) -> impl FnOnce(E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        move |error| Self::External {
            service,
            source: Box::new(error),
        }
    }
}
