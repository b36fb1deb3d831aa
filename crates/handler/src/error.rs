use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Coordinator error.
    #[error(transparent)]
    Coordinator(#[from] farm_coordinator::Error),

    /// Some records in the notification could not be handled.
    #[error("{failed} of {total} events failed")]
    Failed { failed: usize, total: usize },

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// Notification payload was not JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Could not set global default subscriber.
    #[error("could not set global default subscriber: {0}")]
    SetTracing(#[from] tracing::dispatcher::SetGlobalDefaultError),
}
