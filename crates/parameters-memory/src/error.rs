use farm_parameters::ParameterStoreError;
use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// A failure injected by a test.
    #[error("injected failure on {0}")]
    Injected(String),
}

impl ParameterStoreError for Error {}
