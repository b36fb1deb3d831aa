//! Error types for the mock collaborators.

use thiserror::Error;

/// Error type for the mock collaborators.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// A failure switched on by the test.
    #[error("mock {0} failure")]
    Injected(&'static str),
}
