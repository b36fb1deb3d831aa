//! Abstract interface for a shared, strongly consistent parameter namespace.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;

/// Marker trait for `ParameterStore` errors
pub trait ParameterStoreError: Debug + Error + Send + Sync + 'static {}

/// A named-value store shared by every coordinator invocation.
///
/// Reads must be strongly consistent. `create` is the only conditional write and
/// is what the lease is built on; everything else is a plain overwrite.
#[async_trait]
pub trait ParameterStore: Clone + Send + Sync + 'static {
    /// The error type for store operations.
    type Error: ParameterStoreError;

    /// Reads a parameter. A missing parameter is `Ok(None)`.
    async fn get(&self, name: &str) -> Result<Option<String>, Self::Error>;

    /// Writes a parameter only if it does not exist yet.
    ///
    /// Returns `Ok(false)` when another writer already holds the name.
    async fn create(&self, name: &str, value: String) -> Result<bool, Self::Error>;

    /// Writes a parameter, replacing any existing value.
    async fn put(&self, name: &str, value: String) -> Result<(), Self::Error>;

    /// Deletes a parameter. Returns `Ok(false)` if it was already gone.
    async fn delete(&self, name: &str) -> Result<bool, Self::Error>;
}

/// A parameter store that must be scoped (e.g. by deployment name) before use.
#[async_trait]
pub trait ParameterStore1: Clone + Send + Sync + 'static {
    /// The error type for store operations.
    type Error: ParameterStoreError;

    /// The scoped store type.
    type Scoped: ParameterStore<Error = Self::Error>;

    /// Creates a scoped store.
    fn scope<S>(&self, scope: S) -> Self::Scoped
    where
        S: AsRef<str> + Send;
}
