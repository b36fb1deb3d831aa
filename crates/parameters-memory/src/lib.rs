//! In-memory (single process) implementation of the parameter store for local
//! development and tests.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use farm_parameters::{ParameterStore, ParameterStore1};
use tokio::sync::Mutex;

/// In-memory parameter store.
///
/// Clones and scopes all share the same backing map.
#[derive(Clone, Debug, Default)]
pub struct MemoryParameterStore {
    map: Arc<Mutex<HashMap<String, String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    latency: Option<Duration>,
    prefix: Option<String>,
}

impl MemoryParameterStore {
    /// Creates a new `MemoryParameterStore`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle that sleeps for `latency` before every operation.
    ///
    /// Used by tests to widen the window between a read and the following write.
    #[must_use]
    pub fn with_latency(&self, latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..self.clone()
        }
    }

    /// Makes every subsequent operation on `name` (unscoped, full key) fail.
    pub async fn fail_on(&self, name: impl Into<String>) {
        self.failing.lock().await.insert(name.into());
    }

    /// Returns every stored key, including scope prefixes.
    pub async fn keys(&self) -> Vec<String> {
        self.map.lock().await.keys().cloned().collect()
    }

    fn get_key(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{name}"),
            None => name.to_string(),
        }
    }

    async fn enter(&self, key: &str) -> Result<(), Error> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.lock().await.contains(key) {
            return Err(Error::Injected(key.to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl ParameterStore for MemoryParameterStore {
    type Error = Error;

    async fn get(&self, name: &str) -> Result<Option<String>, Self::Error> {
        let key = self.get_key(name);
        self.enter(&key).await?;

        Ok(self.map.lock().await.get(&key).cloned())
    }

    async fn create(&self, name: &str, value: String) -> Result<bool, Self::Error> {
        let key = self.get_key(name);
        self.enter(&key).await?;

        let mut map = self.map.lock().await;
        if map.contains_key(&key) {
            return Ok(false);
        }
        map.insert(key, value);

        Ok(true)
    }

    async fn put(&self, name: &str, value: String) -> Result<(), Self::Error> {
        let key = self.get_key(name);
        self.enter(&key).await?;

        self.map.lock().await.insert(key, value);

        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, Self::Error> {
        let key = self.get_key(name);
        self.enter(&key).await?;

        Ok(self.map.lock().await.remove(&key).is_some())
    }
}

#[async_trait]
impl ParameterStore1 for MemoryParameterStore {
    type Error = Error;
    type Scoped = Self;

    fn scope<S>(&self, scope: S) -> Self::Scoped
    where
        S: AsRef<str> + Send,
    {
        let prefix = match &self.prefix {
            Some(existing) => format!("{existing}/{}", scope.as_ref()),
            None => scope.as_ref().to_string(),
        };

        Self {
            prefix: Some(prefix),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_create_is_exclusive() {
        let store = MemoryParameterStore::new();

        assert!(store.create("conch", "a".to_string()).await.unwrap());
        assert!(!store.create("conch", "b".to_string()).await.unwrap());

        assert_eq!(store.get("conch").await.unwrap(), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_put_overwrites_and_delete_reports_presence() {
        let store = MemoryParameterStore::new();

        store.put("members", "[]".to_string()).await.unwrap();
        store.put("members", "[1]".to_string()).await.unwrap();
        assert_eq!(store.get("members").await.unwrap(), Some("[1]".to_string()));

        assert!(store.delete("members").await.unwrap());
        assert!(!store.delete("members").await.unwrap());
        assert_eq!(store.get("members").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scopes_share_backing_map() {
        let root = MemoryParameterStore::new();
        let scoped = root.scope("farm-a");
        let other = root.scope("farm-b");

        scoped.put("members", "[]".to_string()).await.unwrap();

        assert_eq!(root.get("farm-a/members").await.unwrap(), Some("[]".to_string()));
        assert_eq!(other.get("members").await.unwrap(), None);
        assert_eq!(root.keys().await, vec!["farm-a/members".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let root = MemoryParameterStore::new();
        let scoped = root.scope("farm");
        root.fail_on("farm/conch").await;

        assert_matches!(scoped.get("conch").await, Err(Error::Injected(key)) if key == "farm/conch");
        assert!(scoped.get("members").await.is_ok());
    }
}
