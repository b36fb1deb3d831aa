//! Advisory, time-bounded exclusive lease ("the conch") over a shared
//! parameter store.
//!
//! Acquisition uses create-if-absent. A record whose expiry has passed belongs
//! to a crashed or stalled holder and is reclaimed by the next contender.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use farm_parameters::ParameterStore;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Options controlling lease lifetime and contention behaviour.
#[derive(Clone, Debug)]
pub struct ConchOptions {
    /// How long a held lease stays valid without being released.
    pub ttl: Duration,

    /// Pause after reclaiming an expired lease before trying again.
    pub reclaim_pause: Duration,

    /// Lower bound of the randomized wait while another holder is live.
    pub min_wait: Duration,

    /// Upper bound of the randomized wait while another holder is live.
    pub max_wait: Duration,

    /// Total time `acquire` may spend before giving up.
    pub acquire_timeout: Duration,
}

impl Default for ConchOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            reclaim_pause: Duration::from_millis(100),
            min_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(2),
            acquire_timeout: Duration::from_secs(300),
        }
    }
}

/// Proof of holding the conch. Only the matching token can release it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConchToken(String);

impl ConchToken {
    fn generate() -> Self {
        Self(hex::encode(rand::random::<[u8; 16]>()))
    }

    /// The raw token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ConchToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// The single lease record stored under the conch name.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LeaseRecord {
    /// Token of the current holder.
    pub token: String,

    /// Wall-clock instant after which the lease may be reclaimed.
    pub expires_at: DateTime<Utc>,
}

impl LeaseRecord {
    /// Whether the lease has lapsed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Current state of the lease as seen by an observer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConchStatus {
    /// No lease record exists.
    Free,

    /// A live lease is held until `expires_at`.
    Held {
        /// When the holder's lease lapses.
        expires_at: DateTime<Utc>,
    },

    /// A lease record exists but has lapsed and may be reclaimed.
    Expired {
        /// When the holder's lease lapsed.
        expires_at: DateTime<Utc>,
    },
}

/// Lease manager for one named lease.
#[derive(Clone, Debug)]
pub struct Conch<P>
where
    P: ParameterStore,
{
    store: P,
    name: String,
    options: ConchOptions,
}

impl<P> Conch<P>
where
    P: ParameterStore,
{
    /// Creates a lease manager for the record `name` in `store`.
    pub fn new(store: P, name: impl Into<String>, options: ConchOptions) -> Self {
        Self {
            store,
            name: name.into(),
            options,
        }
    }

    /// Waits until the lease is held by this caller and returns its token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AcquireTimeout`] once `acquire_timeout` has elapsed, or
    /// any error from the underlying store.
    #[instrument(skip(self), fields(lease = %self.name))]
    pub async fn acquire(&self) -> Result<ConchToken, Error> {
        let token = ConchToken::generate();
        let ttl = TimeDelta::from_std(self.options.ttl)
            .map_err(|_| Error::InvalidTtl(self.options.ttl))?;
        let started = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;

            let record = LeaseRecord {
                token: token.0.clone(),
                expires_at: Utc::now() + ttl,
            };

            if self
                .store
                .create(&self.name, serde_json::to_string(&record)?)
                .await
                .map_err(Error::store)?
            {
                debug!(%token, attempts, "lease acquired");
                return Ok(token);
            }

            match self.store.get(&self.name).await.map_err(Error::store)? {
                None => {
                    debug!("lease released between create and read, retrying");
                    tokio::time::sleep(self.options.reclaim_pause).await;
                }
                Some(raw) => match serde_json::from_str::<LeaseRecord>(&raw) {
                    Ok(existing) if existing.is_expired(Utc::now()) => {
                        info!(holder = %existing.token, expires_at = %existing.expires_at, "lease expired, reclaiming");
                        self.reclaim(&raw).await?;
                        tokio::time::sleep(self.options.reclaim_pause).await;
                    }
                    Ok(existing) => {
                        let wait = self.jitter();
                        debug!(holder = %existing.token, ?wait, "lease held by another, waiting");
                        tokio::time::sleep(wait).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "unreadable lease record, reclaiming");
                        self.reclaim(&raw).await?;
                        tokio::time::sleep(self.options.reclaim_pause).await;
                    }
                },
            }

            let waited = started.elapsed();
            if waited >= self.options.acquire_timeout {
                warn!(attempts, ?waited, "giving up on lease");
                return Err(Error::AcquireTimeout {
                    name: self.name.clone(),
                    attempts,
                    waited,
                });
            }
        }
    }

    /// Releases the lease if `token` still holds it.
    ///
    /// A lease that was already reclaimed (missing, or now held by someone
    /// else) is left alone.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying store.
    #[instrument(skip(self), fields(lease = %self.name))]
    pub async fn release(&self, token: &ConchToken) -> Result<(), Error> {
        let Some(raw) = self.store.get(&self.name).await.map_err(Error::store)? else {
            warn!(%token, "lease expired before release; consider a longer ttl");
            return Ok(());
        };

        match serde_json::from_str::<LeaseRecord>(&raw) {
            Ok(existing) if existing.token == token.0 => {
                self.store.delete(&self.name).await.map_err(Error::store)?;
                debug!(%token, "lease released");
            }
            Ok(existing) => {
                warn!(%token, holder = %existing.token, "lease reclaimed by another holder before release");
            }
            Err(e) => {
                warn!(%token, error = %e, "unreadable lease record at release, leaving it to expire");
            }
        }

        Ok(())
    }

    /// Reports the current lease state without contending for it.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying store or an undecodable record.
    pub async fn check(&self) -> Result<ConchStatus, Error> {
        let Some(raw) = self.store.get(&self.name).await.map_err(Error::store)? else {
            return Ok(ConchStatus::Free);
        };

        let record: LeaseRecord = serde_json::from_str(&raw)?;
        if record.is_expired(Utc::now()) {
            Ok(ConchStatus::Expired {
                expires_at: record.expires_at,
            })
        } else {
            Ok(ConchStatus::Held {
                expires_at: record.expires_at,
            })
        }
    }

    /// Deletes the record only if it still holds the value we judged stale.
    async fn reclaim(&self, stale: &str) -> Result<(), Error> {
        match self.store.get(&self.name).await.map_err(Error::store)? {
            Some(current) if current == stale => {
                self.store.delete(&self.name).await.map_err(Error::store)?;
            }
            _ => debug!("lease changed hands before reclaim, skipping delete"),
        }

        Ok(())
    }

    fn jitter(&self) -> Duration {
        let span = self.options.max_wait.saturating_sub(self.options.min_wait);
        self.options.min_wait + span.mul_f64(fastrand::f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use farm_parameters_memory::MemoryParameterStore;
    use tracing_test::traced_test;

    fn fast_options() -> ConchOptions {
        ConchOptions {
            ttl: Duration::from_secs(60),
            reclaim_pause: Duration::from_millis(1),
            min_wait: Duration::from_millis(1),
            max_wait: Duration::from_millis(3),
            acquire_timeout: Duration::from_secs(10),
        }
    }

    fn record(token: &str, expires_at: DateTime<Utc>) -> String {
        serde_json::to_string(&LeaseRecord {
            token: token.to_string(),
            expires_at,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let store = MemoryParameterStore::new();
        let conch = Conch::new(store.clone(), "conch", fast_options());

        let token = conch.acquire().await.unwrap();
        let raw = store.get("conch").await.unwrap().unwrap();
        let held: LeaseRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(held.token, token.as_str());
        assert_eq!(token.as_str().len(), 32);
        assert_matches!(conch.check().await.unwrap(), ConchStatus::Held { .. });

        conch.release(&token).await.unwrap();
        assert_eq!(store.get("conch").await.unwrap(), None);
        assert_eq!(conch.check().await.unwrap(), ConchStatus::Free);
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let conch = Conch::new(MemoryParameterStore::new(), "conch", fast_options());

        let first = conch.acquire().await.unwrap();
        conch.release(&first).await.unwrap();
        let second = conch.acquire().await.unwrap();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_critical_sections_never_overlap() {
        let store = MemoryParameterStore::new().with_latency(Duration::from_millis(1));
        let conch = Conch::new(store, "conch", fast_options());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let conch = conch.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let token = conch.acquire().await.unwrap();
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
                conch.release(&token).await.unwrap();
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_lease_is_reclaimed() {
        let store = MemoryParameterStore::new();
        let stale = record("crashed", Utc::now() - TimeDelta::seconds(5));
        store.put("conch", stale).await.unwrap();

        let conch = Conch::new(store.clone(), "conch", fast_options());
        assert_matches!(conch.check().await.unwrap(), ConchStatus::Expired { .. });

        let token = conch.acquire().await.unwrap();
        let held: LeaseRecord =
            serde_json::from_str(&store.get("conch").await.unwrap().unwrap()).unwrap();
        assert_eq!(held.token, token.as_str());
        assert_ne!(held.token, "crashed");
    }

    #[tokio::test]
    async fn test_unreadable_record_is_reclaimed() {
        let store = MemoryParameterStore::new();
        store.put("conch", "garbage".to_string()).await.unwrap();

        let conch = Conch::new(store, "conch", fast_options());
        assert!(conch.acquire().await.is_ok());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_release_after_reclaim_is_noop() {
        let store = MemoryParameterStore::new();
        let conch = Conch::new(store.clone(), "conch", fast_options());

        let token = conch.acquire().await.unwrap();
        let usurper = record("usurper", Utc::now() + TimeDelta::seconds(60));
        store.put("conch", usurper.clone()).await.unwrap();

        conch.release(&token).await.unwrap();
        assert_eq!(store.get("conch").await.unwrap(), Some(usurper));
        assert!(logs_contain("lease reclaimed by another holder before release"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_release_of_missing_lease_is_noop() {
        let store = MemoryParameterStore::new();
        let conch = Conch::new(store.clone(), "conch", fast_options());

        let token = conch.acquire().await.unwrap();
        store.delete("conch").await.unwrap();

        assert!(conch.release(&token).await.is_ok());
        assert!(logs_contain("lease expired before release"));
    }

    #[tokio::test]
    async fn test_acquire_gives_up_after_timeout() {
        let store = MemoryParameterStore::new();
        store
            .put("conch", record("holder", Utc::now() + TimeDelta::seconds(60)))
            .await
            .unwrap();

        let conch = Conch::new(
            store,
            "conch",
            ConchOptions {
                acquire_timeout: Duration::from_millis(20),
                ..fast_options()
            },
        );

        assert_matches!(
            conch.acquire().await,
            Err(Error::AcquireTimeout { attempts, .. }) if attempts >= 1
        );
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let store = MemoryParameterStore::new();
        store.fail_on("conch").await;

        let conch = Conch::new(store, "conch", fast_options());
        assert_matches!(conch.acquire().await, Err(Error::Store(_)));
    }
}
