use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_JWKS_TTL;
use crate::error::AuthResult;
use crate::jwks::JwksFetcher;
use crate::keys::KeySet;

/// Source of the key set used to verify a token.
///
/// Implementations decide whether a call hits the network; the verifier only
/// asks for "the current keys".
#[async_trait]
pub trait KeySetProvider: Send + Sync {
    async fn key_set(&self) -> AuthResult<Arc<KeySet>>;
}

/// Fixed keys (local development PEMs, tests).
pub struct StaticKeySet {
    keys: Arc<KeySet>,
}

impl StaticKeySet {
    pub fn new(keys: KeySet) -> Self {
        Self {
            keys: Arc::new(keys),
        }
    }
}

#[async_trait]
impl KeySetProvider for StaticKeySet {
    async fn key_set(&self) -> AuthResult<Arc<KeySet>> {
        Ok(self.keys.clone())
    }
}

struct CachedEntry {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

/// Remote JWKS with a time-to-live.
///
/// A request that finds the entry missing or older than `ttl` fetches
/// synchronously. The lock is never held across the fetch, so concurrent
/// requests hitting a stale entry may each fetch; the last one to finish
/// replaces the entry.
pub struct CachedKeySet {
    fetcher: JwksFetcher,
    ttl: Duration,
    pinned: KeySet,
    slot: RwLock<Option<CachedEntry>>,
}

impl CachedKeySet {
    pub fn new(fetcher: JwksFetcher) -> Self {
        Self {
            fetcher,
            ttl: DEFAULT_JWKS_TTL,
            pinned: KeySet::new(),
            slot: RwLock::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Keys merged into every fetched set (e.g. a local development key).
    pub fn with_pinned(mut self, pinned: KeySet) -> Self {
        self.pinned = pinned;
        self
    }

    pub fn fetcher(&self) -> &JwksFetcher {
        &self.fetcher
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached set if it is still within its TTL.
    pub fn fresh(&self) -> Option<Arc<KeySet>> {
        let guard = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.keys.clone())
    }

    /// Drop the cached set so the next lookup refetches.
    pub fn invalidate(&self) {
        let mut guard = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }

    /// Fetch unconditionally and replace the cached entry.
    pub async fn refresh(&self) -> AuthResult<Arc<KeySet>> {
        let mut fetched = match self.fetcher.fetch().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(jwks_url = %self.fetcher.url(), error = %err, "JWKS fetch failed");
                return Err(err);
            }
        };
        fetched.merge(&self.pinned);
        let keys = Arc::new(fetched);

        let mut guard = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(CachedEntry {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        info!(jwks_url = %self.fetcher.url(), count = keys.len(), "JWKS cached");
        Ok(keys)
    }
}

#[async_trait]
impl KeySetProvider for CachedKeySet {
    async fn key_set(&self) -> AuthResult<Arc<KeySet>> {
        if let Some(keys) = self.fresh() {
            return Ok(keys);
        }
        debug!(jwks_url = %self.fetcher.url(), "JWKS cache empty or stale");
        self.refresh().await
    }
}
