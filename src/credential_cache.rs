//! LRU credential cache for L402 tokens, keyed by `(origin, route prefix)`.
//!
//! Paths are grouped by their first two segments, so `/api/v1/foo` and
//! `/api/v1/bar` share one credential. Servers commonly scope a macaroon to a
//! whole API namespace, and this lets one payment cover it.
//!
//! Expiry is checked lazily: an expired credential is dropped by the lookup
//! that finds it. There is no background sweeping.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use l402_types::challenge::authorization;
use l402_types::config::CacheConfig;
use l402_types::timestamp::UnixTimestamp;

/// A cached L402 credential (macaroon + preimage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub macaroon: String,
    pub preimage: String,
    pub created_at: UnixTimestamp,
    pub expires_at: Option<UnixTimestamp>,
}

impl Credential {
    pub fn is_expired_at(&self, now: UnixTimestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(UnixTimestamp::now())
    }

    /// `L402 <macaroon>:<preimage>`
    pub fn authorization_header(&self) -> String {
        authorization(&self.macaroon, &self.preimage)
    }
}

/// Normalized cache key: lowercased origin and route prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub origin: String,
    pub prefix: String,
}

impl CacheKey {
    /// `/api/v1/anything` becomes `/api/v1`; `/items` stays `/items`; `` becomes `/`.
    pub fn new(origin: &str, path: &str) -> Self {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).take(2).collect();
        Self {
            origin: origin.trim().to_lowercase(),
            prefix: format!("/{}", segments.join("/")),
        }
    }
}

struct CacheEntry {
    credential: Credential,
    /// Position in `LruState::recency`.
    tick: u64,
}

#[derive(Default)]
struct LruState {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Least recently used first.
    recency: BTreeMap<u64, CacheKey>,
    next_tick: u64,
}

impl LruState {
    fn touch(&mut self, key: &CacheKey) {
        let tick = self.next_tick;
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.tick);
            entry.tick = tick;
            self.recency.insert(tick, key.clone());
            self.next_tick += 1;
        }
    }

    fn remove(&mut self, key: &CacheKey) {
        if let Some(entry) = self.entries.remove(key) {
            self.recency.remove(&entry.tick);
        }
    }

    fn insert(&mut self, key: CacheKey, credential: Credential) {
        self.remove(&key);
        let tick = self.next_tick;
        self.next_tick += 1;
        self.recency.insert(tick, key.clone());
        self.entries.insert(key, CacheEntry { credential, tick });
    }

    fn evict_to(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            let Some((_, key)) = self.recency.pop_first() else {
                break;
            };
            tracing::debug!(origin = %key.origin, prefix = %key.prefix, "Evicting L402 credential");
            self.entries.remove(&key);
        }
    }
}

/// Thread-safe LRU cache for L402 credentials.
///
/// ```
/// use l402_rs::credential_cache::CredentialCache;
///
/// let cache = CredentialCache::default();
/// cache.put("api.example.com", "/v1/data/latest", "mac", "00ff", None);
/// let hit = cache.get("API.example.com", "/v1/data/history").unwrap();
/// assert_eq!(hit.authorization_header(), "L402 mac:00ff");
/// ```
pub struct CredentialCache {
    max_size: usize,
    default_ttl: Option<Duration>,
    state: Mutex<LruState>,
}

impl Default for CredentialCache {
    fn default() -> Self {
        Self::from(CacheConfig::default())
    }
}

impl From<CacheConfig> for CredentialCache {
    fn from(config: CacheConfig) -> Self {
        Self::new(config.max_size, config.default_ttl())
    }
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("max_size", &self.max_size)
            .field("default_ttl", &self.default_ttl)
            .field("len", &self.len())
            .finish()
    }
}

impl CredentialCache {
    /// `default_ttl` applies to credentials stored without an explicit expiry;
    /// `None` keeps them until evicted.
    pub fn new(max_size: usize, default_ttl: Option<Duration>) -> Self {
        Self {
            max_size,
            default_ttl,
            state: Mutex::new(LruState::default()),
        }
    }

    /// Retrieves a live credential for `origin` and `path`, marking it most recently used.
    pub fn get(&self, origin: &str, path: &str) -> Option<Credential> {
        self.get_at(origin, path, UnixTimestamp::now())
    }

    fn get_at(&self, origin: &str, path: &str, now: UnixTimestamp) -> Option<Credential> {
        let key = CacheKey::new(origin, path);
        let mut state = self.state();
        let expired = state.entries.get(&key)?.credential.is_expired_at(now);
        if expired {
            tracing::debug!(origin = %key.origin, prefix = %key.prefix, "Dropping expired L402 credential");
            state.remove(&key);
            return None;
        }
        state.touch(&key);
        state.entries.get(&key).map(|entry| entry.credential.clone())
    }

    /// Stores a credential, replacing any existing one for the same key.
    ///
    /// Without `expires_at` the credential expires after the default TTL.
    pub fn put(
        &self,
        origin: &str,
        path: &str,
        macaroon: &str,
        preimage: &str,
        expires_at: Option<UnixTimestamp>,
    ) -> Credential {
        let key = CacheKey::new(origin, path);
        let now = UnixTimestamp::now();
        let credential = Credential {
            macaroon: macaroon.to_string(),
            preimage: preimage.to_string(),
            created_at: now,
            expires_at: expires_at.or_else(|| self.default_ttl.map(|ttl| now + ttl)),
        };

        let mut state = self.state();
        state.insert(key, credential.clone());
        state.evict_to(self.max_size);
        credential
    }

    /// Removes all cached credentials.
    pub fn clear(&self) {
        let mut state = self.state();
        state.entries.clear();
        state.recency.clear();
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn state(&self) -> MutexGuard<'_, LruState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
