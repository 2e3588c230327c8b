//! Expiry-aware caching of role credentials.
//!
//! [`CredentialCache`] sits in front of a [`CredentialSource`] (normally
//! [`crate::blocking::Client`]) and hands out previously fetched
//! credentials for as long as they stay valid for the window the caller
//! asks for. Staleness is checked lazily on lookup; nothing is ever evicted.

use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::Result;
use crate::request::AssumeRoleRequest;
use crate::response::Credentials;

/// Something that can mint fresh credentials for a role request.
pub trait CredentialSource {
    fn fetch(&self, request: &AssumeRoleRequest) -> Result<Credentials>;
}

impl<F> CredentialSource for F
where
    F: Fn(&AssumeRoleRequest) -> Result<Credentials>,
{
    fn fetch(&self, request: &AssumeRoleRequest) -> Result<Credentials> {
        self(request)
    }
}

/// Source of "now" for validity checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock, [`Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Derives the cache key of a request.
pub type KeyFn = dyn Fn(&AssumeRoleRequest) -> String + Send + Sync;

/// Default key: role ARN, session name and policy, in that order.
///
/// The parts are separated by `\n`, which cannot occur in an ARN or a
/// session name. A missing policy and an empty one share a key, since
/// neither is sent to STS.
pub fn default_key(request: &AssumeRoleRequest) -> String {
    format!(
        "{}\n{}\n{}",
        request.role_arn,
        request.role_session_name,
        request.policy.as_deref().unwrap_or_default()
    )
}

struct Entry {
    credentials: Credentials,
    /// Order in which the source returned this value.
    seq: u64,
}

/// Caches credentials per derived key in front of a [`CredentialSource`].
///
/// Lookups that hit only take a read lock. The source is called without
/// any lock held, so concurrent misses on the same key may each reach the
/// source; the value the source returned last is the one kept.
pub struct CredentialCache<S> {
    source: S,
    key_fn: Box<KeyFn>,
    clock: Box<dyn Clock>,
    entries: RwLock<HashMap<String, Entry>>,
    next_seq: AtomicU64,
}

impl<S: CredentialSource> CredentialCache<S> {
    /// Wraps `source`, keying entries with [`default_key`].
    pub fn new(source: S) -> Self {
        Self {
            source,
            key_fn: Box::new(default_key),
            clock: Box::new(SystemClock),
            entries: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Replaces the key derivation, e.g. to also partition by tenant.
    pub fn with_key_fn<K>(mut self, key_fn: K) -> Self
    where
        K: Fn(&AssumeRoleRequest) -> String + Send + Sync + 'static,
    {
        self.key_fn = Box::new(key_fn);
        self
    }

    /// Replaces the time source used for validity checks.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Returns the wrapped credential source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns credentials for `request` that stay valid for more than
    /// `min_validity` from now.
    ///
    /// A cached value is returned if its expiration is strictly later than
    /// `now + min_validity`. Otherwise the source is called and its result
    /// is stored and returned as is. A failed fetch returns the source's
    /// error and leaves any cached value in place.
    pub fn get(&self, request: &AssumeRoleRequest, min_validity: Duration) -> Result<Credentials> {
        let key = (self.key_fn)(request);

        if let Some(credentials) = self.lookup(&key, min_validity) {
            tracing::trace!(
                role_arn = %request.role_arn,
                expiration = %credentials.expiration,
                "credential cache hit"
            );
            return Ok(credentials);
        }

        tracing::debug!(
            role_arn = %request.role_arn,
            session = %request.role_session_name,
            min_validity_secs = min_validity.as_secs(),
            "credential cache miss, fetching"
        );
        let credentials = self.source.fetch(request).inspect_err(|e| {
            tracing::warn!(role_arn = %request.role_arn, error = %e, "credential refresh failed");
        })?;
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        self.store(key, seq, credentials.clone());
        Ok(credentials)
    }

    /// Returns the cached value for `request` without checking its validity.
    pub fn cached(&self, request: &AssumeRoleRequest) -> Option<Credentials> {
        let key = (self.key_fn)(request);
        self.read_entries()
            .get(&key)
            .map(|entry| entry.credentials.clone())
    }

    /// Number of keys with a cached value, stale ones included.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    /// Returns `true` if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &str, min_validity: Duration) -> Option<Credentials> {
        // A window too large to represent can never be satisfied.
        let deadline = TimeDelta::from_std(min_validity)
            .ok()
            .and_then(|window| self.clock.now().checked_add_signed(window))?;

        self.read_entries()
            .get(key)
            .filter(|entry| entry.credentials.expires_after(deadline))
            .map(|entry| entry.credentials.clone())
    }

    fn store(&self, key: String, seq: u64, credentials: Credentials) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.entry(key) {
            MapEntry::Occupied(mut slot) => {
                if slot.get().seq < seq {
                    slot.insert(Entry { credentials, seq });
                } else {
                    tracing::debug!("newer credentials already cached, keeping them");
                }
            }
            MapEntry::Vacant(slot) => {
                slot.insert(Entry { credentials, seq });
            }
        }
    }

    // Every critical section is a single map operation, so a poisoned map
    // is still consistent.
    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A cache is itself a source: it serves any credential that is not yet expired.
impl<S: CredentialSource> CredentialSource for CredentialCache<S> {
    fn fetch(&self, request: &AssumeRoleRequest) -> Result<Credentials> {
        self.get(request, Duration::ZERO)
    }
}

impl<S> std::fmt::Debug for CredentialCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("CredentialCache")
            .field("entries", &len)
            .finish_non_exhaustive()
    }
}
