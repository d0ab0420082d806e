//! Time-bounded cache for a service credential.
//!
//! Holds one value (typically an access token) until it expires. Refreshes
//! happen under a lock, so concurrent callers that find the value expired
//! trigger a single refresh and then share its result.
//!
//! Nothing in the CLI authenticates, so the crate itself never builds one. It
//! is exported for the HTTP front end, which caches its identity-service admin
//! token here and passes the cache to its handlers.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use tracing::debug;

#[derive(Debug)]
struct Cached<T> {
    value: T,
    expires_at: Instant,
}

/// Owned TTL cache for a single value. Inject it where needed; never global.
#[derive(Debug)]
pub struct TokenCache<T> {
    ttl: Duration,
    slot: Mutex<Option<Cached<T>>>,
}

impl<T: Clone> TokenCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value while `now` is before its expiry; otherwise call
    /// `refresh`, cache its result for one TTL from `now`, and return it.
    ///
    /// A failed refresh leaves the cache empty and returns the error.
    pub fn get_or_refresh<F>(&self, now: Instant, refresh: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut slot = self.lock()?;
        if let Some(cached) = slot.as_ref()
            && now < cached.expires_at
        {
            return Ok(cached.value.clone());
        }

        debug!(ttl_secs = self.ttl.as_secs(), "token expired or absent, refreshing");
        *slot = None;
        let value = refresh()?;
        *slot = Some(Cached {
            value: value.clone(),
            expires_at: now + self.ttl,
        });
        Ok(value)
    }

    /// Drop the cached value so the next call refreshes.
    pub fn invalidate(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Cached<T>>>> {
        self.slot
            .lock()
            .map_err(|_| anyhow!("token cache lock poisoned"))
    }
}
