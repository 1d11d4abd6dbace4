//! # In-Memory Response Caching
//!
//! Explicit, injectable caches with a fixed time-to-live. Entries are filled on
//! the first miss and become invisible once older than the TTL; callers can
//! also drop them early with [`TtlCache::invalidate`] or [`TtlCache::clear`].
//!
//! [`CachedProvider`] wraps any [`EnvironmentalProvider`] so repeated identical
//! requests within the TTL never reach the network.

use crate::coverage::CoverageResponse;
use crate::provider::{BBox, EnvironmentalProvider, ProviderError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Key/value cache whose entries expire a fixed duration after insertion.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, (Instant, V)>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Value for `key` if it was inserted less than one TTL ago.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .get(key)
            .filter(|(stored, _)| stored.elapsed() < self.ttl)
            .map(|(_, value)| value.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.entries.insert(key, (Instant::now(), value));
    }

    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop expired entries.
    pub fn purge_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, (stored, _)| stored.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached value for `key`, or the result of `fill` stored under `key`.
    ///
    /// Errors from `fill` are returned and nothing is cached.
    pub fn get_or_try_insert_with<E, F>(&mut self, key: K, fill: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = fill()?;
        self.insert(key, value.clone());
        Ok(value)
    }
}

/// Provider decorator caching successful responses per request.
pub struct CachedProvider<P> {
    inner: P,
    cache: Mutex<TtlCache<String, CoverageResponse>>,
}

impl<P: EnvironmentalProvider> CachedProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Mutex::new(TtlCache::new(ttl)),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Forget every cached response.
    pub fn refresh(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn lookup(&self, key: &String) -> Option<CoverageResponse> {
        self.cache.lock().ok()?.get(key)
    }

    fn store(&self, key: String, response: &CoverageResponse) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, response.clone());
        }
    }
}

#[async_trait]
impl<P: EnvironmentalProvider> EnvironmentalProvider for CachedProvider<P> {
    async fn fetch_batch(
        &self,
        parameters: &[String],
        bbox: &BBox,
        format: &str,
        crs: &str,
    ) -> Result<CoverageResponse, ProviderError> {
        let key = format!("cube|{}|{}|{}|{}", parameters.join(","), bbox, format, crs);
        if let Some(hit) = self.lookup(&key) {
            log::debug!("cache hit for {key}");
            return Ok(hit);
        }
        let response = self.inner.fetch_batch(parameters, bbox, format, crs).await?;
        self.store(key, &response);
        Ok(response)
    }

    async fn fetch_point(
        &self,
        lat: f64,
        lon: f64,
        parameters: &[String],
    ) -> Result<CoverageResponse, ProviderError> {
        let key = format!(
            "point|{}|{}",
            crate::GridKey::new(lat, lon),
            parameters.join(",")
        );
        if let Some(hit) = self.lookup(&key) {
            log::debug!("cache hit for {key}");
            return Ok(hit);
        }
        let response = self.inner.fetch_point(lat, lon, parameters).await?;
        self.store(key, &response);
        Ok(response)
    }
}
