//! Cached metadata requests
//!
//! This module provides a caching wrapper for HTTP clients that stores
//! metadata API responses on disk, so repeated runs over the same show do not
//! walk the whole series again.

use crate::cache::CacheStorage;
use crate::http::{FetchError, HttpClient};

/// A caching wrapper for HTTP clients
///
/// Successful responses are stored under their URL. Failed requests are not
/// cached, and cache errors never fail a request.
pub(crate) struct CachedHttpClient<C>
where
    C: HttpClient,
{
    /// The underlying client
    inner: C,
    /// Response bodies by URL
    cache: CacheStorage<String>,
}

impl<C> CachedHttpClient<C>
where
    C: HttpClient,
{
    /// Creates a new cached client wrapping the given client
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let cache = CacheStorage::open("metadata", Some(DEFAULT_CACHE_TTL))?;
    /// let cached = CachedHttpClient::new(ReqwestHttpClient::new()?, cache);
    /// ```
    pub fn new(inner: C, cache: CacheStorage<String>) -> Self {
        Self { inner, cache }
    }
}

impl<C> HttpClient for CachedHttpClient<C>
where
    C: HttpClient,
{
    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        match self.cache.load(url) {
            Ok(Some(body)) => {
                tracing::debug!(url, "metadata cache hit");
                return Ok(body);
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(url, error = %e, "metadata cache unreadable"),
        }

        let body = self.inner.get_text(url)?;

        if let Err(e) = self.cache.store(url, &body) {
            tracing::debug!(url, error = %e, "failed to store metadata cache entry");
        }

        Ok(body)
    }
}
