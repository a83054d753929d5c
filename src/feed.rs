//! Upstream release feed with an explicit, injectable cache.
//!
//! The list of available releases comes from the panel's tag-metadata
//! fetcher (a source-hosting API client that already filters pre-release
//! tags). Fetches are expensive, so the resolver wraps whatever feed it is
//! given in [`CachedFeed`] with a caller-controlled TTL instead of relying
//! on a process-wide cache keyed by a fixed string.

use crate::Result;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default cache lifetime for release lists.
pub const DEFAULT_FEED_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Source of available upstream release versions.
///
/// Implementations return plain version strings, newest ordering not
/// required; pre-release tags are expected to be filtered already.
pub trait VersionFeed: Send + Sync {
    fn fetch(&self) -> Result<Vec<String>>;
}

/// TTL-based caching decorator for any [`VersionFeed`].
pub struct CachedFeed<F> {
    inner: F,
    ttl: Duration,
    state: Mutex<Option<(Instant, Vec<String>)>>,
}

impl<F: VersionFeed> CachedFeed<F> {
    /// Wrap a feed with the default 12-hour TTL.
    pub fn new(inner: F) -> Self {
        Self::with_ttl(inner, DEFAULT_FEED_TTL)
    }

    /// Wrap a feed with a caller-chosen TTL.
    pub fn with_ttl(inner: F, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            state: Mutex::new(None),
        }
    }
}

impl<F: VersionFeed> VersionFeed for CachedFeed<F> {
    fn fetch(&self) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((stamp, versions)) = state.as_ref() {
            if stamp.elapsed() < self.ttl {
                return Ok(versions.clone());
            }
        }
        let versions = self.inner.fetch()?;
        *state = Some((Instant::now(), versions.clone()));
        Ok(versions)
    }
}
