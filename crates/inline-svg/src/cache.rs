//! Shared SVG document cache with per-URL request de-duplication.

use crate::document::SvgDocument;
use crate::error::FetchError;
use crate::fetch::Fetcher;
use futures::channel::oneshot;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type SharedResult = Result<Arc<SvgDocument>, FetchError>;

enum EntryState {
    /// A fetch is in flight; callers that arrive meanwhile wait on these channels.
    Pending(Vec<oneshot::Sender<SharedResult>>),
    Ready(Arc<SvgDocument>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Served from a `Ready` entry.
    pub hits: u64,
    /// Started a fetch for a cacheable URL.
    pub misses: u64,
    /// Waited on another caller's in-flight fetch.
    pub joined: u64,
    /// Fetched with caching disabled.
    pub uncached: u64,
}

/// Keyed store of parsed SVG documents, shared by every loader that holds it.
///
/// At most one fetch per URL is in flight at any time. Failed fetches are reported to every
/// waiter and then forgotten, so the next request retries. Documents are handed out behind
/// `Arc` and never mutated; consumers take their own copy with [`SvgDocument::clone_root`].
pub struct SvgCache {
    fetcher: Arc<dyn Fetcher>,
    entries: Mutex<FxHashMap<String, EntryState>>,
    stats: Mutex<CacheStats>,
}

impl SvgCache {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            entries: Mutex::new(FxHashMap::default()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// Returns the parsed document for `url`.
    ///
    /// With `use_cache == false` this always fetches and neither reads nor writes the store.
    pub async fn get(&self, url: &str, use_cache: bool) -> SharedResult {
        if !use_cache {
            self.lock_stats().uncached += 1;
            tracing::debug!(url, "fetching SVG (cache disabled)");
            return self.fetch_and_parse(url).await.map(Arc::new);
        }

        loop {
            let waiter = {
                let mut entries = self.lock_entries();
                match entries.get_mut(url) {
                    Some(EntryState::Ready(doc)) => {
                        self.lock_stats().hits += 1;
                        tracing::debug!(url, "SVG cache hit");
                        return Ok(Arc::clone(doc));
                    }
                    Some(EntryState::Pending(waiters)) => {
                        let (tx, rx) = oneshot::channel();
                        waiters.push(tx);
                        rx
                    }
                    None => {
                        entries.insert(url.to_string(), EntryState::Pending(Vec::new()));
                        break;
                    }
                }
            };

            self.lock_stats().joined += 1;
            tracing::debug!(url, "joining in-flight SVG fetch");
            match waiter.await {
                Ok(result) => return result,
                // The owner was dropped before settling; join or start the next attempt.
                Err(oneshot::Canceled) => {
                    tracing::debug!(url, "in-flight SVG fetch was cancelled; retrying");
                }
            }
        }

        self.lock_stats().misses += 1;
        tracing::debug!(url, "SVG cache miss; fetching");
        let flight = InFlight {
            cache: self,
            url,
            settled: false,
        };
        let result = self.fetch_and_parse(url).await.map(Arc::new);
        flight.settle(result.clone());
        result
    }

    pub fn contains(&self, url: &str) -> bool {
        matches!(self.lock_entries().get(url), Some(EntryState::Ready(_)))
    }

    /// Number of ready documents.
    pub fn len(&self) -> usize {
        self.lock_entries()
            .values()
            .filter(|e| matches!(e, EntryState::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops a ready document. In-flight fetches are not affected.
    pub fn remove(&self, url: &str) -> bool {
        let mut entries = self.lock_entries();
        if matches!(entries.get(url), Some(EntryState::Ready(_))) {
            entries.remove(url);
            return true;
        }
        false
    }

    /// Drops every ready document. In-flight fetches are not affected.
    pub fn clear(&self) {
        self.lock_entries()
            .retain(|_, e| matches!(e, EntryState::Pending(_)));
    }

    pub fn stats(&self) -> CacheStats {
        *self.lock_stats()
    }

    async fn fetch_and_parse(&self, url: &str) -> Result<SvgDocument, FetchError> {
        let text = self
            .fetcher
            .fetch_text(url)
            .await
            .map_err(|e| FetchError::new(url, e))?;
        SvgDocument::parse(&text).map_err(|e| FetchError::new(url, e))
    }

    fn lock_entries(&self) -> MutexGuard<'_, FxHashMap<String, EntryState>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_stats(&self) -> MutexGuard<'_, CacheStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SvgCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SvgCache")
            .field("ready", &self.len())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Ownership of a `Pending` entry. Settling resolves the waiters; dropping the owner without
/// settling (the request future was cancelled) discards the entry and wakes the waiters, which
/// then start or join a fresh fetch.
struct InFlight<'a> {
    cache: &'a SvgCache,
    url: &'a str,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, result: SharedResult) {
        self.settled = true;
        let waiters = {
            let mut entries = self.cache.lock_entries();
            let waiters = match entries.remove(self.url) {
                Some(EntryState::Pending(waiters)) => waiters,
                Some(ready @ EntryState::Ready(_)) => {
                    entries.insert(self.url.to_string(), ready);
                    Vec::new()
                }
                None => Vec::new(),
            };
            if let Ok(doc) = &result {
                entries
                    .entry(self.url.to_string())
                    .or_insert_with(|| EntryState::Ready(Arc::clone(doc)));
            }
            waiters
        };
        if let Err(err) = &result {
            tracing::debug!(
                url = self.url,
                error = %err,
                waiters = waiters.len(),
                "SVG fetch failed; not cached"
            );
        }
        for tx in waiters {
            let _ = tx.send(result.clone());
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut entries = self.cache.lock_entries();
        if matches!(entries.get(self.url), Some(EntryState::Pending(_))) {
            // Dropping the senders wakes every waiter with `Canceled`.
            entries.remove(self.url);
        }
    }
}
