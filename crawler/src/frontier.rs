use crate::fetch::Fetcher;
use crate::markup::{extract_links, normalize, strip_markup};
use ferret_core::tokenizer::stem_all;
use ferret_core::{InvertedIndex, SharedIndex, WorkerPool};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Redirects followed per page.
pub const MAX_REDIRECTS: usize = 3;

/// Breadth-first crawl driven by the worker pool, capped at `max_pages` distinct URLs.
///
/// A URL counts against the cap as soon as it is scheduled, whether or not its page
/// turns out to be fetchable.
pub struct WebCrawler {
    pool: Arc<WorkerPool>,
    index: Arc<SharedIndex>,
    fetcher: Arc<dyn Fetcher>,
    visited: Mutex<HashSet<Url>>,
    max_pages: usize,
}

impl WebCrawler {
    pub fn new(
        pool: Arc<WorkerPool>,
        index: Arc<SharedIndex>,
        fetcher: Arc<dyn Fetcher>,
        max_pages: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            pool,
            index,
            fetcher,
            visited: Mutex::new(HashSet::new()),
            max_pages: max_pages.max(1),
        })
    }

    /// Crawls from `seed` and returns once the pool is idle.
    pub fn crawl(self: &Arc<Self>, seed: &Url) {
        let seed = normalize(seed);
        tracing::info!(seed = %seed, max_pages = self.max_pages, "crawl started");
        if self.visited.lock().insert(seed.clone()) {
            if !self.schedule(&seed) {
                self.visited.lock().remove(&seed);
            }
        } else {
            tracing::debug!(seed = %seed, "seed already visited");
        }
        self.pool.finish();
        tracing::info!(visited = self.visited.lock().len(), "crawl finished");
    }

    /// Every URL scheduled so far, sorted.
    pub fn visited(&self) -> Vec<Url> {
        let mut urls: Vec<Url> = self.visited.lock().iter().cloned().collect();
        urls.sort();
        urls
    }

    pub fn max_pages(&self) -> usize { self.max_pages }

    /// Queues `url` for processing. Returns `false` when the pool has been shut down;
    /// the caller then releases its claim on `url`.
    fn schedule(self: &Arc<Self>, url: &Url) -> bool {
        let crawler = Arc::clone(self);
        let job_url = url.clone();
        let queued = self.pool.execute(move || {
            crawler.process(&job_url);
            Ok(())
        });
        if !queued {
            tracing::warn!(url = %url, "page not scheduled: worker pool is shut down");
        }
        queued
    }

    fn process(self: &Arc<Self>, url: &Url) {
        let Some(html) = self.fetcher.fetch(url, MAX_REDIRECTS) else {
            tracing::debug!(url = %url, "nothing to index");
            return;
        };
        self.enqueue(extract_links(url, &html));

        let words = stem_all(&strip_markup(&html));
        let mut local = InvertedIndex::new();
        local.add_all(&words, url.as_str());
        self.index.merge(local);
        tracing::debug!(url = %url, words = words.len(), "page indexed");
    }

    /// Claims and schedules unseen links until `max_pages` URLs have been claimed.
    fn enqueue(self: &Arc<Self>, links: Vec<Url>) {
        let mut visited = self.visited.lock();
        for link in links {
            if visited.len() >= self.max_pages {
                break;
            }
            if visited.insert(link.clone()) && !self.schedule(&link) {
                visited.remove(&link);
                break;
            }
        }
    }
}
