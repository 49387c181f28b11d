use crate::index::{InvertedIndex, SharedIndex};
use crate::persist;
use crate::pool::WorkerPool;
use crate::search::{SearchMode, SearchResult};
use crate::tokenizer::{join_stems, unique_stems};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

pub type ResultCache = BTreeMap<String, Vec<SearchResult>>;

/// Runs query lines against an index and remembers the results per canonical query.
pub trait QueryEngine {
    /// Results for `line`, computed at most once per canonical query.
    fn search(&self, line: &str) -> Vec<SearchResult>;

    fn build_line(&self, line: &str);

    /// Runs every line of a query file.
    fn build_file(&self, path: &Path) -> Result<()> {
        for line in read_lines(path)? {
            self.build_line(&line);
        }
        Ok(())
    }

    /// Cached results for `line`, empty when it was never searched.
    fn get(&self, line: &str) -> Vec<SearchResult>;

    /// Canonical queries cached so far, in order.
    fn queries(&self) -> Vec<String>;

    fn contains(&self, line: &str) -> bool;

    fn is_partial(&self) -> bool;

    fn len(&self) -> usize { self.queries().len() }

    fn is_empty(&self) -> bool { self.len() == 0 }

    fn result_count(&self, line: &str) -> usize { self.get(line).len() }

    fn write_json(&self, path: &Path) -> Result<()>;
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("open query file {}", path.display()))?;
    BufReader::new(file)
        .lines()
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("read query file {}", path.display()))
}

/// Query engine for the single-threaded configuration.
pub struct QueryBuilder<'a> {
    index: &'a InvertedIndex,
    mode: SearchMode,
    results: RefCell<ResultCache>,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(index: &'a InvertedIndex, mode: SearchMode) -> Self {
        Self { index, mode, results: RefCell::new(BTreeMap::new()) }
    }
}

impl QueryEngine for QueryBuilder<'_> {
    fn search(&self, line: &str) -> Vec<SearchResult> {
        let stems = unique_stems(line);
        if stems.is_empty() {
            return Vec::new();
        }
        let key = join_stems(&stems);
        if let Some(found) = self.results.borrow().get(&key) {
            return found.clone();
        }
        let found = self.index.search(&stems, self.mode);
        self.results.borrow_mut().insert(key, found.clone());
        found
    }

    fn build_line(&self, line: &str) {
        self.search(line);
    }

    fn get(&self, line: &str) -> Vec<SearchResult> {
        let key = join_stems(&unique_stems(line));
        self.results.borrow().get(&key).cloned().unwrap_or_default()
    }

    fn queries(&self) -> Vec<String> { self.results.borrow().keys().cloned().collect() }

    fn contains(&self, line: &str) -> bool {
        self.results.borrow().contains_key(&join_stems(&unique_stems(line)))
    }

    fn is_partial(&self) -> bool { self.mode.is_partial() }

    fn write_json(&self, path: &Path) -> Result<()> {
        persist::write_results(&self.results.borrow(), path)
    }
}

/// Query engine for the multi-threaded configuration; query files are run as pool jobs.
pub struct PooledQueryBuilder {
    index: Arc<SharedIndex>,
    pool: Arc<WorkerPool>,
    mode: SearchMode,
    results: Arc<RwLock<ResultCache>>,
}

impl PooledQueryBuilder {
    pub fn new(index: Arc<SharedIndex>, pool: Arc<WorkerPool>, mode: SearchMode) -> Self {
        Self { index, pool, mode, results: Arc::new(RwLock::new(BTreeMap::new())) }
    }
}

/// Checks the cache under the reader lock, searches without holding it, then inserts
/// under the writer lock. Two racing first searches may both compute; the first insert wins.
fn cached_search(
    index: &SharedIndex,
    results: &RwLock<ResultCache>,
    mode: SearchMode,
    line: &str,
) -> Vec<SearchResult> {
    let stems = unique_stems(line);
    if stems.is_empty() {
        return Vec::new();
    }
    let key = join_stems(&stems);
    if let Some(found) = results.read().get(&key) {
        return found.clone();
    }
    let found = index.search(&stems, mode);
    results.write().entry(key).or_insert(found).clone()
}

impl QueryEngine for PooledQueryBuilder {
    fn search(&self, line: &str) -> Vec<SearchResult> {
        cached_search(&self.index, &self.results, self.mode, line)
    }

    fn build_line(&self, line: &str) {
        let index = Arc::clone(&self.index);
        let results = Arc::clone(&self.results);
        let mode = self.mode;
        let line = line.to_string();
        self.pool.execute(move || {
            cached_search(&index, &results, mode, &line);
            Ok(())
        });
    }

    fn build_file(&self, path: &Path) -> Result<()> {
        let lines = read_lines(path)?;
        tracing::debug!(queries = lines.len(), path = %path.display(), "submitting query file");
        for line in &lines {
            self.build_line(line);
        }
        self.pool.finish();
        Ok(())
    }

    fn get(&self, line: &str) -> Vec<SearchResult> {
        let key = join_stems(&unique_stems(line));
        self.results.read().get(&key).cloned().unwrap_or_default()
    }

    fn queries(&self) -> Vec<String> { self.results.read().keys().cloned().collect() }

    fn contains(&self, line: &str) -> bool {
        self.results.read().contains_key(&join_stems(&unique_stems(line)))
    }

    fn is_partial(&self) -> bool { self.mode.is_partial() }

    fn write_json(&self, path: &Path) -> Result<()> {
        persist::write_results(&self.results.read(), path)
    }
}
