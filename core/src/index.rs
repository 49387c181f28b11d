use crate::search::{SearchMode, SearchResult};
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

pub type Positions = BTreeSet<usize>;
pub type Postings = BTreeMap<String, Positions>;

/// Term -> location -> 1-based word positions, plus the length of every location.
///
/// A location is expected to be indexed completely by one builder. Lengths from
/// different builders are merged with `max`, which only equals the word count when no
/// location was split across builders.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvertedIndex {
    index: BTreeMap<String, Postings>,
    counts: BTreeMap<String, usize>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, term: &str, location: &str, position: usize) {
        self.index
            .entry(term.to_string())
            .or_default()
            .entry(location.to_string())
            .or_default()
            .insert(position);
        let len = self.counts.entry(location.to_string()).or_insert(0);
        *len = (*len).max(position);
    }

    /// Adds `terms` as one document, numbering positions from 1.
    pub fn add_all<S: AsRef<str>>(&mut self, terms: &[S], location: &str) {
        for (i, term) in terms.iter().enumerate() {
            self.add(term.as_ref(), location, i + 1);
        }
    }

    /// Folds `other` into this index: position sets are unioned, lengths take the max.
    pub fn merge(&mut self, other: InvertedIndex) {
        for (term, postings) in other.index {
            match self.index.get_mut(&term) {
                None => {
                    self.index.insert(term, postings);
                }
                Some(mine) => {
                    for (location, positions) in postings {
                        match mine.get_mut(&location) {
                            None => {
                                mine.insert(location, positions);
                            }
                            Some(existing) => existing.extend(positions),
                        }
                    }
                }
            }
        }
        for (location, len) in other.counts {
            let mine = self.counts.entry(location).or_insert(0);
            *mine = (*mine).max(len);
        }
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize { self.index.len() }

    pub fn is_empty(&self) -> bool { self.index.is_empty() }

    /// Number of locations containing `term`.
    pub fn location_count(&self, term: &str) -> usize {
        self.index.get(term).map_or(0, BTreeMap::len)
    }

    /// Number of positions of `term` in `location`.
    pub fn position_count(&self, term: &str, location: &str) -> usize {
        self.positions(term, location).map_or(0, BTreeSet::len)
    }

    pub fn contains(&self, term: &str) -> bool { self.index.contains_key(term) }

    pub fn contains_location(&self, term: &str, location: &str) -> bool {
        self.index.get(term).is_some_and(|p| p.contains_key(location))
    }

    pub fn contains_position(&self, term: &str, location: &str, position: usize) -> bool {
        self.positions(term, location).is_some_and(|p| p.contains(&position))
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn locations(&self, term: &str) -> impl Iterator<Item = &str> {
        self.index.get(term).into_iter().flat_map(|p| p.keys().map(String::as_str))
    }

    pub fn positions(&self, term: &str, location: &str) -> Option<&Positions> {
        self.index.get(term)?.get(location)
    }

    /// Highest position recorded for `location`, 0 when unknown.
    pub fn word_count(&self, location: &str) -> usize {
        self.counts.get(location).copied().unwrap_or(0)
    }

    pub fn num_locations(&self) -> usize { self.counts.len() }

    pub fn counts(&self) -> &BTreeMap<String, usize> { &self.counts }

    pub fn postings(&self) -> &BTreeMap<String, Postings> { &self.index }

    pub fn search(&self, terms: &BTreeSet<String>, mode: SearchMode) -> Vec<SearchResult> {
        match mode {
            SearchMode::Exact => self.exact_search(terms),
            SearchMode::Partial => self.partial_search(terms),
        }
    }

    pub fn exact_search(&self, terms: &BTreeSet<String>) -> Vec<SearchResult> {
        let mut matches = HashMap::new();
        for term in terms {
            if let Some(postings) = self.index.get(term) {
                tally(postings, &mut matches);
            }
        }
        self.score(matches)
    }

    /// Every index term starting with a query term counts as a match.
    pub fn partial_search(&self, terms: &BTreeSet<String>) -> Vec<SearchResult> {
        let mut matches = HashMap::new();
        for prefix in terms {
            let hits = self
                .index
                .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
                .take_while(|(term, _)| term.starts_with(prefix.as_str()));
            for (_, postings) in hits {
                tally(postings, &mut matches);
            }
        }
        self.score(matches)
    }

    fn score(&self, matches: HashMap<&str, usize>) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = matches
            .into_iter()
            .map(|(location, count)| SearchResult::new(location, count, self.word_count(location)))
            .collect();
        results.sort();
        results
    }
}

fn tally<'a>(postings: &'a Postings, matches: &mut HashMap<&'a str, usize>) {
    for (location, positions) in postings {
        *matches.entry(location.as_str()).or_insert(0) += positions.len();
    }
}

/// An [`InvertedIndex`] behind one reader/writer lock, shared by reference between tasks.
///
/// Reads hand back owned snapshots; nothing borrowed from inside the lock escapes except
/// through [`SharedIndex::read`].
#[derive(Debug, Default)]
pub struct SharedIndex {
    inner: RwLock<InvertedIndex>,
}

impl SharedIndex {
    pub fn new() -> Self { Self::default() }

    pub fn add(&self, term: &str, location: &str, position: usize) {
        self.inner.write().add(term, location, position);
    }

    pub fn add_all<S: AsRef<str>>(&self, terms: &[S], location: &str) {
        self.inner.write().add_all(terms, location);
    }

    pub fn merge(&self, local: InvertedIndex) {
        self.inner.write().merge(local);
    }

    pub fn len(&self) -> usize { self.inner.read().len() }

    pub fn is_empty(&self) -> bool { self.inner.read().is_empty() }

    pub fn location_count(&self, term: &str) -> usize { self.inner.read().location_count(term) }

    pub fn position_count(&self, term: &str, location: &str) -> usize {
        self.inner.read().position_count(term, location)
    }

    pub fn contains(&self, term: &str) -> bool { self.inner.read().contains(term) }

    pub fn contains_location(&self, term: &str, location: &str) -> bool {
        self.inner.read().contains_location(term, location)
    }

    pub fn contains_position(&self, term: &str, location: &str, position: usize) -> bool {
        self.inner.read().contains_position(term, location, position)
    }

    pub fn terms(&self) -> Vec<String> {
        self.inner.read().terms().map(str::to_string).collect()
    }

    pub fn locations(&self, term: &str) -> Vec<String> {
        self.inner.read().locations(term).map(str::to_string).collect()
    }

    pub fn positions(&self, term: &str, location: &str) -> Positions {
        self.inner.read().positions(term, location).cloned().unwrap_or_default()
    }

    pub fn word_count(&self, location: &str) -> usize { self.inner.read().word_count(location) }

    pub fn num_locations(&self) -> usize { self.inner.read().num_locations() }

    pub fn counts(&self) -> BTreeMap<String, usize> { self.inner.read().counts().clone() }

    pub fn search(&self, terms: &BTreeSet<String>, mode: SearchMode) -> Vec<SearchResult> {
        self.inner.read().search(terms, mode)
    }

    pub fn exact_search(&self, terms: &BTreeSet<String>) -> Vec<SearchResult> {
        self.inner.read().exact_search(terms)
    }

    pub fn partial_search(&self, terms: &BTreeSet<String>) -> Vec<SearchResult> {
        self.inner.read().partial_search(terms)
    }

    /// Holds the reader lock for as long as the guard lives; used for writing reports.
    pub fn read(&self) -> RwLockReadGuard<'_, InvertedIndex> { self.inner.read() }

    pub fn into_inner(self) -> InvertedIndex { self.inner.into_inner() }
}

impl From<InvertedIndex> for SharedIndex {
    fn from(index: InvertedIndex) -> Self {
        Self { inner: RwLock::new(index) }
    }
}
