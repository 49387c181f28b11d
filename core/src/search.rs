use serde::Serialize;
use std::cmp::Ordering;

/// How query terms are matched against index terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// A query term matches only the identical index term.
    #[default]
    Exact,
    /// A query term matches every index term it is a prefix of.
    Partial,
}

impl SearchMode {
    pub fn from_partial(partial: bool) -> Self {
        if partial { SearchMode::Partial } else { SearchMode::Exact }
    }

    pub fn is_partial(self) -> bool {
        matches!(self, SearchMode::Partial)
    }
}

/// One scored location for a query.
///
/// The score is fixed when the result is built, from a document length read under the
/// same lock as the postings, so a result never refers back to its index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub count: usize,
    pub score: f64,
    #[serde(rename = "where")]
    pub location: String,
}

impl SearchResult {
    pub fn new(location: impl Into<String>, count: usize, length: usize) -> Self {
        let score = if length == 0 { 0.0 } else { count as f64 / length as f64 };
        Self { count, score, location: location.into() }
    }
}

impl Eq for SearchResult {}

impl Ord for SearchResult {
    /// Score descending, then count descending, then location ascending ignoring case.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.count.cmp(&self.count))
            .then_with(|| cmp_ignore_case(&self.location, &other.location))
            .then_with(|| self.location.cmp(&other.location))
    }
}

impl PartialOrd for SearchResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    let fold = |s: &str| s.chars().flat_map(char::to_lowercase).collect::<Vec<_>>();
    fold(a).cmp(&fold(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_score_then_count_then_location() {
        let mut results = vec![
            SearchResult::new("b", 1, 4),
            SearchResult::new("a", 1, 4),
            SearchResult::new("c", 2, 8),
            SearchResult::new("d", 1, 2),
        ];
        results.sort();
        let order: Vec<&str> = results.iter().map(|r| r.location.as_str()).collect();
        assert_eq!(order, vec!["d", "c", "a", "b"]);
    }

    #[test]
    fn location_tie_break_ignores_case() {
        let mut results = vec![SearchResult::new("beta", 1, 1), SearchResult::new("Alpha", 1, 1)];
        results.sort();
        assert_eq!(results[0].location, "Alpha");
    }

    #[test]
    fn score_is_count_over_length() {
        let r = SearchResult::new("doc", 3, 12);
        assert!((r.score - 0.25).abs() < f64::EPSILON);
    }
}
