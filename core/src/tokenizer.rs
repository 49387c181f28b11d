use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::BTreeSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref CLEAN: Regex = Regex::new(r"[^\p{Alphabetic}\s]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Split text into normalized words: NFD with combining marks removed, lowercase,
/// anything that is not a letter or whitespace deleted.
pub fn parse(text: &str) -> Vec<String> {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    CLEAN
        .replace_all(&folded, "")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Snowball English stem of a single, already parsed word.
pub fn stem(word: &str) -> String {
    STEMMER.stem(word).into_owned()
}

/// Stems of every word in `text`, in order. Position `i` (0-based) is word `i + 1`.
pub fn stem_all(text: &str) -> Vec<String> {
    parse(text).iter().map(|w| stem(w)).collect()
}

/// Sorted, deduplicated stems of `text`.
pub fn unique_stems(text: &str) -> BTreeSet<String> {
    parse(text).iter().map(|w| stem(w)).collect()
}

/// Cache key for a query line. Empty when no word survives parsing.
pub fn canonical_key(text: &str) -> String {
    join_stems(&unique_stems(text))
}

pub fn join_stems(stems: &BTreeSet<String>) -> String {
    stems.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_stem() {
        let t = stem_all("Running, runner's run!");
        assert_eq!(t.first().map(String::as_str), Some("run"));
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn punctuation_inside_words_is_removed() {
        assert_eq!(parse("don't stop-believing"), vec!["dont", "stopbelieving"]);
    }

    #[test]
    fn canonical_key_sorts_and_dedups() {
        assert_eq!(canonical_key("Cats cat THE dog"), "cat dog the");
        assert_eq!(canonical_key("  42 !! "), "");
    }
}
