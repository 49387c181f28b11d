use ferret_core::ingest::{index_directory, index_directory_pooled, index_file, text_files};
use ferret_core::{InvertedIndex, SharedIndex, WorkerPool};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn corpus(dir: &Path) {
    fs::create_dir_all(dir.join("nested/deeper")).unwrap();
    fs::write(dir.join("a.txt"), "The cat sat.\nThe cat ran away!").unwrap();
    fs::write(dir.join("B.TEXT"), "Dogs chase cats").unwrap();
    fs::write(dir.join("nested/c.txt"), "running runners run").unwrap();
    fs::write(dir.join("nested/deeper/d.txt"), "").unwrap();
    fs::write(dir.join("nested/skip.md"), "not indexed at all").unwrap();
}

#[test]
fn only_text_files_are_collected() {
    let dir = tempdir().unwrap();
    corpus(dir.path());
    let files = text_files(dir.path()).unwrap();
    assert_eq!(files.len(), 4);
    assert!(files.iter().all(|f| f.extension().is_some_and(|e| e != "md")));

    let direct = dir.path().join("nested/skip.md");
    assert_eq!(text_files(&direct).unwrap(), vec![direct]);
}

#[test]
fn positions_continue_across_lines() {
    let dir = tempdir().unwrap();
    corpus(dir.path());
    let path = dir.path().join("a.txt");
    let mut index = InvertedIndex::new();
    index_file(&path, &mut index).unwrap();

    let location = path.to_string_lossy();
    assert_eq!(index.word_count(&location), 7);
    let cat: Vec<usize> = index.positions("cat", &location).unwrap().iter().copied().collect();
    assert_eq!(cat, vec![2, 5]);
    assert!(index.contains_position("away", &location, 7));
}

#[test]
fn pooled_build_matches_sequential_build() {
    let dir = tempdir().unwrap();
    corpus(dir.path());

    let mut sequential = InvertedIndex::new();
    assert_eq!(index_directory(dir.path(), &mut sequential).unwrap(), 0);

    let pool = WorkerPool::new(3).unwrap();
    let shared = Arc::new(SharedIndex::new());
    index_directory_pooled(dir.path(), &shared, &pool).unwrap();
    pool.shutdown();
    pool.join();

    assert_eq!(*shared.read(), sequential);
    assert_eq!(shared.location_count("cat"), 2);
    assert_eq!(pool.failures(), 0);
}

#[test]
fn missing_root_is_reported() {
    let mut index = InvertedIndex::new();
    assert!(index_directory(Path::new("/no/such/dir/anywhere"), &mut index).is_err());
    assert!(index.is_empty());
}

/// `a.txt` starts with readable words and then turns into invalid UTF-8.
fn corpus_with_bad_file(dir: &Path) {
    let mut bad = b"alpha beta\n".to_vec();
    bad.extend_from_slice(&[0xFF, 0xFE]);
    fs::write(dir.join("a.txt"), bad).unwrap();
    fs::write(dir.join("b.txt"), "gamma delta").unwrap();
}

#[test]
fn unreadable_file_is_skipped_without_partial_content() {
    let dir = tempdir().unwrap();
    corpus_with_bad_file(dir.path());

    let mut sequential = InvertedIndex::new();
    assert_eq!(index_directory(dir.path(), &mut sequential).unwrap(), 1);
    assert_eq!(sequential.terms().collect::<Vec<_>>(), vec!["delta", "gamma"]);
    assert!(!sequential.contains_location("alpha", &dir.path().join("a.txt").to_string_lossy()));
    assert_eq!(sequential.num_locations(), 1);
}

#[test]
fn failed_file_job_leaves_shared_index_consistent() {
    let dir = tempdir().unwrap();
    corpus_with_bad_file(dir.path());

    let mut sequential = InvertedIndex::new();
    index_directory(dir.path(), &mut sequential).unwrap();

    let pool = WorkerPool::new(2).unwrap();
    let shared = Arc::new(SharedIndex::new());
    index_directory_pooled(dir.path(), &shared, &pool).unwrap();
    pool.shutdown();
    pool.join();

    assert_eq!(pool.failures(), 1);
    assert_eq!(shared.terms(), vec!["delta", "gamma"]);
    assert_eq!(*shared.read(), sequential);
}
