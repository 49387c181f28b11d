use crate::index::{InvertedIndex, SharedIndex};
use crate::pool::WorkerPool;
use crate::tokenizer::{parse, stem};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

fn is_text_file(path: &Path) -> bool {
    let name = path.to_string_lossy().to_lowercase();
    name.ends_with(".txt") || name.ends_with(".text")
}

/// Files to index under `root`. A file given directly is always included; inside a
/// directory only `.txt` and `.text` files are.
pub fn text_files(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if entry.file_type().is_file() && is_text_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Indexes one file completely into `index`, numbering words across lines.
pub fn index_file(path: &Path, index: &mut InvertedIndex) -> Result<()> {
    let location = path.to_string_lossy();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut position = 0;
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        for word in parse(&line) {
            position += 1;
            index.add(&stem(&word), &location, position);
        }
    }
    Ok(())
}

/// Indexes every text file under `root`. Each file is built into a private index and
/// merged only when it was read completely; a file that fails is logged and skipped.
/// Returns the number of files that failed.
pub fn index_directory(root: &Path, index: &mut InvertedIndex) -> Result<usize> {
    let files = text_files(root)?;
    tracing::info!(files = files.len(), root = %root.display(), "indexing text files");
    let mut failed = 0;
    for path in files {
        let mut local = InvertedIndex::new();
        match index_file(&path, &mut local) {
            Ok(()) => index.merge(local),
            Err(err) => {
                failed += 1;
                let error = format!("{err:#}");
                tracing::error!(path = %path.display(), %error, "file skipped");
            }
        }
    }
    Ok(failed)
}

/// One pool job per file. Each job builds a private index for its file and merges it,
/// so a file that cannot be read contributes nothing and fails only its own job.
pub fn index_directory_pooled(
    root: &Path,
    index: &Arc<SharedIndex>,
    pool: &WorkerPool,
) -> Result<()> {
    let files = text_files(root)?;
    tracing::info!(
        files = files.len(),
        threads = pool.threads(),
        root = %root.display(),
        "indexing text files"
    );
    for path in files {
        let index = Arc::clone(index);
        pool.execute(move || {
            let mut local = InvertedIndex::new();
            index_file(&path, &mut local)?;
            index.merge(local);
            Ok(())
        });
    }
    pool.finish();
    Ok(())
}
