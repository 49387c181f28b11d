use anyhow::{Context, Result};
use clap::Parser;
use ferret_core::ingest::{index_directory, index_directory_pooled};
use ferret_core::persist::{write_counts, write_index};
use ferret_core::{
    InvertedIndex, PooledQueryBuilder, QueryBuilder, QueryEngine, SearchMode, SharedIndex,
    WorkerPool,
};
use ferret_crawler::fetch::DEFAULT_USER_AGENT;
use ferret_crawler::{HttpFetcher, WebCrawler};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "ferret")]
#[command(about = "Index text files or crawled pages and answer ranked queries", long_about = None)]
struct Cli {
    /// Text file, or directory searched recursively for .txt/.text files
    #[arg(long)]
    text: Option<PathBuf>,
    /// Run on a worker pool with this many threads
    #[arg(long, num_args = 0..=1, default_missing_value = "5")]
    threads: Option<usize>,
    /// Seed URL to crawl (implies a worker pool)
    #[arg(long)]
    html: Option<String>,
    /// Maximum number of pages to crawl
    #[arg(long, default_value_t = 1)]
    crawl: usize,
    /// File with one query per line
    #[arg(long)]
    query: Option<PathBuf>,
    /// Treat query words as prefixes
    #[arg(long, default_value_t = false)]
    partial: bool,
    /// Write document word counts as JSON
    #[arg(long, num_args = 0..=1, default_missing_value = "counts.json")]
    counts: Option<PathBuf>,
    /// Write the inverted index as JSON
    #[arg(long, num_args = 0..=1, default_missing_value = "index.json")]
    index: Option<PathBuf>,
    /// Write query results as JSON
    #[arg(long, num_args = 0..=1, default_missing_value = "results.json")]
    results: Option<PathBuf>,
    /// Serve a search page on this port until Ctrl-C (implies a worker pool)
    #[arg(long, num_args = 0..=1, default_missing_value = "8080")]
    server: Option<u16>,
    /// Request timeout seconds while crawling
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
}

impl Cli {
    fn multithreaded(&self) -> bool {
        self.threads.is_some() || self.html.is_some() || self.server.is_some()
    }
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let start = Instant::now();
    let cli = Cli::parse();
    let mode = SearchMode::from_partial(cli.partial);

    if cli.multithreaded() {
        run_pooled(&cli, mode)?;
    } else {
        run_single(&cli, mode);
    }

    eprintln!("done: elapsed={:.6}s", start.elapsed().as_secs_f64());
    Ok(())
}

/// Input problems are reported here and the run carries on without that input.
fn report(outcome: Result<()>, what: &str, path: &Path) {
    if let Err(err) = outcome {
        tracing::error!(path = %path.display(), error = %format!("{err:#}"), "{what}");
    }
}

fn run_single(cli: &Cli, mode: SearchMode) {
    let mut index = InvertedIndex::new();
    if let Some(path) = &cli.text {
        match index_directory(path, &mut index) {
            Ok(0) => {}
            Ok(failed) => tracing::warn!(failed, path = %path.display(), "some files were skipped"),
            Err(err) => report(Err(err), "unable to index text", path),
        }
    }
    tracing::info!(terms = index.len(), locations = index.num_locations(), "index built");

    let queries = QueryBuilder::new(&index, mode);
    if let Some(path) = &cli.query {
        report(queries.build_file(path), "unable to run queries", path);
    }
    write_reports(cli, &index, &queries);
}

fn run_pooled(cli: &Cli, mode: SearchMode) -> Result<()> {
    let pool = Arc::new(WorkerPool::new(cli.threads.unwrap_or(5)).context("start worker pool")?);
    let index = Arc::new(SharedIndex::new());
    let queries =
        Arc::new(PooledQueryBuilder::new(Arc::clone(&index), Arc::clone(&pool), mode));

    if let Some(path) = &cli.text {
        report(index_directory_pooled(path, &index, &pool), "unable to index text", path);
    }

    if let Some(seed) = &cli.html {
        match Url::parse(seed) {
            Ok(seed) => {
                let timeout = Duration::from_secs(cli.timeout_secs);
                let fetcher = HttpFetcher::new(timeout, DEFAULT_USER_AGENT)
                    .context("build http client")?;
                let crawler = WebCrawler::new(
                    Arc::clone(&pool),
                    Arc::clone(&index),
                    Arc::new(fetcher),
                    cli.crawl,
                );
                crawler.crawl(&seed);
            }
            Err(err) => tracing::error!(seed = %seed, error = %err, "invalid seed url"),
        }
    }
    tracing::info!(terms = index.len(), locations = index.num_locations(), "index built");

    if let Some(path) = &cli.query {
        report(queries.build_file(path), "unable to run queries", path);
    }

    if let Some(port) = cli.server {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
        if let Err(err) = runtime.block_on(ferret_server::serve(addr, queries.clone())) {
            tracing::error!(%addr, error = %format!("{err:#}"), "server failed");
        }
    }

    pool.shutdown();
    write_reports(cli, &index.read(), &*queries);
    pool.join();
    if pool.failures() > 0 {
        tracing::warn!(failures = pool.failures(), "some jobs failed");
    }
    Ok(())
}

fn write_reports(cli: &Cli, index: &InvertedIndex, queries: &dyn QueryEngine) {
    if let Some(path) = &cli.counts {
        report(write_counts(index, path), "unable to write counts", path);
    }
    if let Some(path) = &cli.index {
        report(write_index(index, path), "unable to write index", path);
    }
    if let Some(path) = &cli.results {
        report(queries.write_json(path), "unable to write results", path);
    }
}
