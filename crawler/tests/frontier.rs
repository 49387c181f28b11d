use ferret_core::{SearchMode, SharedIndex, WorkerPool};
use ferret_crawler::{Fetcher, WebCrawler};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use url::Url;

/// Serves pages from memory and records every fetch.
struct SiteFetcher {
    pages: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
}

impl Fetcher for SiteFetcher {
    fn fetch(&self, url: &Url, _max_redirects: usize) -> Option<String> {
        self.fetched.lock().push(url.to_string());
        self.pages.get(url.as_str()).cloned()
    }
}

fn page_url(i: usize) -> String {
    format!("http://site.test/p/{i}")
}

/// `n` pages; page `i` links to `2i+1`, `2i+2`, back to the seed, and to itself.
fn binary_site(n: usize, missing: &[usize]) -> SiteFetcher {
    let mut pages = HashMap::new();
    for i in (0..n).filter(|i| !missing.contains(i)) {
        let links: String = [2 * i + 1, 2 * i + 2, 0, i]
            .iter()
            .filter(|&&j| j < n)
            .map(|j| format!("<a href=\"/p/{j}#section\">page {j}</a> "))
            .collect();
        let body = format!(
            "<html><head><title>P{i}</title></head>\
             <body><p>shared words page</p>{links}</body></html>"
        );
        pages.insert(page_url(i), body);
    }
    SiteFetcher { pages, fetched: Mutex::new(Vec::new()) }
}

type Crawl = (Arc<SiteFetcher>, Arc<WebCrawler>, Arc<SharedIndex>, Arc<WorkerPool>);

fn run(site: SiteFetcher, max: usize) -> Crawl {
    let site = Arc::new(site);
    let pool = Arc::new(WorkerPool::new(4).unwrap());
    let index = Arc::new(SharedIndex::new());
    let crawler = WebCrawler::new(Arc::clone(&pool), Arc::clone(&index), site.clone(), max);
    crawler.crawl(&Url::parse(&format!("{}#intro", page_url(0))).unwrap());
    (site, crawler, index, pool)
}

#[test]
fn crawl_visits_exactly_max_pages() {
    let (site, crawler, index, pool) = run(binary_site(100, &[]), 25);

    assert_eq!(crawler.visited().len(), 25);
    let fetched = site.fetched.lock().clone();
    assert_eq!(fetched.len(), 25);
    let unique: HashSet<_> = fetched.iter().collect();
    assert_eq!(unique.len(), 25, "a page was fetched twice");
    assert_eq!(index.num_locations(), 25);
    assert!(fetched.iter().all(|u| !u.contains('#')));

    pool.shutdown();
    pool.join();
}

#[test]
fn small_sites_are_crawled_completely() {
    let (_site, crawler, index, _pool) = run(binary_site(7, &[]), 50);
    let visited: BTreeSet<String> = crawler.visited().into_iter().map(String::from).collect();
    let expected: BTreeSet<String> = (0..7).map(page_url).collect();
    assert_eq!(visited, expected);

    let results = index.search(&["share".to_string()].into(), SearchMode::Exact);
    assert_eq!(results.len(), 7);
}

#[test]
fn single_page_limit_never_follows_links() {
    let (site, crawler, index, _pool) = run(binary_site(10, &[]), 1);
    assert_eq!(crawler.visited().len(), 1);
    assert_eq!(site.fetched.lock().len(), 1);
    assert!(index.contains_location("page", &page_url(0)));
}

#[test]
fn unavailable_pages_still_count_against_the_limit() {
    // Pages 1 and 2 are missing, so nothing past them is reachable.
    let (site, crawler, index, _pool) = run(binary_site(20, &[1, 2]), 10);
    assert_eq!(crawler.visited().len(), 3);
    assert_eq!(site.fetched.lock().len(), 3);
    assert_eq!(index.num_locations(), 1);
}

#[test]
fn locations_use_each_page_url() {
    let (_site, _crawler, index, _pool) = run(binary_site(3, &[]), 3);
    let locations = index.locations("page");
    assert_eq!(locations, vec![page_url(0), page_url(1), page_url(2)]);
    // "P1" lives in <title>, which is not indexed.
    assert!(!index.contains("p1"));
}

#[test]
fn stopped_pool_leaves_nothing_claimed() {
    let site = Arc::new(binary_site(5, &[]));
    let pool = Arc::new(WorkerPool::new(2).unwrap());
    pool.shutdown();
    let index = Arc::new(SharedIndex::new());
    let crawler = WebCrawler::new(Arc::clone(&pool), Arc::clone(&index), site.clone(), 5);
    crawler.crawl(&Url::parse(&page_url(0)).unwrap());

    assert!(crawler.visited().is_empty());
    assert!(site.fetched.lock().is_empty());
    assert!(index.is_empty());
    pool.join();
}
