pub mod fetch;
pub mod frontier;
pub mod markup;

pub use fetch::{Fetcher, HttpFetcher};
pub use frontier::WebCrawler;
