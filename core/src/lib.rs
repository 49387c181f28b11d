pub mod index;
pub mod ingest;
pub mod persist;
pub mod pool;
pub mod query;
pub mod search;
pub mod tokenizer;

pub use index::{InvertedIndex, SharedIndex};
pub use pool::WorkerPool;
pub use query::{PooledQueryBuilder, QueryBuilder, QueryEngine};
pub use search::{SearchMode, SearchResult};
