pub mod builder;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod metadata;
pub mod persist;
pub mod registry;
pub mod search;
pub mod spimi;
pub mod tokenizer;
pub mod weighting;

pub use config::{IndexConfig, IndexVariant, SearchConfig};
pub use error::{Error, Result};
pub use index::{DocId, Posting, PostingList, SourceDocument, TermEntry};
pub use search::{SearchHit, SearchResults, Searcher};
pub use spimi::{build_index, IndexSummary, SpimiIndexer};
