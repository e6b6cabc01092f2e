//! Feed retrieval and ingestion.
//!
//! - [`parser`] - RSS document shape and entity normalization
//! - [`fetcher`] - single-GET HTTP retrieval with a size limit
//! - [`ingest`] - publish-date parsing and dedup-aware post inserts
//!
//! # Example
//!
//! ```ignore
//! use gator::feed::{ingest_document, FeedReader, DEFAULT_USER_AGENT};
//!
//! let reader = FeedReader::new(None, DEFAULT_USER_AGENT)?;
//! let document = reader.fetch(&feed.url).await?;
//! let report = ingest_document(&db, feed.id, &document).await;
//! println!("{} new posts", report.inserted);
//! ```

mod fetcher;
mod ingest;
mod parser;

pub use fetcher::{FeedReader, FetchError, DEFAULT_USER_AGENT};
pub use ingest::{ingest_document, parse_pub_date, IngestReport, PubDateError, PUB_DATE_LAYOUT};
pub use parser::{parse_document, Channel, DocumentError, SyndicationDocument, SyndicationItem};
