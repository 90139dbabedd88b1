//! A library for discovering the same-domain link set of a website.
//!
//! The crawl checkpoints its frontier after every processed page, so an
//! interrupted run resumes where it left off.

pub mod crawler;
mod extract;
mod fetch;
mod origin;
mod output;
mod shutdown;

pub use crawler::checkpoint::{key_for, CheckpointError, CheckpointStore, FrontierSnapshot};
pub use crawler::frontier::Frontier;
pub use crawler::{CrawlError, CrawlState, CrawlSummary, Crawler, CrawlerOptions};
pub use extract::LinkExtractor;
pub use fetch::Fetcher;
pub use origin::{ensure_scheme, resolve, same_origin};
pub use output::OutputSink;
