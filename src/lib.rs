//! bigexport - item exporters driven from the command line
//!
//! The binary plays the crawling host: it reads scraped items as JSON Lines
//! and fans them out to one or more feeds, each backed by an exporter from
//! `bigexport-writer` or `bigexport-iceberg`.

pub mod feed;
mod init;
pub mod registry;

pub use feed::{feeds_from_config, open_input, run_feeds, Feed, FeedReport, ItemReader};
pub use init::init_tracing;
pub use registry::{build_exporter, capabilities, capability};
