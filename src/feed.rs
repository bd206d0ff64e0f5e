// Item input and the multi-feed run loop
//
// Items arrive as JSON Lines. Every configured feed receives every item, in
// input order, the way a crawl fans scraped items out to its feed exporters.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bigexport_config::{ExporterOptions, FeedsConfig};
use bigexport_core::{ExportSummary, ItemExporter, Record};
use tracing::{info, warn};

use crate::registry::build_exporter;

/// Reads one item per non-blank line
pub struct ItemReader<R> {
    lines: Lines<R>,
    line_number: usize,
}

impl<R: BufRead> ItemReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for ItemReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    return Some(
                        Err(e).with_context(|| format!("Failed to read line {}", self.line_number + 1)),
                    )
                }
            };
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            let line_number = self.line_number;
            let item = serde_json::from_str::<serde_json::Value>(&line)
                .map_err(anyhow::Error::from)
                .and_then(|json| Record::from_json(&json).map_err(anyhow::Error::from))
                .with_context(|| format!("Invalid item on line {}", line_number));
            return Some(item);
        }
    }
}

/// Open `-` as stdin, anything else as a file
pub fn open_input(input: &str) -> Result<Box<dyn BufRead>> {
    if input == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(input).with_context(|| format!("Failed to open input: {}", input))?;
    Ok(Box::new(BufReader::new(file)))
}

/// One output of a run
pub struct Feed {
    pub path: PathBuf,
    pub exporter: Box<dyn ItemExporter>,
}

impl Feed {
    pub fn new(path: impl Into<PathBuf>, options: &ExporterOptions) -> Result<Self> {
        let path = path.into();
        let exporter = build_exporter(&path, options)
            .with_context(|| format!("Failed to configure feed {}", path.display()))?;
        Ok(Self { path, exporter })
    }
}

/// Build every feed of a feed file. Options of all feeds are validated
/// before any output is opened.
pub fn feeds_from_config(config: &FeedsConfig) -> Result<Vec<Feed>> {
    config
        .feeds
        .iter()
        .map(|feed| {
            let options = feed
                .exporter_options()
                .with_context(|| format!("Invalid options for feed {}", feed.path.display()))?;
            Feed::new(&feed.path, &options)
        })
        .collect()
}

/// Totals of one feed after a run
#[derive(Debug, Clone)]
pub struct FeedReport {
    pub path: PathBuf,
    pub summary: ExportSummary,
}

impl FeedReport {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "path": self.path.display().to_string(),
            "format": self.summary.format,
            "records_exported": self.summary.records_exported,
            "batches_flushed": self.summary.batches_flushed,
        })
    }
}

fn feed_context(path: &Path, step: &str) -> String {
    format!("Feed {} failed to {}", path.display(), step)
}

/// Start every feed, export every item to each of them, then finish them.
///
/// The first error aborts the run. Feeds that already started are left as
/// they are; their partial output is not cleaned up.
pub fn run_feeds<I>(feeds: &mut [Feed], items: I) -> Result<Vec<FeedReport>>
where
    I: IntoIterator<Item = Result<Record>>,
{
    if feeds.is_empty() {
        anyhow::bail!("No feeds configured");
    }

    for feed in feeds.iter_mut() {
        feed.exporter
            .start_exporting()
            .with_context(|| feed_context(&feed.path, "start"))?;
        info!(format = %feed.exporter.format(), path = %feed.path.display(), "Feed started");
    }

    let mut items_read: u64 = 0;
    for item in items {
        let record = item?;
        items_read += 1;
        if let Some((last, rest)) = feeds.split_last_mut() {
            for feed in rest.iter_mut() {
                feed.exporter
                    .export_item(record.clone())
                    .with_context(|| feed_context(&feed.path, "export an item"))?;
            }
            last.exporter
                .export_item(record)
                .with_context(|| feed_context(&last.path, "export an item"))?;
        }
    }

    if items_read == 0 {
        warn!("Input contained no items");
    }

    let mut reports = Vec::with_capacity(feeds.len());
    for feed in feeds.iter_mut() {
        let summary = feed
            .exporter
            .finish_exporting()
            .with_context(|| feed_context(&feed.path, "finish"))?;
        info!(
            format = %summary.format,
            path = %feed.path.display(),
            records = summary.records_exported,
            batches = summary.batches_flushed,
            "Feed finished"
        );
        reports.push(FeedReport {
            path: feed.path.clone(),
            summary,
        });
    }
    Ok(reports)
}
