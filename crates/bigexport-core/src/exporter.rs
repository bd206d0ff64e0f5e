//! Buffer-and-flush lifecycle shared by every output format
//!
//! [`BatchExporter`] owns the record buffer and the state machine; a
//! [`Backend`] only knows how to encode one batch into its format.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::capability::{Capability, Format};
use crate::error::{ExportError, Result};
use crate::record::Record;

/// Records handed to a backend in one flush
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    /// Column set of the run, in output order
    pub columns: &'a [String],
    /// Records already projected onto `columns`
    pub records: &'a [Record],
    /// 1-based flush number
    pub sequence: u64,
}

impl Batch<'_> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Format-specific half of an exporter
pub trait Backend {
    fn format(&self) -> Format;

    /// Whether the encoding library for this backend was compiled in
    fn capability(&self) -> Capability {
        Capability::available(self.format())
    }

    /// Open sinks and catalogs. Called once, after the capability check.
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Encode and write one non-empty batch
    fn write_batch(&mut self, batch: Batch<'_>) -> Result<()>;

    /// Close writers and sinks. Called once after the final flush.
    fn finish(&mut self, _summary: &ExportSummary) -> Result<()> {
        Ok(())
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn format(&self) -> Format {
        (**self).format()
    }

    fn capability(&self) -> Capability {
        (**self).capability()
    }

    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn write_batch(&mut self, batch: Batch<'_>) -> Result<()> {
        (**self).write_batch(batch)
    }

    fn finish(&mut self, summary: &ExportSummary) -> Result<()> {
        (**self).finish(summary)
    }
}

/// Plugin interface the crawling host drives
pub trait ItemExporter {
    fn format(&self) -> Format;

    fn state(&self) -> ExporterState;

    fn start_exporting(&mut self) -> Result<()>;

    fn export_item(&mut self, record: Record) -> Result<()>;

    fn finish_exporting(&mut self) -> Result<ExportSummary>;
}

/// Lifecycle states of an exporter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExporterState {
    Unconfigured,
    Ready,
    Accumulating,
    Flushing,
    Finalized,
    /// A start, flush or finish step failed; the exporter is unusable
    Failed,
}

impl fmt::Display for ExporterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExporterState::Unconfigured => "unconfigured",
            ExporterState::Ready => "ready",
            ExporterState::Accumulating => "accumulating",
            ExporterState::Flushing => "flushing",
            ExporterState::Finalized => "finalized",
            ExporterState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Buffering rules common to every backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Flush once the buffer holds more than this many records
    pub threshold: usize,
    /// Stringify every value before buffering
    pub convert_all_strings: bool,
    /// Fixed column set; inferred from the first record when `None`
    pub fields_to_export: Option<Vec<String>>,
}

impl BatchPolicy {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            convert_all_strings: false,
            fields_to_export: None,
        }
    }

    pub fn with_convert_all_strings(mut self, enabled: bool) -> Self {
        self.convert_all_strings = enabled;
        self
    }

    pub fn with_fields_to_export(mut self, fields: Option<Vec<String>>) -> Self {
        self.fields_to_export = fields;
        self
    }
}

/// Totals reported by `finish_exporting`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub format: Format,
    pub records_exported: u64,
    pub batches_flushed: u64,
}

/// Generic exporter: buffers records and hands full batches to `B`
pub struct BatchExporter<B: Backend> {
    backend: B,
    policy: BatchPolicy,
    state: ExporterState,
    columns: Option<Vec<String>>,
    buffer: Vec<Record>,
    records_exported: u64,
    batches_flushed: u64,
}

impl<B: Backend> BatchExporter<B> {
    pub fn new(backend: B, policy: BatchPolicy) -> Self {
        let columns = policy.fields_to_export.clone();
        Self {
            backend,
            policy,
            state: ExporterState::Unconfigured,
            columns,
            buffer: Vec::new(),
            records_exported: 0,
            batches_flushed: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> &BatchPolicy {
        &self.policy
    }

    /// Column set of the run, once known
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Records waiting for the next flush
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn summary(&self) -> ExportSummary {
        ExportSummary {
            format: self.backend.format(),
            records_exported: self.records_exported,
            batches_flushed: self.batches_flushed,
        }
    }

    fn fail(&mut self, err: ExportError) -> ExportError {
        self.state = ExporterState::Failed;
        err
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        self.state = ExporterState::Flushing;
        // Taken up front: a failed batch is dropped, not re-queued
        let records = std::mem::take(&mut self.buffer);
        let sequence = self.batches_flushed + 1;
        let columns = self.columns.as_deref().unwrap_or(&[]);

        debug!(
            format = %self.backend.format(),
            batch = sequence,
            records = records.len(),
            "Flushing batch"
        );

        let batch = Batch {
            columns,
            records: &records,
            sequence,
        };
        if let Err(e) = self.backend.write_batch(batch) {
            return Err(self.fail(e));
        }

        self.records_exported += records.len() as u64;
        self.batches_flushed = sequence;
        self.state = ExporterState::Accumulating;
        Ok(())
    }
}

impl<B: Backend> ItemExporter for BatchExporter<B> {
    fn format(&self) -> Format {
        self.backend.format()
    }

    fn state(&self) -> ExporterState {
        self.state
    }

    #[instrument(skip(self), fields(format = %self.backend.format()))]
    fn start_exporting(&mut self) -> Result<()> {
        if self.state != ExporterState::Unconfigured {
            return Err(ExportError::lifecycle("start exporting", self.state));
        }

        if let Err(e) = self.backend.capability().ensure() {
            return Err(self.fail(e));
        }
        if let Err(e) = self.backend.start() {
            return Err(self.fail(e));
        }

        self.state = ExporterState::Ready;
        info!(threshold = self.policy.threshold, "Exporter started");
        Ok(())
    }

    fn export_item(&mut self, record: Record) -> Result<()> {
        match self.state {
            ExporterState::Ready | ExporterState::Accumulating => {}
            other => return Err(ExportError::lifecycle("export item", other)),
        }

        if self.columns.is_none() {
            if record.is_empty() {
                return Err(ExportError::configuration(
                    "Cannot infer columns from an item without fields",
                ));
            }
            self.columns = Some(record.field_names());
        }

        let mut record = record.project(self.columns.as_deref().unwrap_or(&[]));
        if self.policy.convert_all_strings {
            record = record.stringify();
        }

        if self.buffer.len() > self.policy.threshold {
            self.flush()?;
        }
        self.buffer.push(record);
        self.state = ExporterState::Accumulating;
        Ok(())
    }

    #[instrument(skip(self), fields(format = %self.backend.format()))]
    fn finish_exporting(&mut self) -> Result<ExportSummary> {
        match self.state {
            ExporterState::Ready | ExporterState::Accumulating => {}
            other => return Err(ExportError::lifecycle("finish exporting", other)),
        }

        self.flush()?;

        let summary = self.summary();
        if let Err(e) = self.backend.finish(&summary) {
            return Err(self.fail(e));
        }

        self.state = ExporterState::Finalized;
        info!(
            records = summary.records_exported,
            batches = summary.batches_flushed,
            "Export finished"
        );
        Ok(summary)
    }
}
