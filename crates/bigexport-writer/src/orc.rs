// ORC exporter backend
//
// The schema is always explicit. Each flush becomes an Arrow batch handed to
// the ORC writer, which cuts stripes by stripe_size.

use std::fs::File;
use std::path::PathBuf;

use arrow::datatypes::{DataType, Schema, SchemaRef};
use bigexport_config::{OrcCompression, OrcCompressionStrategy, OrcFileVersion, OrcOptions};
use bigexport_core::{
    records_to_batch, Backend, Batch, Coercion, ExportError, ExportSummary, Format, Result,
};
use orc_rust::arrow_writer::{ArrowWriter, ArrowWriterBuilder};
use tracing::{debug, info, warn};

use crate::sink::FileSink;

/// Options the encoder has no setting for, when they differ from the defaults
fn unapplied_options(options: &OrcOptions) -> Vec<String> {
    let mut unapplied = Vec::new();
    if options.compression != OrcCompression::default() {
        unapplied.push(format!("compression={:?}", options.compression));
    }
    if options.compression_strategy != OrcCompressionStrategy::default() {
        unapplied.push(format!("compression_strategy={:?}", options.compression_strategy));
    }
    if options.file_version != OrcFileVersion::default() {
        unapplied.push(format!("file_version={:?}", options.file_version));
    }
    if options.compression_block_size != 64 * 1024 {
        unapplied.push(format!("compression_block_size={}", options.compression_block_size));
    }
    if options.row_index_stride != 10_000 {
        unapplied.push(format!("row_index_stride={}", options.row_index_stride));
    }
    if options.padding_tolerance != 0.0 {
        unapplied.push(format!("padding_tolerance={}", options.padding_tolerance));
    }
    if options.dictionary_key_size_threshold != 0.0 {
        unapplied.push(format!(
            "dictionary_key_size_threshold={}",
            options.dictionary_key_size_threshold
        ));
    }
    if !options.bloom_filter_columns.is_empty() {
        unapplied.push(format!(
            "bloom_filter_columns={:?} (fpp {})",
            options.bloom_filter_columns, options.bloom_filter_fpp
        ));
    }
    unapplied
}

/// Column types the ORC encoder can write. Lists, timestamps and dates are
/// not among them.
fn check_encodable(schema: &Schema) -> Result<()> {
    for field in schema.fields() {
        match field.data_type() {
            DataType::Utf8
            | DataType::Binary
            | DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::Float32
            | DataType::Float64 => {}
            other => {
                return Err(ExportError::configuration(format!(
                    "ORC column '{}' has type {}, which the ORC encoder cannot write. \
                     Supported: string, binary, boolean, tinyint, smallint, int, bigint, float, double",
                    field.name(),
                    other
                )))
            }
        }
    }
    Ok(())
}

pub struct OrcBackend {
    sink: FileSink,
    schema: SchemaRef,
    coercion: Coercion,
    batch_size: usize,
    stripe_size: usize,
    writer: Option<ArrowWriter<File>>,
}

impl OrcBackend {
    /// Resolve the schema. No file is touched.
    pub fn new(path: impl Into<PathBuf>, options: &OrcOptions) -> Result<Self> {
        let schema = options
            .schema
            .as_ref()
            .ok_or_else(|| ExportError::configuration("No orc schema defined"))?
            .to_arrow(options.common.hasnulls)?;
        check_encodable(&schema)?;

        let unapplied = unapplied_options(options);
        if !unapplied.is_empty() {
            warn!(
                options = %unapplied.join(", "),
                "ORC options accepted but not applied by the encoder"
            );
        }

        Ok(Self {
            sink: FileSink::new(Format::Orc, path),
            schema,
            coercion: Coercion {
                safe: options.pyarrow_safe_schema,
            },
            batch_size: options.batch_size,
            stripe_size: options.stripe_size,
            writer: None,
        })
    }

    pub fn schema_columns(&self) -> Vec<String> {
        self.schema.fields().iter().map(|f| f.name().clone()).collect()
    }

    fn write_error(e: orc_rust::error::OrcError) -> ExportError {
        ExportError::backend_write(Format::Orc, e.to_string())
    }

    fn open_writer(&mut self) -> Result<ArrowWriter<File>> {
        let file = self.sink.take()?;
        let writer = ArrowWriterBuilder::new(file, self.schema.clone())
            .with_batch_size(self.batch_size)
            .with_stripe_byte_size(self.stripe_size)
            .try_build()
            .map_err(Self::write_error)?;
        info!(
            path = %self.sink.path().display(),
            columns = self.schema.fields().len(),
            "Created ORC writer"
        );
        Ok(writer)
    }
}

impl Backend for OrcBackend {
    fn format(&self) -> Format {
        Format::Orc
    }

    fn start(&mut self) -> Result<()> {
        self.sink.open()
    }

    fn write_batch(&mut self, batch: Batch<'_>) -> Result<()> {
        let record_batch = records_to_batch(&self.schema, batch.records, self.coercion)?;

        let mut writer = match self.writer.take() {
            Some(writer) => writer,
            None => self.open_writer()?,
        };
        writer.write(&record_batch).map_err(Self::write_error)?;
        debug!(rows = record_batch.num_rows(), "Wrote ORC batch");
        self.writer = Some(writer);
        Ok(())
    }

    fn finish(&mut self, summary: &ExportSummary) -> Result<()> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => self.open_writer()?,
        };
        writer.close().map_err(Self::write_error)?;
        self.sink.close()?;

        info!(
            path = %self.sink.path().display(),
            records = summary.records_exported,
            batches = summary.batches_flushed,
            "Closed ORC file"
        );
        Ok(())
    }
}
