// Parquet exporter backend
//
// One ArrowWriter per run, opened at the first flush. Every flush is written
// and then flushed as its own row group (split further by row_group_size).

use std::fs::File;
use std::path::PathBuf;

use arrow::datatypes::SchemaRef;
use bigexport_config::{ParquetCompression, ParquetOptions, ParquetVersion};
use bigexport_core::{
    infer_schema, records_to_batch, Backend, Batch, Coercion, ExportError, ExportSummary, Format,
    Result,
};
use parquet::arrow::arrow_writer::ArrowWriterOptions;
use parquet::arrow::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression, GzipLevel, ZstdLevel};
use parquet::file::metadata::KeyValue;
use parquet::file::properties::{EnabledStatistics, WriterProperties, WriterVersion};
use tracing::{debug, info};

use crate::sink::FileSink;

/// Map the exporter's compression options onto a Parquet codec
pub fn compression(codec: ParquetCompression, level: Option<i32>) -> Result<Compression> {
    let invalid = |e: parquet::errors::ParquetError| {
        ExportError::configuration(format!("Invalid compression_level: {}", e))
    };
    let unsigned = |level: i32| {
        u32::try_from(level).map_err(|_| {
            ExportError::configuration(format!("Invalid compression_level: {}", level))
        })
    };

    Ok(match codec {
        ParquetCompression::None => Compression::UNCOMPRESSED,
        ParquetCompression::Snappy => Compression::SNAPPY,
        ParquetCompression::Lz4 => Compression::LZ4_RAW,
        ParquetCompression::Gzip => Compression::GZIP(match level {
            Some(l) => GzipLevel::try_new(unsigned(l)?).map_err(invalid)?,
            None => GzipLevel::default(),
        }),
        ParquetCompression::Brotli => Compression::BROTLI(match level {
            Some(l) => BrotliLevel::try_new(unsigned(l)?).map_err(invalid)?,
            None => BrotliLevel::default(),
        }),
        ParquetCompression::Zstd => Compression::ZSTD(match level {
            Some(l) => ZstdLevel::try_new(l).map_err(invalid)?,
            None => ZstdLevel::default(),
        }),
    })
}

/// Writer properties for a run
pub fn writer_properties(options: &ParquetOptions) -> Result<WriterProperties> {
    let statistics = if options.write_page_index {
        EnabledStatistics::Page
    } else if options.write_statistics {
        EnabledStatistics::Chunk
    } else {
        EnabledStatistics::None
    };
    let version = match options.version {
        ParquetVersion::V1_0 => WriterVersion::PARQUET_1_0,
        ParquetVersion::V2_4 | ParquetVersion::V2_6 => WriterVersion::PARQUET_2_0,
    };

    let mut builder = WriterProperties::builder()
        .set_writer_version(version)
        .set_dictionary_enabled(options.use_dictionary)
        .set_statistics_enabled(statistics)
        .set_compression(compression(options.compression, options.compression_level)?);

    if let Some(size) = options.row_group_size {
        builder = builder.set_max_row_group_size(size);
    }
    if let Some(size) = options.data_page_size {
        builder = builder.set_data_page_size_limit(size);
    }
    if let Some(size) = options.write_batch_size {
        builder = builder.set_write_batch_size(size);
    }
    if let Some(size) = options.dictionary_pagesize_limit {
        builder = builder.set_dictionary_page_size_limit(size);
    }
    if !options.key_value_metadata.is_empty() {
        let metadata = options
            .key_value_metadata
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect();
        builder = builder.set_key_value_metadata(Some(metadata));
    }

    Ok(builder.build())
}

pub struct ParquetBackend {
    sink: FileSink,
    properties: WriterProperties,
    store_schema: bool,
    nullable: bool,
    coercion: Coercion,
    schema: Option<SchemaRef>,
    writer: Option<ArrowWriter<File>>,
}

impl ParquetBackend {
    /// Validate options and build writer properties. No file is touched.
    pub fn new(path: impl Into<PathBuf>, options: &ParquetOptions) -> Result<Self> {
        let schema = options
            .schema
            .as_ref()
            .map(|spec| spec.to_arrow(options.common.hasnulls))
            .transpose()?;

        Ok(Self {
            sink: FileSink::new(Format::Parquet, path),
            properties: writer_properties(options)?,
            store_schema: options.store_schema,
            nullable: options.common.hasnulls,
            coercion: Coercion {
                safe: options.pyarrow_safe_schema,
            },
            schema,
            writer: None,
        })
    }

    /// Column names of an explicit schema
    pub fn schema_columns(&self) -> Option<Vec<String>> {
        self.schema
            .as_ref()
            .map(|s| s.fields().iter().map(|f| f.name().clone()).collect())
    }

    fn write_error(e: parquet::errors::ParquetError) -> ExportError {
        ExportError::backend_write(Format::Parquet, e.to_string())
    }

    fn open_writer(&mut self, schema: SchemaRef) -> Result<ArrowWriter<File>> {
        let file = self.sink.take()?;
        let columns = schema.fields().len();
        let options = ArrowWriterOptions::new()
            .with_properties(self.properties.clone())
            .with_skip_arrow_metadata(!self.store_schema);
        let writer =
            ArrowWriter::try_new_with_options(file, schema, options).map_err(Self::write_error)?;
        info!(
            path = %self.sink.path().display(),
            columns = columns,
            "Created Parquet writer"
        );
        Ok(writer)
    }
}

impl Backend for ParquetBackend {
    fn format(&self) -> Format {
        Format::Parquet
    }

    fn start(&mut self) -> Result<()> {
        self.sink.open()
    }

    fn write_batch(&mut self, batch: Batch<'_>) -> Result<()> {
        let schema = match self.schema.clone() {
            Some(schema) => schema,
            None => {
                let inferred = infer_schema(batch.columns, batch.records, self.nullable)?;
                debug!(schema = ?inferred, "Inferred Parquet schema from first batch");
                self.schema = Some(inferred.clone());
                inferred
            }
        };

        let record_batch = records_to_batch(&schema, batch.records, self.coercion)?;

        let mut writer = match self.writer.take() {
            Some(writer) => writer,
            None => self.open_writer(schema)?,
        };
        writer.write(&record_batch).map_err(Self::write_error)?;
        writer.flush().map_err(Self::write_error)?;
        self.writer = Some(writer);
        Ok(())
    }

    fn finish(&mut self, summary: &ExportSummary) -> Result<()> {
        let writer = match (self.writer.take(), self.schema.clone()) {
            (Some(writer), _) => Some(writer),
            // Nothing flushed but the schema is known: write an empty file
            (None, Some(schema)) => Some(self.open_writer(schema)?),
            (None, None) => None,
        };

        match writer {
            Some(writer) => {
                let file = writer.into_inner().map_err(Self::write_error)?;
                self.sink.sync(file)?;
            }
            None => self.sink.close()?,
        }

        info!(
            path = %self.sink.path().display(),
            records = summary.records_exported,
            row_groups = summary.batches_flushed,
            "Closed Parquet file"
        );
        Ok(())
    }
}
