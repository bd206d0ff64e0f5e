// Avro exporter backend
//
// The first flush writes the container header and the first data blocks.
// Every later flush re-opens the file in append mode and adds further blocks
// with the same sync marker, so the result is one valid container file.

use std::collections::HashMap;
use std::path::PathBuf;

use apache_avro::types::Value as AvroValue;
use apache_avro::{
    Bzip2Settings, Codec, Schema as AvroSchema, Writer as AvroWriter, XzSettings,
    ZstandardSettings,
};
use bigexport_config::{AvroCodec, AvroOptions, Properties};
use bigexport_core::{Backend, Batch, ExportError, ExportSummary, Format, Record, Result, Value};
use tracing::{debug, info};

use crate::sink::FileSink;

fn codec_name(codec: AvroCodec) -> &'static str {
    match codec {
        AvroCodec::Null => "null",
        AvroCodec::Deflate => "deflate",
        AvroCodec::Snappy => "snappy",
        AvroCodec::Zstandard => "zstandard",
        AvroCodec::Bzip2 => "bzip2",
        AvroCodec::Xz => "xz",
    }
}

/// Codec for the `compression` option. Zstandard, bzip2 and xz take
/// `compressionlevel`; deflate always uses its default level.
fn codec(compression: AvroCodec, level: Option<i32>) -> Result<Codec> {
    let level = level
        .map(|level| {
            u8::try_from(level).map_err(|_| {
                ExportError::configuration(format!("Invalid avro compressionlevel: {}", level))
            })
        })
        .transpose()?;
    match (compression, level) {
        (AvroCodec::Zstandard, Some(level)) => Ok(Codec::Zstandard(ZstandardSettings::new(level))),
        (AvroCodec::Bzip2, Some(level)) => Ok(Codec::Bzip2(Bzip2Settings::new(level))),
        (AvroCodec::Xz, Some(level)) => Ok(Codec::Xz(XzSettings::new(level))),
        (other, _) => codec_name(other)
            .parse::<Codec>()
            .map_err(|e| ExportError::configuration(format!("Invalid avro codec: {}", e))),
    }
}

/// Sync marker from a 32 hex digit option, or a random one
pub fn sync_marker(option: Option<&str>) -> Result<[u8; 16]> {
    match option {
        Some(text) => hex::decode(text)
            .ok()
            .and_then(|bytes| <[u8; 16]>::try_from(bytes).ok())
            .ok_or_else(|| {
                ExportError::configuration("syncmarker must be 16 bytes written as 32 hex digits")
            }),
        None => Ok(uuid::Uuid::new_v4().into_bytes()),
    }
}

/// Convert a record value to its Avro counterpart before schema resolution
fn to_avro(value: &Value) -> AvroValue {
    match value {
        Value::Null => AvroValue::Null,
        Value::Bool(b) => AvroValue::Boolean(*b),
        Value::Int(i) => AvroValue::Long(*i),
        Value::Float(f) => AvroValue::Double(*f),
        Value::Str(s) => AvroValue::String(s.clone()),
        Value::Timestamp(ts) => AvroValue::Long(ts.timestamp_micros()),
        Value::List(items) => AvroValue::Array(items.iter().map(to_avro).collect()),
        Value::Map(entries) => AvroValue::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), to_avro(v)))
                .collect(),
        ),
    }
}

pub struct AvroBackend {
    sink: FileSink,
    schema: AvroSchema,
    field_names: Vec<String>,
    codec: Codec,
    block_size: usize,
    marker: [u8; 16],
    metadata: Properties,
    flushes: u64,
}

impl AvroBackend {
    /// Parse the schema and codec. No file is touched.
    pub fn new(path: impl Into<PathBuf>, options: &AvroOptions) -> Result<Self> {
        let schema_json = options.schema_json()?;
        let schema = AvroSchema::parse_str(&schema_json)
            .map_err(|e| ExportError::configuration(format!("Invalid avro schema: {}", e)))?;
        let field_names = match &schema {
            AvroSchema::Record(record) => record.fields.iter().map(|f| f.name.clone()).collect(),
            _ => {
                return Err(ExportError::configuration(
                    "Avro schema must describe a record",
                ))
            }
        };

        let codec = codec(options.compression, options.compressionlevel)?;

        Ok(Self {
            sink: FileSink::new(Format::Avro, path),
            schema,
            field_names,
            codec,
            block_size: options.syncinterval,
            marker: sync_marker(options.syncmarker.as_deref())?,
            metadata: options.metadata.clone(),
            flushes: 0,
        })
    }

    /// Record field names, in schema order
    pub fn schema_columns(&self) -> Vec<String> {
        self.field_names.clone()
    }

    fn write_error(e: apache_avro::Error) -> ExportError {
        ExportError::backend_write(Format::Avro, e.to_string())
    }

    fn encode(&self, record: &Record) -> Result<AvroValue> {
        let fields: HashMap<String, AvroValue> = record
            .iter()
            .map(|(name, value)| (name.to_string(), to_avro(value)))
            .collect();
        AvroValue::Map(fields)
            .resolve(&self.schema)
            .map_err(|e| self.encoding_error(record, e))
    }

    // Resolve field by field to name the culprit
    fn encoding_error(&self, record: &Record, err: apache_avro::Error) -> ExportError {
        if let AvroSchema::Record(schema) = &self.schema {
            for field in &schema.fields {
                let value = record.get(&field.name).map(to_avro).unwrap_or(AvroValue::Null);
                if value.resolve(&field.schema).is_err() {
                    return ExportError::encoding(field.name.clone(), err.to_string());
                }
            }
        }
        ExportError::encoding("<record>", err.to_string())
    }

    /// Writer for the first flush: header, metadata and the configured marker
    fn header_writer(&self, file: std::fs::File) -> Result<AvroWriter<'_, std::fs::File>> {
        let mut writer = AvroWriter::builder()
            .schema(&self.schema)
            .writer(file)
            .codec(self.codec)
            .block_size(self.block_size)
            .marker(self.marker)
            .build();
        for (key, value) in &self.metadata {
            writer
                .add_user_metadata(key.clone(), value.as_bytes())
                .map_err(Self::write_error)?;
        }
        Ok(writer)
    }
}

impl Backend for AvroBackend {
    fn format(&self) -> Format {
        Format::Avro
    }

    fn start(&mut self) -> Result<()> {
        self.sink.open()
    }

    fn write_batch(&mut self, batch: Batch<'_>) -> Result<()> {
        let values = batch
            .records
            .iter()
            .map(|record| self.encode(record))
            .collect::<Result<Vec<_>>>()?;

        let mut writer = if self.flushes == 0 {
            let file = self.sink.take()?;
            info!(
                path = %self.sink.path().display(),
                codec = codec_name_of(self.codec),
                "Created Avro container"
            );
            self.header_writer(file)?
        } else {
            let file = self.sink.reopen_append()?;
            debug!(path = %self.sink.path().display(), "Reopened Avro container for append");
            AvroWriter::append_to_with_codec(&self.schema, file, self.codec, self.marker)
        };

        for value in values {
            writer.append(value).map_err(Self::write_error)?;
        }
        let file = writer.into_inner().map_err(Self::write_error)?;
        self.sink.sync(file)?;
        self.flushes += 1;
        Ok(())
    }

    fn finish(&mut self, summary: &ExportSummary) -> Result<()> {
        if self.flushes == 0 {
            // Header-only container so readers see a valid empty file
            let file = self.sink.take()?;
            let writer = self.header_writer(file)?;
            let file = writer.into_inner().map_err(Self::write_error)?;
            self.sink.sync(file)?;
        }
        self.sink.close()?;

        info!(
            path = %self.sink.path().display(),
            records = summary.records_exported,
            flushes = summary.batches_flushed,
            "Closed Avro file"
        );
        Ok(())
    }
}

fn codec_name_of(codec: Codec) -> &'static str {
    codec.into()
}
