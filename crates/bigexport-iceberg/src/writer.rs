//! Append one Arrow batch to a table as a new snapshot
//!
//! Writes the Parquet data file, its manifest and the snapshot's manifest
//! list. The caller commits the returned snapshot through its catalog.

use crate::datafile_convert::build_data_file;
use crate::manifest::{ManifestListWriter, ManifestWriter};
use crate::path::{catalog_path, to_local_path};
use crate::types::{Snapshot, TableMetadata};
use anyhow::{anyhow, Context, Result};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::Utc;
use parquet::arrow::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::collections::BTreeMap;
use std::fs;
use tracing::{debug, info};
use uuid::Uuid;

pub const COMPRESSION_CODEC: &str = "write.parquet.compression-codec";
pub const COMPRESSION_LEVEL: &str = "write.parquet.compression-level";

/// Parquet properties from the table's `write.parquet.*` properties.
///
/// Without a codec property files are zstd compressed.
pub fn writer_properties(properties: &BTreeMap<String, String>) -> Result<WriterProperties> {
    let level = properties
        .get(COMPRESSION_LEVEL)
        .map(|l| {
            l.parse::<i32>()
                .with_context(|| format!("invalid {}: {}", COMPRESSION_LEVEL, l))
        })
        .transpose()?;
    let unsigned = |l: i32| {
        u32::try_from(l).map_err(|_| anyhow!("invalid {}: {}", COMPRESSION_LEVEL, l))
    };

    let codec = properties
        .get(COMPRESSION_CODEC)
        .map(|c| c.to_ascii_lowercase())
        .unwrap_or_else(|| "zstd".to_string());
    let compression = match codec.as_str() {
        "uncompressed" | "none" => Compression::UNCOMPRESSED,
        "snappy" => Compression::SNAPPY,
        "lz4" => Compression::LZ4_RAW,
        "gzip" => Compression::GZIP(match level {
            Some(l) => GzipLevel::try_new(unsigned(l)?)?,
            None => GzipLevel::default(),
        }),
        "brotli" => Compression::BROTLI(match level {
            Some(l) => BrotliLevel::try_new(unsigned(l)?)?,
            None => BrotliLevel::default(),
        }),
        "zstd" => Compression::ZSTD(match level {
            Some(l) => ZstdLevel::try_new(l)?,
            None => ZstdLevel::default(),
        }),
        other => return Err(anyhow!("unsupported {}: {}", COMPRESSION_CODEC, other)),
    };

    Ok(WriterProperties::builder()
        .set_compression(compression)
        .build())
}

fn encode_parquet(batch: &RecordBatch, props: WriterProperties) -> Result<Bytes> {
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))
        .context("failed to create parquet writer")?;
    writer.write(batch).context("failed to encode record batch to parquet")?;
    writer.close().context("failed to finalize parquet file")?;
    Ok(Bytes::from(buffer))
}

/// Random positive snapshot id
fn new_snapshot_id() -> i64 {
    let (high, low) = Uuid::new_v4().as_u64_pair();
    ((high ^ low) & i64::MAX as u64) as i64
}

/// Write `batch` as a data file and build the snapshot adding it.
///
/// The snapshot's parent is the current head of `main`; its manifest list
/// keeps every manifest of the parent.
pub fn write_snapshot(metadata: &TableMetadata, batch: &RecordBatch) -> Result<Snapshot> {
    let schema = metadata
        .current_schema()
        .ok_or_else(|| anyhow!("table metadata has no current schema"))?;

    let file_path = catalog_path(
        &metadata.location,
        &format!("data/{}.parquet", Uuid::new_v4()),
    );
    let local_path = to_local_path(&file_path)?;
    if let Some(parent) = local_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let encoded = encode_parquet(batch, writer_properties(&metadata.properties)?)?;
    let file_size = encoded.len() as u64;
    fs::write(&local_path, &encoded)
        .with_context(|| format!("failed to write {}", local_path.display()))?;
    let reader = SerializedFileReader::new(encoded).context("failed to read back parquet metadata")?;
    let data_file = build_data_file(&file_path, file_size, reader.metadata(), schema)?;
    debug!(path = %file_path, rows = data_file.record_count, file_size, "Wrote iceberg data file");

    let snapshot_id = new_snapshot_id();
    let sequence_number = metadata.next_sequence_number();
    let parent = metadata
        .main_snapshot_id()
        .and_then(|id| metadata.snapshots.iter().find(|s| s.snapshot_id == id));

    let manifest = ManifestWriter::write(
        &metadata.location,
        schema,
        snapshot_id,
        sequence_number,
        std::slice::from_ref(&data_file),
    )?;
    let parent_manifests = match parent {
        Some(p) => ManifestListWriter::read(&p.manifest_list)?,
        None => Vec::new(),
    };
    let manifest_list = ManifestListWriter::write(
        &metadata.location,
        snapshot_id,
        parent.map(|p| p.snapshot_id),
        sequence_number,
        &parent_manifests,
        &manifest,
    )?;

    let previous = |key: &str| parent.map(|p| p.summary_count(key)).unwrap_or(0);
    let summary = BTreeMap::from([
        ("operation".to_string(), "append".to_string()),
        ("added-data-files".to_string(), "1".to_string()),
        ("added-records".to_string(), data_file.record_count.to_string()),
        ("added-files-size".to_string(), file_size.to_string()),
        (
            "total-data-files".to_string(),
            (previous("total-data-files") + 1).to_string(),
        ),
        (
            "total-records".to_string(),
            (previous("total-records") + data_file.record_count).to_string(),
        ),
        (
            "total-files-size".to_string(),
            (previous("total-files-size") + file_size).to_string(),
        ),
    ]);

    info!(
        snapshot_id,
        sequence_number,
        records = data_file.record_count,
        manifests = parent_manifests.len() + 1,
        "Prepared iceberg snapshot"
    );

    Ok(Snapshot {
        snapshot_id,
        parent_snapshot_id: parent.map(|p| p.snapshot_id),
        sequence_number,
        timestamp_ms: Utc::now().timestamp_millis(),
        manifest_list,
        summary,
        schema_id: Some(schema.schema_id),
    })
}
