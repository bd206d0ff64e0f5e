//! Iceberg DataFile types
//!
//! Descriptor of one data file added by a snapshot, written into manifests.
//! Based on Iceberg Table Spec v2: <https://iceberg.apache.org/spec/#manifests>

use std::collections::BTreeMap;

/// Iceberg data file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFileFormat {
    Avro,
    Orc,
    Parquet,
}

impl DataFileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFileFormat::Avro => "AVRO",
            DataFileFormat::Orc => "ORC",
            DataFileFormat::Parquet => "PARQUET",
        }
    }
}

/// Iceberg data content type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataContentType {
    /// Regular data records
    Data,
    PositionDeletes,
    EqualityDeletes,
}

impl DataContentType {
    /// Manifest encoding of the content type
    pub fn id(&self) -> i32 {
        match self {
            DataContentType::Data => 0,
            DataContentType::PositionDeletes => 1,
            DataContentType::EqualityDeletes => 2,
        }
    }
}

/// Iceberg DataFile descriptor
///
/// Statistics are keyed by Iceberg field ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    pub content: DataContentType,
    /// Location-style path of the file (same scheme as the table location)
    pub file_path: String,
    pub file_format: DataFileFormat,
    pub record_count: u64,
    pub file_size_in_bytes: u64,
    pub column_sizes: BTreeMap<i32, u64>,
    pub value_counts: BTreeMap<i32, u64>,
    pub null_value_counts: BTreeMap<i32, u64>,
    pub lower_bounds: BTreeMap<i32, Vec<u8>>,
    pub upper_bounds: BTreeMap<i32, Vec<u8>>,
    /// Row group start offsets
    pub split_offsets: Vec<i64>,
    pub sort_order_id: Option<i32>,
}

impl DataFile {
    pub fn builder() -> DataFileBuilder {
        DataFileBuilder::default()
    }
}

/// Builder for constructing DataFile instances
#[derive(Debug, Default)]
pub struct DataFileBuilder {
    content: Option<DataContentType>,
    file_path: Option<String>,
    file_format: Option<DataFileFormat>,
    record_count: Option<u64>,
    file_size_in_bytes: Option<u64>,
    column_sizes: BTreeMap<i32, u64>,
    value_counts: BTreeMap<i32, u64>,
    null_value_counts: BTreeMap<i32, u64>,
    lower_bounds: BTreeMap<i32, Vec<u8>>,
    upper_bounds: BTreeMap<i32, Vec<u8>>,
    split_offsets: Vec<i64>,
    sort_order_id: Option<i32>,
}

impl DataFileBuilder {
    pub fn content(mut self, content: DataContentType) -> Self {
        self.content = Some(content);
        self
    }

    pub fn file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn file_format(mut self, format: DataFileFormat) -> Self {
        self.file_format = Some(format);
        self
    }

    pub fn record_count(mut self, count: u64) -> Self {
        self.record_count = Some(count);
        self
    }

    pub fn file_size_in_bytes(mut self, size: u64) -> Self {
        self.file_size_in_bytes = Some(size);
        self
    }

    pub fn column_sizes(mut self, sizes: BTreeMap<i32, u64>) -> Self {
        self.column_sizes = sizes;
        self
    }

    pub fn value_counts(mut self, counts: BTreeMap<i32, u64>) -> Self {
        self.value_counts = counts;
        self
    }

    pub fn null_value_counts(mut self, counts: BTreeMap<i32, u64>) -> Self {
        self.null_value_counts = counts;
        self
    }

    pub fn lower_bounds(mut self, bounds: BTreeMap<i32, Vec<u8>>) -> Self {
        self.lower_bounds = bounds;
        self
    }

    pub fn upper_bounds(mut self, bounds: BTreeMap<i32, Vec<u8>>) -> Self {
        self.upper_bounds = bounds;
        self
    }

    pub fn split_offsets(mut self, offsets: Vec<i64>) -> Self {
        self.split_offsets = offsets;
        self
    }

    pub fn sort_order_id(mut self, id: i32) -> Self {
        self.sort_order_id = Some(id);
        self
    }

    pub fn build(self) -> anyhow::Result<DataFile> {
        Ok(DataFile {
            content: self
                .content
                .ok_or_else(|| anyhow::anyhow!("content is required"))?,
            file_path: self
                .file_path
                .ok_or_else(|| anyhow::anyhow!("file_path is required"))?,
            file_format: self
                .file_format
                .ok_or_else(|| anyhow::anyhow!("file_format is required"))?,
            record_count: self
                .record_count
                .ok_or_else(|| anyhow::anyhow!("record_count is required"))?,
            file_size_in_bytes: self
                .file_size_in_bytes
                .ok_or_else(|| anyhow::anyhow!("file_size_in_bytes is required"))?,
            column_sizes: self.column_sizes,
            value_counts: self.value_counts,
            null_value_counts: self.null_value_counts,
            lower_bounds: self.lower_bounds,
            upper_bounds: self.upper_bounds,
            split_offsets: self.split_offsets,
            sort_order_id: self.sort_order_id,
        })
    }
}
