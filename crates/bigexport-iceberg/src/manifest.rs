//! Iceberg manifest file generation
//!
//! Avro manifests and manifest lists in the format version 2 layout. Maps
//! with int keys are written as arrays of key/value records, as Avro maps
//! only allow string keys.
//! Based on Iceberg Table Spec v2: <https://iceberg.apache.org/spec/#manifests>

use crate::path::{catalog_path, to_local_path};
use crate::types::{DataFile, Schema};
use anyhow::{anyhow, Context, Result};
use apache_avro::{types::Value as AvroValue, Reader as AvroReader, Schema as AvroSchema, Writer as AvroWriter};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use uuid::Uuid;

const MANIFEST_ENTRY_SCHEMA: &str = r#"{
  "type": "record",
  "name": "manifest_entry",
  "fields": [
    {"name": "status", "type": "int", "field-id": 0},
    {"name": "snapshot_id", "type": ["null", "long"], "default": null, "field-id": 1},
    {"name": "sequence_number", "type": ["null", "long"], "default": null, "field-id": 3},
    {"name": "file_sequence_number", "type": ["null", "long"], "default": null, "field-id": 4},
    {"name": "data_file", "field-id": 2, "type": {
      "type": "record",
      "name": "r2",
      "fields": [
        {"name": "content", "type": "int", "field-id": 134},
        {"name": "file_path", "type": "string", "field-id": 100},
        {"name": "file_format", "type": "string", "field-id": 101},
        {"name": "partition", "type": {"type": "record", "name": "r102", "fields": []}, "field-id": 102},
        {"name": "record_count", "type": "long", "field-id": 103},
        {"name": "file_size_in_bytes", "type": "long", "field-id": 104},
        {"name": "column_sizes", "default": null, "field-id": 108, "type": ["null", {"type": "array", "logicalType": "map", "items": {
          "type": "record", "name": "k117_v118", "fields": [
            {"name": "key", "type": "int", "field-id": 117},
            {"name": "value", "type": "long", "field-id": 118}]}}]},
        {"name": "value_counts", "default": null, "field-id": 109, "type": ["null", {"type": "array", "logicalType": "map", "items": {
          "type": "record", "name": "k119_v120", "fields": [
            {"name": "key", "type": "int", "field-id": 119},
            {"name": "value", "type": "long", "field-id": 120}]}}]},
        {"name": "null_value_counts", "default": null, "field-id": 110, "type": ["null", {"type": "array", "logicalType": "map", "items": {
          "type": "record", "name": "k121_v122", "fields": [
            {"name": "key", "type": "int", "field-id": 121},
            {"name": "value", "type": "long", "field-id": 122}]}}]},
        {"name": "nan_value_counts", "default": null, "field-id": 137, "type": ["null", {"type": "array", "logicalType": "map", "items": {
          "type": "record", "name": "k138_v139", "fields": [
            {"name": "key", "type": "int", "field-id": 138},
            {"name": "value", "type": "long", "field-id": 139}]}}]},
        {"name": "lower_bounds", "default": null, "field-id": 125, "type": ["null", {"type": "array", "logicalType": "map", "items": {
          "type": "record", "name": "k126_v127", "fields": [
            {"name": "key", "type": "int", "field-id": 126},
            {"name": "value", "type": "bytes", "field-id": 127}]}}]},
        {"name": "upper_bounds", "default": null, "field-id": 128, "type": ["null", {"type": "array", "logicalType": "map", "items": {
          "type": "record", "name": "k129_v130", "fields": [
            {"name": "key", "type": "int", "field-id": 129},
            {"name": "value", "type": "bytes", "field-id": 130}]}}]},
        {"name": "split_offsets", "default": null, "field-id": 132, "type": ["null", {"type": "array", "items": "long", "element-id": 133}]},
        {"name": "sort_order_id", "type": ["null", "int"], "default": null, "field-id": 140}
      ]
    }}
  ]
}"#;

const MANIFEST_LIST_SCHEMA: &str = r#"{
  "type": "record",
  "name": "manifest_file",
  "fields": [
    {"name": "manifest_path", "type": "string", "field-id": 500},
    {"name": "manifest_length", "type": "long", "field-id": 501},
    {"name": "partition_spec_id", "type": "int", "field-id": 502},
    {"name": "content", "type": "int", "field-id": 517},
    {"name": "sequence_number", "type": "long", "field-id": 515},
    {"name": "min_sequence_number", "type": "long", "field-id": 516},
    {"name": "added_snapshot_id", "type": "long", "field-id": 503},
    {"name": "added_files_count", "type": "int", "field-id": 504},
    {"name": "existing_files_count", "type": "int", "field-id": 505},
    {"name": "deleted_files_count", "type": "int", "field-id": 506},
    {"name": "added_rows_count", "type": "long", "field-id": 512},
    {"name": "existing_rows_count", "type": "long", "field-id": 513},
    {"name": "deleted_rows_count", "type": "long", "field-id": 514}
  ]
}"#;

/// Manifest entry status for files added by the snapshot
const STATUS_ADDED: i32 = 1;

/// One manifest-list row
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestFile {
    pub manifest_path: String,
    pub manifest_length: i64,
    pub partition_spec_id: i32,
    pub content: i32,
    pub sequence_number: i64,
    pub min_sequence_number: i64,
    pub added_snapshot_id: i64,
    pub added_files_count: i32,
    pub existing_files_count: i32,
    pub deleted_files_count: i32,
    pub added_rows_count: i64,
    pub existing_rows_count: i64,
    pub deleted_rows_count: i64,
}

impl ManifestFile {
    fn to_avro(&self) -> AvroValue {
        AvroValue::Record(vec![
            ("manifest_path".to_string(), AvroValue::String(self.manifest_path.clone())),
            ("manifest_length".to_string(), AvroValue::Long(self.manifest_length)),
            ("partition_spec_id".to_string(), AvroValue::Int(self.partition_spec_id)),
            ("content".to_string(), AvroValue::Int(self.content)),
            ("sequence_number".to_string(), AvroValue::Long(self.sequence_number)),
            ("min_sequence_number".to_string(), AvroValue::Long(self.min_sequence_number)),
            ("added_snapshot_id".to_string(), AvroValue::Long(self.added_snapshot_id)),
            ("added_files_count".to_string(), AvroValue::Int(self.added_files_count)),
            ("existing_files_count".to_string(), AvroValue::Int(self.existing_files_count)),
            ("deleted_files_count".to_string(), AvroValue::Int(self.deleted_files_count)),
            ("added_rows_count".to_string(), AvroValue::Long(self.added_rows_count)),
            ("existing_rows_count".to_string(), AvroValue::Long(self.existing_rows_count)),
            ("deleted_rows_count".to_string(), AvroValue::Long(self.deleted_rows_count)),
        ])
    }
}

fn write_file(location: &str, bytes: &[u8]) -> Result<()> {
    let path = to_local_path(location)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn optional<T>(values: &BTreeMap<i32, T>, to_value: impl Fn(&T) -> AvroValue) -> AvroValue {
    if values.is_empty() {
        return AvroValue::Union(0, Box::new(AvroValue::Null));
    }
    let entries = values
        .iter()
        .map(|(key, value)| {
            AvroValue::Record(vec![
                ("key".to_string(), AvroValue::Int(*key)),
                ("value".to_string(), to_value(value)),
            ])
        })
        .collect();
    AvroValue::Union(1, Box::new(AvroValue::Array(entries)))
}

/// Writes Iceberg manifest files in Avro format
pub struct ManifestWriter;

impl ManifestWriter {
    /// Write a manifest of added data files under `<table>/metadata/`
    pub fn write(
        table_location: &str,
        table_schema: &Schema,
        snapshot_id: i64,
        sequence_number: i64,
        data_files: &[DataFile],
    ) -> Result<ManifestFile> {
        let manifest_path = catalog_path(
            table_location,
            &format!("metadata/{}-m0.avro", Uuid::new_v4()),
        );

        let schema = AvroSchema::parse_str(MANIFEST_ENTRY_SCHEMA)
            .context("failed to parse manifest entry schema")?;
        let mut writer = AvroWriter::new(&schema, Vec::new());
        let metadata = [
            ("schema", serde_json::to_string(table_schema)?),
            ("schema-id", table_schema.schema_id.to_string()),
            ("partition-spec", "[]".to_string()),
            ("partition-spec-id", "0".to_string()),
            ("format-version", "2".to_string()),
            ("content", "data".to_string()),
        ];
        for (key, value) in metadata {
            writer
                .add_user_metadata(key.to_string(), value)
                .context("failed to add manifest metadata")?;
        }

        for data_file in data_files {
            writer
                .append(Self::data_file_to_avro(data_file, snapshot_id, sequence_number))
                .context("failed to append manifest entry")?;
        }
        let bytes = writer.into_inner().context("failed to finalize manifest")?;
        write_file(&manifest_path, &bytes)?;

        Ok(ManifestFile {
            manifest_path,
            manifest_length: bytes.len() as i64,
            partition_spec_id: 0,
            content: 0,
            sequence_number,
            min_sequence_number: sequence_number,
            added_snapshot_id: snapshot_id,
            added_files_count: data_files.len() as i32,
            existing_files_count: 0,
            deleted_files_count: 0,
            added_rows_count: data_files.iter().map(|f| f.record_count as i64).sum(),
            existing_rows_count: 0,
            deleted_rows_count: 0,
        })
    }

    fn data_file_to_avro(data_file: &DataFile, snapshot_id: i64, sequence_number: i64) -> AvroValue {
        let long = |v: &u64| AvroValue::Long(*v as i64);
        let bytes = |v: &Vec<u8>| AvroValue::Bytes(v.clone());

        let split_offsets = if data_file.split_offsets.is_empty() {
            AvroValue::Union(0, Box::new(AvroValue::Null))
        } else {
            AvroValue::Union(
                1,
                Box::new(AvroValue::Array(
                    data_file.split_offsets.iter().map(|o| AvroValue::Long(*o)).collect(),
                )),
            )
        };
        let sort_order_id = match data_file.sort_order_id {
            Some(id) => AvroValue::Union(1, Box::new(AvroValue::Int(id))),
            None => AvroValue::Union(0, Box::new(AvroValue::Null)),
        };

        let data_file_record = AvroValue::Record(vec![
            ("content".to_string(), AvroValue::Int(data_file.content.id())),
            ("file_path".to_string(), AvroValue::String(data_file.file_path.clone())),
            (
                "file_format".to_string(),
                AvroValue::String(data_file.file_format.as_str().to_string()),
            ),
            ("partition".to_string(), AvroValue::Record(Vec::new())),
            ("record_count".to_string(), AvroValue::Long(data_file.record_count as i64)),
            (
                "file_size_in_bytes".to_string(),
                AvroValue::Long(data_file.file_size_in_bytes as i64),
            ),
            ("column_sizes".to_string(), optional(&data_file.column_sizes, long)),
            ("value_counts".to_string(), optional(&data_file.value_counts, long)),
            ("null_value_counts".to_string(), optional(&data_file.null_value_counts, long)),
            // Not tracked for Parquet
            ("nan_value_counts".to_string(), AvroValue::Union(0, Box::new(AvroValue::Null))),
            ("lower_bounds".to_string(), optional(&data_file.lower_bounds, bytes)),
            ("upper_bounds".to_string(), optional(&data_file.upper_bounds, bytes)),
            ("split_offsets".to_string(), split_offsets),
            ("sort_order_id".to_string(), sort_order_id),
        ]);

        AvroValue::Record(vec![
            ("status".to_string(), AvroValue::Int(STATUS_ADDED)),
            (
                "snapshot_id".to_string(),
                AvroValue::Union(1, Box::new(AvroValue::Long(snapshot_id))),
            ),
            (
                "sequence_number".to_string(),
                AvroValue::Union(1, Box::new(AvroValue::Long(sequence_number))),
            ),
            (
                "file_sequence_number".to_string(),
                AvroValue::Union(1, Box::new(AvroValue::Long(sequence_number))),
            ),
            ("data_file".to_string(), data_file_record),
        ])
    }
}

/// Writes Iceberg manifest-list files in Avro format
pub struct ManifestListWriter;

impl ManifestListWriter {
    /// Write the manifest list of a new snapshot: the parent's manifests
    /// followed by `added`.
    pub fn write(
        table_location: &str,
        snapshot_id: i64,
        parent_snapshot_id: Option<i64>,
        sequence_number: i64,
        parent_manifests: &[ManifestFile],
        added: &ManifestFile,
    ) -> Result<String> {
        let manifest_list_path = catalog_path(
            table_location,
            &format!("metadata/snap-{}-1-{}.avro", snapshot_id, Uuid::new_v4()),
        );

        let schema = AvroSchema::parse_str(MANIFEST_LIST_SCHEMA)
            .context("failed to parse manifest-list schema")?;
        let mut writer = AvroWriter::new(&schema, Vec::new());
        let parent = parent_snapshot_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "null".to_string());
        let metadata = [
            ("snapshot-id", snapshot_id.to_string()),
            ("parent-snapshot-id", parent),
            ("sequence-number", sequence_number.to_string()),
            ("format-version", "2".to_string()),
        ];
        for (key, value) in metadata {
            writer
                .add_user_metadata(key.to_string(), value)
                .context("failed to add manifest-list metadata")?;
        }

        for manifest in parent_manifests.iter().chain(std::iter::once(added)) {
            writer
                .append(manifest.to_avro())
                .context("failed to append manifest-list entry")?;
        }
        let bytes = writer
            .into_inner()
            .context("failed to finalize manifest-list")?;
        write_file(&manifest_list_path, &bytes)?;

        Ok(manifest_list_path)
    }

    /// Read back the manifests listed by a snapshot
    pub fn read(manifest_list: &str) -> Result<Vec<ManifestFile>> {
        let path = to_local_path(manifest_list)?;
        let file = fs::File::open(&path)
            .with_context(|| format!("failed to open manifest list {}", path.display()))?;
        let reader = AvroReader::new(file).context("failed to read manifest list")?;
        reader
            .map(|value| {
                let value = value.context("failed to decode manifest-list entry")?;
                apache_avro::from_value::<ManifestFile>(&value)
                    .map_err(|e| anyhow!("invalid manifest-list entry: {}", e))
            })
            .collect()
    }
}
