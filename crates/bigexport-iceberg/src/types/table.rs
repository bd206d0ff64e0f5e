//! Iceberg table metadata types
//!
//! Format version 2 table metadata, snapshots and snapshot references.
//! Based on Iceberg Table Spec v2: <https://iceberg.apache.org/spec/#table-metadata>

use super::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Branch every append commits to
pub const MAIN_BRANCH: &str = "main";

/// Iceberg table metadata
///
/// Written as `vN.metadata.json` by the filesystem catalog and returned by the
/// REST catalog when loading a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TableMetadata {
    pub format_version: i32,
    pub table_uuid: String,
    /// Base location for the table's metadata and data files
    pub location: String,
    #[serde(default)]
    pub last_sequence_number: i64,
    #[serde(default)]
    pub last_updated_ms: i64,
    #[serde(default)]
    pub last_column_id: i32,
    pub schemas: Vec<Schema>,
    pub current_schema_id: i32,
    #[serde(default)]
    pub partition_specs: Vec<serde_json::Value>,
    #[serde(default)]
    pub default_spec_id: i32,
    #[serde(default)]
    pub last_partition_id: i32,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Some writers use -1 for "no snapshot"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_snapshot_id: Option<i64>,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
    #[serde(default)]
    pub snapshot_log: Vec<SnapshotLogEntry>,
    #[serde(default)]
    pub metadata_log: Vec<MetadataLogEntry>,
    #[serde(default)]
    pub sort_orders: Vec<serde_json::Value>,
    #[serde(default)]
    pub default_sort_order_id: i32,
    #[serde(default)]
    pub refs: BTreeMap<String, SnapshotReference>,
}

impl TableMetadata {
    /// Metadata for a new, unpartitioned and unsorted table
    pub fn new(
        location: impl Into<String>,
        schema: Schema,
        properties: BTreeMap<String, String>,
        now_ms: i64,
    ) -> Self {
        let schema = Schema {
            schema_id: 0,
            ..schema
        };
        Self {
            format_version: 2,
            table_uuid: uuid::Uuid::new_v4().to_string(),
            location: location.into(),
            last_sequence_number: 0,
            last_updated_ms: now_ms,
            last_column_id: schema.highest_field_id(),
            current_schema_id: schema.schema_id,
            schemas: vec![schema],
            partition_specs: vec![serde_json::json!({"spec-id": 0, "fields": []})],
            default_spec_id: 0,
            last_partition_id: 999,
            properties,
            current_snapshot_id: None,
            snapshots: Vec::new(),
            snapshot_log: Vec::new(),
            metadata_log: Vec::new(),
            sort_orders: vec![serde_json::json!({"order-id": 0, "fields": []})],
            default_sort_order_id: 0,
            refs: BTreeMap::new(),
        }
    }

    /// Get the current schema
    pub fn current_schema(&self) -> Option<&Schema> {
        self.schemas
            .iter()
            .find(|s| s.schema_id == self.current_schema_id)
    }

    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        let id = self.current_snapshot_id.filter(|id| *id >= 0)?;
        self.snapshots.iter().find(|s| s.snapshot_id == id)
    }

    /// Snapshot the `main` branch points at, for optimistic commits
    pub fn main_snapshot_id(&self) -> Option<i64> {
        self.refs
            .get(MAIN_BRANCH)
            .map(|r| r.snapshot_id)
            .or_else(|| self.current_snapshot_id.filter(|id| *id >= 0))
    }

    pub fn next_sequence_number(&self) -> i64 {
        self.last_sequence_number + 1
    }

    /// Copy of this metadata with `snapshot` added as the head of `main`
    pub fn with_snapshot(&self, snapshot: Snapshot, previous_file: Option<MetadataLogEntry>) -> Self {
        let mut next = self.clone();
        next.last_sequence_number = snapshot.sequence_number;
        next.last_updated_ms = snapshot.timestamp_ms;
        next.current_snapshot_id = Some(snapshot.snapshot_id);
        next.snapshot_log.push(SnapshotLogEntry {
            snapshot_id: snapshot.snapshot_id,
            timestamp_ms: snapshot.timestamp_ms,
        });
        next.refs.insert(
            MAIN_BRANCH.to_string(),
            SnapshotReference {
                snapshot_id: snapshot.snapshot_id,
                ref_type: SnapshotRefType::Branch,
            },
        );
        next.metadata_log.extend(previous_file);
        next.snapshots.push(snapshot);
        next
    }
}

/// Snapshot of the table contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Snapshot {
    pub snapshot_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_snapshot_id: Option<i64>,
    #[serde(default)]
    pub sequence_number: i64,
    pub timestamp_ms: i64,
    /// Avro manifest list of this snapshot
    pub manifest_list: String,
    /// Includes `operation`
    #[serde(default)]
    pub summary: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<i32>,
}

impl Snapshot {
    pub fn operation(&self) -> Option<&str> {
        self.summary.get("operation").map(String::as_str)
    }

    /// Numeric summary property, 0 when absent
    pub fn summary_count(&self, key: &str) -> u64 {
        self.summary
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SnapshotLogEntry {
    pub snapshot_id: i64,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MetadataLogEntry {
    pub metadata_file: String,
    pub timestamp_ms: i64,
}

/// Named reference to a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SnapshotReference {
    pub snapshot_id: i64,
    #[serde(rename = "type")]
    pub ref_type: SnapshotRefType,
}

/// Type of snapshot reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotRefType {
    Branch,
    Tag,
}

/// Response from loading or creating a table via REST API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoadTableResponse {
    /// Absent for staged tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_location: Option<String>,
    pub metadata: TableMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<HashMap<String, String>>,
}

/// Response from catalog config endpoint (GET /v1/config)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogConfig {
    #[serde(default)]
    pub defaults: HashMap<String, String>,
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

impl CatalogConfig {
    /// Override wins over default
    pub fn get(&self, key: &str) -> Option<&str> {
        self.overrides
            .get(key)
            .or_else(|| self.defaults.get(key))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::schema::{NestedField, PrimitiveType};

    fn metadata() -> TableMetadata {
        let schema = Schema::new(
            7,
            vec![NestedField::optional(1, "text", PrimitiveType::String.into())],
        );
        TableMetadata::new("/warehouse/ns/quotes", schema, BTreeMap::new(), 1_000)
    }

    fn snapshot(id: i64, sequence_number: i64) -> Snapshot {
        Snapshot {
            snapshot_id: id,
            parent_snapshot_id: None,
            sequence_number,
            timestamp_ms: 2_000 + sequence_number,
            manifest_list: format!("/warehouse/ns/quotes/metadata/snap-{}.avro", id),
            summary: BTreeMap::from([("operation".to_string(), "append".to_string())]),
            schema_id: Some(0),
        }
    }

    #[test]
    fn test_new_table_metadata() {
        let metadata = metadata();
        assert_eq!(metadata.format_version, 2);
        assert_eq!(metadata.current_schema().unwrap().schema_id, 0);
        assert_eq!(metadata.last_column_id, 1);
        assert!(metadata.current_snapshot().is_none());
        assert_eq!(metadata.main_snapshot_id(), None);
        assert_eq!(metadata.next_sequence_number(), 1);
    }

    #[test]
    fn test_with_snapshot_moves_main() {
        let first = metadata().with_snapshot(snapshot(11, 1), None);
        let second = first.with_snapshot(
            snapshot(22, 2),
            Some(MetadataLogEntry {
                metadata_file: "v2.metadata.json".to_string(),
                timestamp_ms: 5,
            }),
        );

        assert_eq!(second.current_snapshot().unwrap().snapshot_id, 22);
        assert_eq!(second.main_snapshot_id(), Some(22));
        assert_eq!(second.last_sequence_number, 2);
        assert_eq!(second.snapshots.len(), 2);
        assert_eq!(second.snapshot_log.len(), 2);
        assert_eq!(second.metadata_log.len(), 1);
        assert_eq!(second.current_snapshot().unwrap().operation(), Some("append"));
    }

    #[test]
    fn test_metadata_serialization() {
        let metadata = metadata().with_snapshot(snapshot(11, 1), None);
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["refs"]["main"]["type"], "branch");
        assert_eq!(json["current-snapshot-id"], 11);
        assert_eq!(json["snapshots"][0]["summary"]["operation"], "append");

        let deserialized: TableMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(metadata, deserialized);
    }

    #[test]
    fn test_negative_snapshot_id_means_none() {
        let mut metadata = metadata();
        metadata.current_snapshot_id = Some(-1);
        assert!(metadata.current_snapshot().is_none());
        assert_eq!(metadata.main_snapshot_id(), None);
    }

    #[test]
    fn test_catalog_config_override_wins() {
        let config: CatalogConfig = serde_json::from_str(
            r#"{"defaults":{"prefix":"a","clients":"4"},"overrides":{"prefix":"b"}}"#,
        )
        .unwrap();
        assert_eq!(config.get("prefix"), Some("b"));
        assert_eq!(config.get("clients"), Some("4"));
        assert_eq!(config.get("missing"), None);
    }
}
