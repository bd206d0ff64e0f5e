//! Iceberg REST API request types
//!
//! Based on: <https://iceberg.apache.org/docs/latest/rest-api/>

use crate::types::{Schema, Snapshot, SnapshotRefType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// POST /v1/{prefix}/namespaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNamespaceRequest {
    pub namespace: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// POST /v1/{prefix}/namespaces/{namespace}/tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CreateTableRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub schema: Schema,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub stage_create: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableIdentifier {
    pub namespace: Vec<String>,
    pub name: String,
}

/// POST /v1/{prefix}/namespaces/{namespace}/tables/{table}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitTableRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<TableIdentifier>,
    pub requirements: Vec<TableRequirement>,
    pub updates: Vec<TableUpdate>,
}

/// Condition the catalog checks before applying updates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TableRequirement {
    /// The ref must point at `snapshot_id`, or not exist when it is null
    #[serde(rename_all = "kebab-case")]
    AssertRefSnapshotId {
        #[serde(rename = "ref")]
        reference: String,
        snapshot_id: Option<i64>,
    },
}

/// A table update operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum TableUpdate {
    AddSnapshot { snapshot: Snapshot },
    #[serde(rename_all = "kebab-case")]
    SetSnapshotRef {
        /// Reference name (e.g., "main")
        ref_name: String,
        snapshot_id: i64,
        #[serde(rename = "type")]
        ref_type: SnapshotRefType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MAIN_BRANCH;

    fn snapshot() -> Snapshot {
        Snapshot {
            snapshot_id: 42,
            parent_snapshot_id: None,
            sequence_number: 1,
            timestamp_ms: 1_700_000_000_000,
            manifest_list: "file:///warehouse/ns/t/metadata/snap-42.avro".to_string(),
            summary: BTreeMap::from([("operation".to_string(), "append".to_string())]),
            schema_id: Some(0),
        }
    }

    #[test]
    fn test_commit_request_wire_format() {
        let request = CommitTableRequest {
            identifier: None,
            requirements: vec![TableRequirement::AssertRefSnapshotId {
                reference: MAIN_BRANCH.to_string(),
                snapshot_id: None,
            }],
            updates: vec![
                TableUpdate::AddSnapshot {
                    snapshot: snapshot(),
                },
                TableUpdate::SetSnapshotRef {
                    ref_name: MAIN_BRANCH.to_string(),
                    snapshot_id: 42,
                    ref_type: SnapshotRefType::Branch,
                },
            ],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["requirements"][0]["type"], "assert-ref-snapshot-id");
        assert_eq!(json["requirements"][0]["ref"], "main");
        assert!(json["requirements"][0]["snapshot-id"].is_null());
        assert_eq!(json["updates"][0]["action"], "add-snapshot");
        assert_eq!(json["updates"][0]["snapshot"]["snapshot-id"], 42);
        assert_eq!(json["updates"][1]["action"], "set-snapshot-ref");
        assert_eq!(json["updates"][1]["ref-name"], "main");
        assert_eq!(json["updates"][1]["type"], "branch");
        assert!(json.get("identifier").is_none());

        let deserialized: CommitTableRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request, deserialized);
    }

    #[test]
    fn test_create_table_request_skips_missing_location() {
        let request = CreateTableRequest {
            name: "quotes".to_string(),
            location: None,
            schema: Schema::new(0, Vec::new()),
            properties: BTreeMap::new(),
            stage_create: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("location").is_none());
        assert_eq!(json["stage-create"], false);
    }
}
