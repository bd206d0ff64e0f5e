//! Iceberg REST API response types
//!
//! Based on: https://iceberg.apache.org/docs/latest/rest-api/

use crate::types::TableMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response from committing table updates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommitTableResponse {
    /// Metadata location after the commit
    pub metadata_location: String,
    pub metadata: TableMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNamespaceResponse {
    pub namespace: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// Error body wrapper: `{"error": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorModel {
    pub error: ErrorResponse,
}

/// Error response from Iceberg REST API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,

    /// Exception name, e.g. `NoSuchTableException`
    #[serde(rename = "type")]
    pub error_type: String,

    pub code: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<String>>,
}
