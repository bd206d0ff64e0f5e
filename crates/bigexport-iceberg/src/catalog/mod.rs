//! Iceberg catalogs
//!
//! A catalog resolves namespaces and tables and commits new snapshots.
//! `FileCatalog` keeps table metadata next to the data on the local
//! filesystem, `RestCatalog` talks to an Iceberg REST catalog service.

mod filesystem;
mod rest;

pub use filesystem::FileCatalog;
pub use rest::RestCatalog;

use crate::types::{Schema, Snapshot, TableMetadata};
use crate::writer::write_snapshot;
use anyhow::{anyhow, Result};
use arrow::record_batch::RecordBatch;
use std::collections::BTreeMap;
use std::fmt;

/// Iceberg namespace identifier
///
/// Multi-level namespaces display dot-separated (e.g., "crawl.daily")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceIdent {
    inner: Vec<String>,
}

impl NamespaceIdent {
    /// Create a namespace from a list of parts
    pub fn from_vec(parts: Vec<String>) -> Result<Self> {
        if parts.is_empty() || parts.iter().any(|p| p.is_empty()) {
            return Err(anyhow!("Namespace cannot be empty"));
        }
        Ok(Self { inner: parts })
    }

    pub fn parts(&self) -> &[String] {
        &self.inner
    }
}

impl fmt::Display for NamespaceIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIdent {
    pub namespace: NamespaceIdent,
    pub name: String,
}

impl TableIdent {
    pub fn new(namespace: NamespaceIdent, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(anyhow!("Table name cannot be empty"));
        }
        Ok(Self { namespace, name })
    }
}

impl fmt::Display for TableIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// A loaded table and where its metadata lives
#[derive(Debug, Clone)]
pub struct Table {
    pub ident: TableIdent,
    pub metadata: TableMetadata,
    /// None for tables the catalog has not persisted a metadata file for
    pub metadata_location: Option<String>,
}

/// Parameters for creating a table
#[derive(Debug, Clone)]
pub struct TableCreation {
    pub schema: Schema,
    /// Catalog default when absent
    pub location: Option<String>,
    pub properties: BTreeMap<String, String>,
}

pub trait Catalog {
    /// Create the namespace unless it exists. Properties apply only on creation.
    fn create_namespace_if_not_exists(
        &self,
        namespace: &NamespaceIdent,
        properties: &BTreeMap<String, String>,
    ) -> Result<()>;

    fn load_table(&self, ident: &TableIdent) -> Result<Table>;

    /// Load the table, creating it from `creation` when it does not exist
    fn create_table_if_not_exists(&self, ident: &TableIdent, creation: TableCreation)
        -> Result<Table>;

    /// Make `snapshot` the head of the `main` branch.
    ///
    /// Fails when the table moved since it was loaded; `table` is updated in
    /// place on success.
    fn commit_snapshot(&self, table: &mut Table, snapshot: Snapshot) -> Result<()>;

    /// Append a batch as a new snapshot
    fn append(&self, table: &mut Table, batch: &RecordBatch) -> Result<Snapshot> {
        let snapshot = write_snapshot(&table.metadata, batch)?;
        self.commit_snapshot(table, snapshot.clone())?;
        Ok(snapshot)
    }
}

impl<C: Catalog + ?Sized> Catalog for Box<C> {
    fn create_namespace_if_not_exists(
        &self,
        namespace: &NamespaceIdent,
        properties: &BTreeMap<String, String>,
    ) -> Result<()> {
        (**self).create_namespace_if_not_exists(namespace, properties)
    }

    fn load_table(&self, ident: &TableIdent) -> Result<Table> {
        (**self).load_table(ident)
    }

    fn create_table_if_not_exists(
        &self,
        ident: &TableIdent,
        creation: TableCreation,
    ) -> Result<Table> {
        (**self).create_table_if_not_exists(ident, creation)
    }

    fn commit_snapshot(&self, table: &mut Table, snapshot: Snapshot) -> Result<()> {
        (**self).commit_snapshot(table, snapshot)
    }
}
