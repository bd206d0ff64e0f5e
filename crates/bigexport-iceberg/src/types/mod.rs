//! Iceberg metadata types
//!
//! Minimal implementation of the table format for appends.

pub mod datafile;
pub mod schema;
pub mod table;

pub use datafile::{DataContentType, DataFile, DataFileBuilder, DataFileFormat};
pub use schema::{NestedField, PrimitiveType, Schema, Type};
pub use table::{
    CatalogConfig, LoadTableResponse, MetadataLogEntry, Snapshot, SnapshotRefType,
    SnapshotReference, TableMetadata, MAIN_BRANCH,
};
