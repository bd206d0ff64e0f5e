//! Apache Iceberg exporter for bigexport
//!
//! Appends each flushed batch to an Iceberg table as a Parquet data file and
//! a new snapshot, through a filesystem or REST catalog.

pub use backend::IcebergBackend;
pub use catalog::{Catalog, FileCatalog, NamespaceIdent, RestCatalog, Table, TableCreation, TableIdent};
pub use http::{HttpClient, HttpResponse, ReqwestHttpClient};
pub use init::load_catalog;
pub use writer::write_snapshot;

pub mod arrow_convert;
mod backend;
pub mod catalog;
pub mod datafile_convert;
pub mod http;
pub mod init;
pub mod manifest;
pub mod path;
pub mod protocol;
pub mod types;
pub mod writer;

use bigexport_core::{Capability, Format};

/// Iceberg support is always compiled into this crate
pub fn capability() -> Capability {
    Capability::available(Format::Iceberg)
}
