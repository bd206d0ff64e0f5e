//! Iceberg REST API protocol types

pub mod requests;
pub mod responses;

pub use requests::{
    CommitTableRequest, CreateNamespaceRequest, CreateTableRequest, TableIdentifier,
    TableRequirement, TableUpdate,
};
pub use responses::{CommitTableResponse, ErrorModel, ErrorResponse, GetNamespaceResponse};
