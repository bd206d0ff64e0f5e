//! bigexport-core - format-independent exporter logic
//!
//! Record model, schema handling, Arrow conversion and the buffer-and-flush
//! lifecycle. Backends for the individual formats live in `bigexport-writer`
//! and `bigexport-iceberg`.

pub mod arrow_convert;
pub mod capability;
pub mod error;
pub mod exporter;
pub mod literal;
pub mod record;
pub mod schema;

pub use arrow_convert::{records_to_batch, Coercion};
pub use capability::{Capability, Format, UnavailableBackend};
pub use error::{ErrorCode, ExportError, Result};
pub use exporter::{
    Backend, Batch, BatchExporter, BatchPolicy, ExportSummary, ExporterState, ItemExporter,
};
pub use record::{Record, Value};
pub use schema::{infer_schema, FieldSpec, SchemaSpec};
