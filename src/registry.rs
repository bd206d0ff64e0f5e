// Exporter construction per format
//
// Formats whose encoder was compiled out still build an exporter. It fails
// at `start_exporting` with the name of the missing dependency.

use std::path::Path;

use bigexport_config::{AvroOptions, ExporterOptions, IcebergOptions, OrcOptions, ParquetOptions};
use bigexport_core::{BatchExporter, BatchPolicy, Capability, Format, ItemExporter, Result};
use tracing::debug;

/// Build the exporter for one feed. Options are already validated.
pub fn build_exporter(path: &Path, options: &ExporterOptions) -> Result<Box<dyn ItemExporter>> {
    debug!(format = %options.format(), path = %path.display(), "Building exporter");
    match options {
        ExporterOptions::Parquet(opts) => parquet_exporter(path, opts),
        ExporterOptions::Avro(opts) => avro_exporter(path, opts),
        ExporterOptions::Orc(opts) => orc_exporter(path, opts),
        ExporterOptions::Iceberg(opts) => iceberg_exporter(path, opts),
    }
}

/// Capability of every format in this build
pub fn capabilities() -> Vec<Capability> {
    Format::ALL.iter().map(|format| capability(*format)).collect()
}

pub fn capability(format: Format) -> Capability {
    match format {
        Format::Iceberg => iceberg_capability(),
        other => bigexport_writer::capability(other),
    }
}

#[cfg(feature = "iceberg")]
fn iceberg_capability() -> Capability {
    bigexport_iceberg::capability()
}

#[cfg(not(feature = "iceberg"))]
fn iceberg_capability() -> Capability {
    Capability::unavailable(Format::Iceberg)
}

/// An explicit schema fixes the column set
#[cfg(any(
    feature = "parquet",
    feature = "avro",
    feature = "orc",
    feature = "iceberg"
))]
fn with_schema_columns(policy: BatchPolicy, columns: Option<Vec<String>>) -> BatchPolicy {
    match columns {
        Some(columns) => policy.with_fields_to_export(Some(columns)),
        None => policy,
    }
}

#[cfg(not(all(
    feature = "parquet",
    feature = "avro",
    feature = "orc",
    feature = "iceberg"
)))]
fn unavailable(format: Format, policy: BatchPolicy) -> Result<Box<dyn ItemExporter>> {
    Ok(Box::new(BatchExporter::new(
        bigexport_core::UnavailableBackend::new(format),
        policy,
    )))
}

#[cfg(feature = "parquet")]
fn parquet_exporter(path: &Path, opts: &ParquetOptions) -> Result<Box<dyn ItemExporter>> {
    let backend = bigexport_writer::ParquetBackend::new(path, opts)?;
    let policy = with_schema_columns(opts.batch_policy(), backend.schema_columns());
    Ok(Box::new(BatchExporter::new(backend, policy)))
}

#[cfg(not(feature = "parquet"))]
fn parquet_exporter(_path: &Path, opts: &ParquetOptions) -> Result<Box<dyn ItemExporter>> {
    unavailable(Format::Parquet, opts.batch_policy())
}

#[cfg(feature = "avro")]
fn avro_exporter(path: &Path, opts: &AvroOptions) -> Result<Box<dyn ItemExporter>> {
    let backend = bigexport_writer::AvroBackend::new(path, opts)?;
    let policy = with_schema_columns(opts.batch_policy(), Some(backend.schema_columns()));
    Ok(Box::new(BatchExporter::new(backend, policy)))
}

#[cfg(not(feature = "avro"))]
fn avro_exporter(_path: &Path, opts: &AvroOptions) -> Result<Box<dyn ItemExporter>> {
    unavailable(Format::Avro, opts.batch_policy())
}

#[cfg(feature = "orc")]
fn orc_exporter(path: &Path, opts: &OrcOptions) -> Result<Box<dyn ItemExporter>> {
    let backend = bigexport_writer::OrcBackend::new(path, opts)?;
    let policy = with_schema_columns(opts.batch_policy(), Some(backend.schema_columns()));
    Ok(Box::new(BatchExporter::new(backend, policy)))
}

#[cfg(not(feature = "orc"))]
fn orc_exporter(_path: &Path, opts: &OrcOptions) -> Result<Box<dyn ItemExporter>> {
    unavailable(Format::Orc, opts.batch_policy())
}

#[cfg(feature = "iceberg")]
fn iceberg_exporter(path: &Path, opts: &IcebergOptions) -> Result<Box<dyn ItemExporter>> {
    let backend = bigexport_iceberg::IcebergBackend::new(path, opts)?;
    let policy = with_schema_columns(opts.batch_policy(), backend.schema_columns());
    Ok(Box::new(BatchExporter::new(backend, policy)))
}

#[cfg(not(feature = "iceberg"))]
fn iceberg_exporter(_path: &Path, opts: &IcebergOptions) -> Result<Box<dyn ItemExporter>> {
    unavailable(Format::Iceberg, opts.batch_policy())
}
