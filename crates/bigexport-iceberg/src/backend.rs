// Iceberg exporter backend
//
// Every flush is appended to the table as its own snapshot. The exporter's
// own output path only receives a `{"noitems": N}` summary at the end.

use std::path::PathBuf;

use arrow::datatypes::SchemaRef;
use bigexport_config::{CatalogOptions, IcebergOptions, Properties, StdEnvSource};
use bigexport_core::{
    infer_schema, records_to_batch, Backend, Batch, Coercion, ExportError, ExportSummary, Format,
    Result,
};
use bigexport_writer::FileSink;
use tracing::{debug, info, warn};

use crate::arrow_convert::{arrow_to_iceberg_schema, iceberg_to_arrow_schema};
use crate::catalog::{Catalog, NamespaceIdent, Table, TableCreation, TableIdent};
use crate::init::load_catalog;

fn backend_error(e: anyhow::Error) -> ExportError {
    ExportError::backend_write(Format::Iceberg, format!("{:#}", e))
}

pub struct IcebergBackend {
    sink: FileSink,
    catalog_options: Option<CatalogOptions>,
    catalog: Option<Box<dyn Catalog>>,
    ident: TableIdent,
    create_namespace: bool,
    namespace_properties: Properties,
    create_table: bool,
    table_location: Option<String>,
    table_properties: Properties,
    schema: Option<SchemaRef>,
    nullable: bool,
    coercion: Coercion,
    table: Option<Table>,
    /// Table schema with field IDs, resolved at the first flush
    table_schema: Option<SchemaRef>,
    snapshots: u64,
}

impl IcebergBackend {
    /// Resolve names, catalog options and schema. Nothing is contacted.
    pub fn new(path: impl Into<PathBuf>, options: &IcebergOptions) -> Result<Self> {
        let namespace = options.namespace()?;
        let table = options.table()?;
        let (levels, name) = table.identifier(namespace);
        let ident = NamespaceIdent::from_vec(levels)
            .and_then(|ns| TableIdent::new(ns, name))
            .map_err(|e| ExportError::configuration(e.to_string()))?;

        let schema = options
            .schema
            .as_ref()
            .map(|spec| spec.to_arrow(options.common.hasnulls))
            .transpose()?;

        Ok(Self {
            sink: FileSink::new(Format::Iceberg, path),
            catalog_options: options.catalog()?,
            catalog: None,
            ident,
            create_namespace: namespace.create_if_not_exists,
            namespace_properties: namespace.properties.clone(),
            create_table: table.create_if_not_exists,
            table_location: table.location.clone(),
            table_properties: table.properties.clone(),
            schema,
            nullable: options.common.hasnulls,
            coercion: Coercion {
                safe: options.pyarrow_safe_schema,
            },
            table: None,
            table_schema: None,
            snapshots: 0,
        })
    }

    /// Use an already-built catalog instead of the configured one
    pub fn with_catalog(mut self, catalog: Box<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Column names of an explicit schema
    pub fn schema_columns(&self) -> Option<Vec<String>> {
        self.schema
            .as_ref()
            .map(|s| s.fields().iter().map(|f| f.name().clone()).collect())
    }

    pub fn table_ident(&self) -> &TableIdent {
        &self.ident
    }

    fn catalog(&self) -> Result<&dyn Catalog> {
        self.catalog
            .as_deref()
            .ok_or_else(|| ExportError::backend_write(Format::Iceberg, "catalog is not open"))
    }

    /// Load the table, or create it from the first batch's schema
    fn resolve_table(&self, batch: &Batch<'_>) -> Result<Table> {
        let catalog = self.catalog()?;
        if !self.create_table {
            return catalog.load_table(&self.ident).map_err(backend_error);
        }

        let arrow_schema = match &self.schema {
            Some(schema) => schema.clone(),
            None => infer_schema(batch.columns, batch.records, self.nullable)?,
        };
        let schema = arrow_to_iceberg_schema(&arrow_schema)
            .map_err(|e| ExportError::encoding("schema", format!("{:#}", e)))?;
        let creation = TableCreation {
            schema,
            location: self.table_location.clone(),
            properties: self.table_properties.clone(),
        };
        catalog
            .create_table_if_not_exists(&self.ident, creation)
            .map_err(backend_error)
    }
}

impl Backend for IcebergBackend {
    fn format(&self) -> Format {
        Format::Iceberg
    }

    fn start(&mut self) -> Result<()> {
        self.sink.open()?;

        if self.catalog.is_none() {
            let options = match &self.catalog_options {
                Some(options) => options.clone(),
                None => {
                    warn!("No iceberg_catalog configured, using BIGEXPORT_ICEBERG_* variables");
                    CatalogOptions::from_env(&StdEnvSource)?
                }
            };
            let catalog =
                load_catalog(&options).map_err(|e| ExportError::configuration(format!("{:#}", e)))?;
            self.catalog = Some(catalog);
        }

        if self.create_namespace {
            self.catalog()?
                .create_namespace_if_not_exists(&self.ident.namespace, &self.namespace_properties)
                .map_err(backend_error)?;
        }
        info!(table = %self.ident, "Iceberg exporter started");
        Ok(())
    }

    fn write_batch(&mut self, batch: Batch<'_>) -> Result<()> {
        let mut table = match self.table.take() {
            Some(table) => table,
            None => self.resolve_table(&batch)?,
        };
        let schema = match self.table_schema.clone() {
            Some(schema) => schema,
            None => {
                let current = table.metadata.current_schema().ok_or_else(|| {
                    ExportError::backend_write(
                        Format::Iceberg,
                        format!("table {} has no current schema", self.ident),
                    )
                })?;
                let schema = iceberg_to_arrow_schema(current)
                    .map_err(|e| ExportError::encoding("schema", format!("{:#}", e)))?;
                debug!(schema = ?schema, "Resolved Iceberg table schema");
                self.table_schema = Some(schema.clone());
                schema
            }
        };

        let record_batch = records_to_batch(&schema, batch.records, self.coercion)?;
        let snapshot = self
            .catalog()?
            .append(&mut table, &record_batch)
            .map_err(backend_error)?;
        self.snapshots += 1;
        debug!(
            snapshot_id = snapshot.snapshot_id,
            rows = record_batch.num_rows(),
            "Appended Iceberg snapshot"
        );
        self.table = Some(table);
        Ok(())
    }

    fn finish(&mut self, summary: &ExportSummary) -> Result<()> {
        let file = self.sink.take()?;
        serde_json::to_writer(&file, &serde_json::json!({ "noitems": summary.records_exported }))
            .map_err(|e| ExportError::backend_write(Format::Iceberg, e.to_string()))?;
        self.sink.sync(file)?;

        info!(
            table = %self.ident,
            records = summary.records_exported,
            snapshots = self.snapshots,
            "Finished Iceberg export"
        );
        Ok(())
    }
}
