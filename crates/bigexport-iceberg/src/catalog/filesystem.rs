//! Filesystem catalog
//!
//! Hadoop-style layout: a table lives at `<warehouse>/<ns...>/<table>` and its
//! metadata is `metadata/vN.metadata.json`, with `metadata/version-hint.text`
//! naming the current version. A commit creates the next version file and
//! fails if another writer created it first.

use super::{Catalog, NamespaceIdent, Table, TableCreation, TableIdent};
use crate::path::{catalog_path, to_local_path};
use crate::types::{MetadataLogEntry, Snapshot, TableMetadata};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const VERSION_HINT: &str = "version-hint.text";

pub struct FileCatalog {
    /// Warehouse as configured, used to build table locations
    warehouse: String,
    root: PathBuf,
}

impl FileCatalog {
    /// `warehouse` is a local path or `file://` URI; it is created if missing.
    pub fn new(warehouse: impl Into<String>) -> Result<Self> {
        let warehouse = warehouse.into();
        let root = to_local_path(&warehouse)?;
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create warehouse {}", root.display()))?;
        Ok(Self { warehouse, root })
    }

    fn namespace_dir(&self, namespace: &NamespaceIdent) -> PathBuf {
        namespace
            .parts()
            .iter()
            .fold(self.root.clone(), |dir, part| dir.join(part))
    }

    fn default_location(&self, ident: &TableIdent) -> String {
        let mut relative = ident.namespace.parts().to_vec();
        relative.push(ident.name.clone());
        catalog_path(&self.warehouse, &relative.join("/"))
    }

    fn metadata_dir(&self, ident: &TableIdent) -> PathBuf {
        self.namespace_dir(&ident.namespace)
            .join(&ident.name)
            .join("metadata")
    }

    fn metadata_file_name(version: u64) -> String {
        format!("v{}.metadata.json", version)
    }

    fn parse_version(file_name: &str) -> Option<u64> {
        file_name
            .strip_prefix('v')?
            .strip_suffix(".metadata.json")?
            .parse()
            .ok()
    }

    /// Current version from the hint, or the highest metadata file present
    fn current_version(metadata_dir: &Path) -> Result<Option<u64>> {
        match fs::read_to_string(metadata_dir.join(VERSION_HINT)) {
            Ok(hint) => {
                let version = hint
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid version hint in {}", metadata_dir.display()))?;
                return Ok(Some(version));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).context("failed to read version hint"),
        }

        let entries = match fs::read_dir(metadata_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("failed to list table metadata"),
        };
        let mut latest = None;
        for entry in entries {
            let name = entry?.file_name();
            if let Some(version) = name.to_str().and_then(Self::parse_version) {
                latest = latest.max(Some(version));
            }
        }
        Ok(latest)
    }

    fn write_version(&self, ident: &TableIdent, version: u64, metadata: &TableMetadata) -> Result<String> {
        let dir = self.metadata_dir(ident);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let file_name = Self::metadata_file_name(version);
        let body = serde_json::to_vec_pretty(metadata).context("failed to serialize table metadata")?;
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&file_name))
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(anyhow!(
                    "Commit conflict on table {}: version {} was written concurrently",
                    ident,
                    version
                ))
            }
            Err(e) => return Err(e).context("failed to create table metadata file"),
        };
        file.write_all(&body).context("failed to write table metadata")?;
        file.sync_all().context("failed to sync table metadata")?;
        fs::write(dir.join(VERSION_HINT), version.to_string()).context("failed to write version hint")?;

        let mut relative = ident.namespace.parts().to_vec();
        relative.extend([ident.name.clone(), "metadata".to_string(), file_name]);
        Ok(catalog_path(&self.warehouse, &relative.join("/")))
    }
}

impl Catalog for FileCatalog {
    fn create_namespace_if_not_exists(
        &self,
        namespace: &NamespaceIdent,
        properties: &BTreeMap<String, String>,
    ) -> Result<()> {
        let dir = self.namespace_dir(namespace);
        if dir.is_dir() {
            debug!(namespace = %namespace, "Namespace exists");
            return Ok(());
        }
        if !properties.is_empty() {
            warn!(
                namespace = %namespace,
                "Filesystem catalog does not store namespace properties; ignoring them"
            );
        }
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create namespace {}", namespace))?;
        info!(namespace = %namespace, "Created namespace");
        Ok(())
    }

    fn load_table(&self, ident: &TableIdent) -> Result<Table> {
        let dir = self.metadata_dir(ident);
        let version = Self::current_version(&dir)?
            .ok_or_else(|| anyhow!("Table does not exist: {}", ident))?;
        let path = dir.join(Self::metadata_file_name(version));
        let body = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let metadata: TableMetadata = serde_json::from_slice(&body)
            .with_context(|| format!("invalid table metadata in {}", path.display()))?;

        let mut relative = ident.namespace.parts().to_vec();
        relative.extend([
            ident.name.clone(),
            "metadata".to_string(),
            Self::metadata_file_name(version),
        ]);
        Ok(Table {
            ident: ident.clone(),
            metadata,
            metadata_location: Some(catalog_path(&self.warehouse, &relative.join("/"))),
        })
    }

    fn create_table_if_not_exists(
        &self,
        ident: &TableIdent,
        creation: TableCreation,
    ) -> Result<Table> {
        if Self::current_version(&self.metadata_dir(ident))?.is_some() {
            return self.load_table(ident);
        }
        if !self.namespace_dir(&ident.namespace).is_dir() {
            return Err(anyhow!("Namespace does not exist: {}", ident.namespace));
        }

        let location = self.default_location(ident);
        if let Some(requested) = &creation.location {
            if requested.trim_end_matches('/') != location {
                return Err(anyhow!(
                    "Filesystem catalog tables live at {}; custom location {} is not supported",
                    location,
                    requested
                ));
            }
        }

        let metadata = TableMetadata::new(
            location,
            creation.schema,
            creation.properties,
            Utc::now().timestamp_millis(),
        );
        let metadata_location = self.write_version(ident, 1, &metadata)?;
        info!(table = %ident, location = %metadata.location, "Created table");

        Ok(Table {
            ident: ident.clone(),
            metadata,
            metadata_location: Some(metadata_location),
        })
    }

    fn commit_snapshot(&self, table: &mut Table, snapshot: Snapshot) -> Result<()> {
        let current_location = table
            .metadata_location
            .clone()
            .ok_or_else(|| anyhow!("Table {} has no metadata file to commit on", table.ident))?;
        let version = current_location
            .rsplit('/')
            .next()
            .and_then(Self::parse_version)
            .ok_or_else(|| anyhow!("Unexpected metadata location {}", current_location))?;

        let on_disk = Self::current_version(&self.metadata_dir(&table.ident))?;
        if on_disk != Some(version) {
            return Err(anyhow!(
                "Commit conflict on table {}: expected version {}, found {:?}",
                table.ident,
                version,
                on_disk
            ));
        }

        let snapshot_id = snapshot.snapshot_id;
        let metadata = table.metadata.with_snapshot(
            snapshot,
            Some(MetadataLogEntry {
                metadata_file: current_location,
                timestamp_ms: table.metadata.last_updated_ms,
            }),
        );
        let metadata_location = self.write_version(&table.ident, version + 1, &metadata)?;
        info!(
            table = %table.ident,
            snapshot_id,
            version = version + 1,
            "Committed snapshot"
        );

        table.metadata = metadata;
        table.metadata_location = Some(metadata_location);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NestedField, PrimitiveType, Schema};

    fn ident(name: &str) -> TableIdent {
        TableIdent::new(
            NamespaceIdent::from_vec(vec!["crawl".to_string()]).unwrap(),
            name,
        )
        .unwrap()
    }

    fn creation() -> TableCreation {
        TableCreation {
            schema: Schema::new(
                0,
                vec![NestedField::optional(1, "text", PrimitiveType::String.into())],
            ),
            location: None,
            properties: BTreeMap::new(),
        }
    }

    fn snapshot(id: i64, parent: Option<i64>, sequence_number: i64) -> Snapshot {
        Snapshot {
            snapshot_id: id,
            parent_snapshot_id: parent,
            sequence_number,
            timestamp_ms: 10,
            manifest_list: "unused.avro".to_string(),
            summary: BTreeMap::from([("operation".to_string(), "append".to_string())]),
            schema_id: Some(0),
        }
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(FileCatalog::parse_version("v12.metadata.json"), Some(12));
        assert_eq!(FileCatalog::parse_version("version-hint.text"), None);
        assert_eq!(FileCatalog::parse_version("vx.metadata.json"), None);
    }

    #[test]
    fn test_create_requires_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FileCatalog::new(dir.path().to_str().unwrap()).unwrap();
        let err = catalog
            .create_table_if_not_exists(&ident("quotes"), creation())
            .unwrap_err();
        assert!(err.to_string().contains("Namespace does not exist"));
    }

    #[test]
    fn test_create_load_and_commit() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FileCatalog::new(dir.path().to_str().unwrap()).unwrap();
        let ident = ident("quotes");
        catalog
            .create_namespace_if_not_exists(&ident.namespace, &BTreeMap::new())
            .unwrap();

        let mut table = catalog.create_table_if_not_exists(&ident, creation()).unwrap();
        assert!(table
            .metadata_location
            .as_deref()
            .unwrap()
            .ends_with("crawl/quotes/metadata/v1.metadata.json"));

        // Second create loads the existing table
        let again = catalog.create_table_if_not_exists(&ident, creation()).unwrap();
        assert_eq!(again.metadata.table_uuid, table.metadata.table_uuid);

        catalog.commit_snapshot(&mut table, snapshot(5, None, 1)).unwrap();
        assert_eq!(table.metadata.main_snapshot_id(), Some(5));
        assert_eq!(table.metadata.metadata_log.len(), 1);

        let loaded = catalog.load_table(&ident).unwrap();
        assert_eq!(loaded.metadata, table.metadata);
        assert!(loaded
            .metadata_location
            .as_deref()
            .unwrap()
            .ends_with("v2.metadata.json"));
        let hint = fs::read_to_string(dir.path().join("crawl/quotes/metadata/version-hint.text")).unwrap();
        assert_eq!(hint, "2");
    }

    #[test]
    fn test_stale_commit_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FileCatalog::new(dir.path().to_str().unwrap()).unwrap();
        let ident = ident("quotes");
        catalog
            .create_namespace_if_not_exists(&ident.namespace, &BTreeMap::new())
            .unwrap();
        let mut first = catalog.create_table_if_not_exists(&ident, creation()).unwrap();
        let mut stale = first.clone();

        catalog.commit_snapshot(&mut first, snapshot(1, None, 1)).unwrap();
        let err = catalog
            .commit_snapshot(&mut stale, snapshot(2, None, 1))
            .unwrap_err();
        assert!(err.to_string().contains("Commit conflict"));
    }

    #[test]
    fn test_custom_location_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FileCatalog::new(dir.path().to_str().unwrap()).unwrap();
        let ident = ident("quotes");
        catalog
            .create_namespace_if_not_exists(&ident.namespace, &BTreeMap::new())
            .unwrap();

        let mut creation = creation();
        creation.location = Some("/somewhere/else".to_string());
        let err = catalog.create_table_if_not_exists(&ident, creation).unwrap_err();
        assert!(err.to_string().contains("custom location"));
    }

    #[test]
    fn test_missing_table() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FileCatalog::new(dir.path().to_str().unwrap()).unwrap();
        let err = catalog.load_table(&ident("absent")).unwrap_err();
        assert!(err.to_string().contains("Table does not exist: crawl.absent"));
    }
}
