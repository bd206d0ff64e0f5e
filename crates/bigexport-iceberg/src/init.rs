//! Catalog construction from exporter options.

use crate::catalog::{Catalog, FileCatalog, RestCatalog};
use crate::http::ReqwestHttpClient;
use anyhow::{anyhow, Result};
use bigexport_config::{CatalogKind, CatalogOptions};
use tracing::info;

/// Build the catalog an exporter commits through.
///
/// `filesystem` needs a `warehouse`. `rest` needs a `uri` and takes optional
/// `warehouse`, `token` and `prefix`; it fetches `/v1/config` on connect.
pub fn load_catalog(options: &CatalogOptions) -> Result<Box<dyn Catalog>> {
    match options.kind {
        CatalogKind::Filesystem => {
            let warehouse = options.property("warehouse").ok_or_else(|| {
                anyhow!(
                    "Iceberg catalog '{}': filesystem catalogs require a warehouse",
                    options.name
                )
            })?;
            info!(catalog = %options.name, warehouse, "Using filesystem Iceberg catalog");
            Ok(Box::new(FileCatalog::new(warehouse)?))
        }
        CatalogKind::Rest => {
            let uri = options.property("uri").ok_or_else(|| {
                anyhow!(
                    "Iceberg catalog '{}': REST catalogs require a uri",
                    options.name
                )
            })?;
            let mut catalog = RestCatalog::new(ReqwestHttpClient::new()?, uri)
                .with_warehouse(options.property("warehouse").map(str::to_string))
                .with_token(options.property("token").map(str::to_string))
                .with_prefix(options.property("prefix").map(str::to_string));
            catalog.load_config()?;
            info!(catalog = %options.name, uri, "Using REST Iceberg catalog");
            Ok(Box::new(catalog))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigexport_config::Properties;

    fn options(kind: CatalogKind, properties: &[(&str, &str)]) -> CatalogOptions {
        CatalogOptions {
            name: "default".to_string(),
            kind,
            properties: properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Properties>(),
        }
    }

    #[test]
    fn test_filesystem_requires_warehouse() {
        let err = load_catalog(&options(CatalogKind::Filesystem, &[])).err().unwrap();
        assert!(err.to_string().contains("require a warehouse"));
    }

    #[test]
    fn test_rest_requires_uri() {
        let err = load_catalog(&options(CatalogKind::Rest, &[("warehouse", "wh")]))
            .err()
            .unwrap();
        assert!(err.to_string().contains("require a uri"));
    }

    #[test]
    fn test_filesystem_catalog_creates_warehouse() {
        let dir = tempfile::tempdir().unwrap();
        let warehouse = dir.path().join("wh");
        load_catalog(&options(
            CatalogKind::Filesystem,
            &[("warehouse", warehouse.to_str().unwrap())],
        ))
        .unwrap();
        assert!(warehouse.is_dir());
    }
}
