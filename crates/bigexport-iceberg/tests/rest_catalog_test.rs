// Iceberg exports through the REST catalog
//
// An in-process fake implements the handful of endpoints the exporter calls
// and applies commits to its own copy of the table metadata. Data and
// metadata files land in a temp dir used as the table location.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use bigexport_config::{FormatOptions, IcebergOptions, OptionMap};
use bigexport_core::{BatchExporter, ItemExporter, Record, Value};
use bigexport_iceberg::protocol::{CommitTableRequest, CreateTableRequest, TableRequirement, TableUpdate};
use bigexport_iceberg::types::{Schema, TableMetadata};
use bigexport_iceberg::{HttpClient, HttpResponse, IcebergBackend, RestCatalog};
use serde_json::json;

#[derive(Default)]
struct State {
    namespaces: Vec<Vec<String>>,
    table: Option<TableMetadata>,
    commits: usize,
}

struct FakeRestServer {
    location: String,
    state: Mutex<State>,
}

impl FakeRestServer {
    fn new(location: &Path) -> Self {
        Self {
            location: location.to_str().unwrap().to_string(),
            state: Mutex::new(State::default()),
        }
    }

    fn reply(status: u16, body: serde_json::Value) -> Result<HttpResponse> {
        Ok(HttpResponse {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: serde_json::to_vec(&body)?,
        })
    }

    fn error(status: u16, kind: &str, message: &str) -> Result<HttpResponse> {
        Self::reply(
            status,
            json!({"error": {"message": message, "type": kind, "code": status}}),
        )
    }

    fn table_response(&self, metadata: &TableMetadata, version: usize) -> serde_json::Value {
        json!({
            "metadata-location": format!("{}/metadata/{:05}.metadata.json", self.location, version),
            "metadata": metadata,
        })
    }
}

impl HttpClient for FakeRestServer {
    fn request(
        &self,
        method: &str,
        url: &str,
        _headers: Vec<(String, String)>,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        let mut state = self.state.lock().map_err(|_| anyhow!("poisoned"))?;
        let path = url
            .strip_prefix("http://catalog/v1/")
            .ok_or_else(|| anyhow!("unexpected url {}", url))?;

        match (method, path) {
            ("GET", "config") => Self::reply(200, json!({"defaults": {}, "overrides": {}})),
            ("GET", "namespaces/crawl") => {
                if state.namespaces.contains(&vec!["crawl".to_string()]) {
                    Self::reply(200, json!({"namespace": ["crawl"]}))
                } else {
                    Self::error(404, "NoSuchNamespaceException", "Namespace does not exist: crawl")
                }
            }
            ("POST", "namespaces") => {
                let request: serde_json::Value = serde_json::from_slice(&body.unwrap_or_default())?;
                let namespace: Vec<String> = serde_json::from_value(request["namespace"].clone())?;
                state.namespaces.push(namespace.clone());
                Self::reply(200, json!({"namespace": namespace}))
            }
            ("POST", "namespaces/crawl/tables") => {
                if state.table.is_some() {
                    return Self::error(409, "AlreadyExistsException", "Table already exists: crawl.quotes");
                }
                let request: CreateTableRequest = serde_json::from_slice(&body.unwrap_or_default())?;
                let metadata = TableMetadata::new(
                    self.location.clone(),
                    request.schema,
                    request.properties,
                    0,
                );
                let response = self.table_response(&metadata, 0);
                state.table = Some(metadata);
                Self::reply(200, response)
            }
            ("GET", "namespaces/crawl/tables/quotes") => match &state.table {
                Some(metadata) => Self::reply(200, self.table_response(metadata, state.commits)),
                None => Self::error(404, "NoSuchTableException", "Table does not exist: crawl.quotes"),
            },
            ("POST", "namespaces/crawl/tables/quotes") => {
                let request: CommitTableRequest = serde_json::from_slice(&body.unwrap_or_default())?;
                let metadata = state
                    .table
                    .clone()
                    .ok_or_else(|| anyhow!("commit before create"))?;
                for requirement in &request.requirements {
                    let TableRequirement::AssertRefSnapshotId { snapshot_id, .. } = requirement;
                    if *snapshot_id != metadata.main_snapshot_id() {
                        return Self::error(409, "CommitFailedException", "branch main has changed");
                    }
                }
                let mut next = metadata;
                for update in request.updates {
                    if let TableUpdate::AddSnapshot { snapshot } = update {
                        next = next.with_snapshot(snapshot, None);
                    }
                }
                state.commits += 1;
                let response = self.table_response(&next, state.commits);
                state.table = Some(next);
                Self::reply(200, response)
            }
            _ => Self::error(400, "BadRequestException", &format!("unhandled {} {}", method, path)),
        }
    }
}

fn options() -> IcebergOptions {
    let map: OptionMap = json!({
        "iceberg_catalog": {"rest": {"type": "rest", "uri": "http://catalog"}},
        "iceberg_namespace": {"name": "crawl", "create_if_not_exists": true},
        "iceberg_table": {"name": "quotes", "create_if_not_exists": true, "properties": {"owner": "crawler"}},
        "no_items_batch": 1
    })
    .as_object()
    .cloned()
    .unwrap_or_default();
    IcebergOptions::parse(&map, false).unwrap()
}

fn quote(i: i64) -> Record {
    Record::new()
        .with("text", format!("quote {}", i))
        .with("tags", vec!["love", "life"])
        .with("rating", Value::Int(i))
}

#[test]
fn test_rest_export_commits_every_flush() {
    let dir = tempfile::tempdir().unwrap();
    let server = FakeRestServer::new(&dir.path().join("table"));
    let mut catalog = RestCatalog::new(server, "http://catalog");
    catalog.load_config().unwrap();

    let opts = options();
    let backend = IcebergBackend::new(dir.path().join("quotes.json"), &opts)
        .unwrap()
        .with_catalog(Box::new(catalog));
    let mut exporter = BatchExporter::new(backend, opts.batch_policy());

    exporter.start_exporting().unwrap();
    for i in 0..5 {
        exporter.export_item(quote(i)).unwrap();
    }
    let summary = exporter.finish_exporting().unwrap();
    // 2 + 2 + 1
    assert_eq!(summary.batches_flushed, 3);
    assert_eq!(summary.records_exported, 5);

    let data_files = std::fs::read_dir(dir.path().join("table/data")).unwrap().count();
    assert_eq!(data_files, 3);
    let sidecar: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("quotes.json")).unwrap())
            .unwrap();
    assert_eq!(sidecar["noitems"], 5);
}

#[test]
fn test_manifest_records_table_schema() {
    let dir = tempfile::tempdir().unwrap();
    let server = FakeRestServer::new(&dir.path().join("table"));
    let catalog = RestCatalog::new(server, "http://catalog");

    let opts = options();
    let backend = IcebergBackend::new(dir.path().join("quotes.json"), &opts)
        .unwrap()
        .with_catalog(Box::new(catalog));
    let mut exporter = BatchExporter::new(backend, opts.batch_policy());
    exporter.start_exporting().unwrap();
    exporter.export_item(quote(1)).unwrap();
    exporter.finish_exporting().unwrap();

    let metadata_dir = dir.path().join("table/metadata");
    let names: Vec<String> = std::fs::read_dir(&metadata_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names.iter().filter(|n| n.starts_with("snap-")).count(), 1);
    let manifest = names.iter().find(|n| n.ends_with("-m0.avro")).unwrap();

    let reader =
        apache_avro::Reader::new(std::fs::File::open(metadata_dir.join(manifest)).unwrap()).unwrap();
    let schema: Schema =
        serde_json::from_slice(reader.user_metadata().get("schema").unwrap()).unwrap();
    let ids: BTreeMap<String, i32> = schema.fields.into_iter().map(|f| (f.name, f.id)).collect();
    assert_eq!(ids.get("text"), Some(&1));
    assert_eq!(ids.get("tags"), Some(&2));
    assert_eq!(ids.get("rating"), Some(&3));
}
