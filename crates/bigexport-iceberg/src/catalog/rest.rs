//! Iceberg REST catalog client
//!
//! Minimal implementation of the Iceberg REST API: namespaces, table
//! load/create and snapshot commits guarded by the `main` ref.

use super::{Catalog, NamespaceIdent, Table, TableCreation, TableIdent};
use crate::http::{HttpClient, HttpResponse};
use crate::protocol::{
    CommitTableRequest, CommitTableResponse, CreateNamespaceRequest, CreateTableRequest,
    ErrorModel, ErrorResponse, TableIdentifier, TableRequirement, TableUpdate,
};
use crate::types::{CatalogConfig, LoadTableResponse, Snapshot, SnapshotRefType, MAIN_BRANCH};
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Separator for multi-level namespaces in URL paths
const NAMESPACE_SEPARATOR: &str = "\u{1f}";

/// Iceberg catalog client
///
/// Generic over HttpClient so tests can replay canned responses.
pub struct RestCatalog<T: HttpClient> {
    http: T,
    /// Base URL of the REST catalog (e.g., "http://localhost:8181")
    base_url: String,
    prefix: Option<String>,
    warehouse: Option<String>,
    token: Option<String>,
}

impl<T: HttpClient> RestCatalog<T> {
    pub fn new(http: T, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            prefix: None,
            warehouse: None,
            token: None,
        }
    }

    pub fn with_warehouse(mut self, warehouse: Option<String>) -> Self {
        self.warehouse = warehouse;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    /// Fetch server-side config; a `prefix` from the server wins over the
    /// configured one.
    ///
    /// Calls: GET /v1/config
    pub fn load_config(&mut self) -> Result<CatalogConfig> {
        let mut url = format!("{}/v1/config", self.base_url);
        if let Some(warehouse) = &self.warehouse {
            url.push_str(&format!("?warehouse={}", urlencoding::encode(warehouse)));
        }
        let response = self
            .http
            .get(&url, self.headers())
            .context("Failed to load catalog config")?;
        if !response.is_success() {
            return Err(self.handle_error_response(&response));
        }
        let config: CatalogConfig = response.json().context("Failed to parse catalog config")?;
        if let Some(prefix) = config.get("prefix") {
            debug!(prefix, "Using catalog prefix from server config");
            self.prefix = Some(prefix.to_string()).filter(|p| !p.is_empty());
        }
        Ok(config)
    }

    fn url(&self, path: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/v1/{}/{}", self.base_url, prefix, path),
            None => format!("{}/v1/{}", self.base_url, path),
        }
    }

    fn namespace_path(namespace: &NamespaceIdent) -> String {
        urlencoding::encode(&namespace.parts().join(NAMESPACE_SEPARATOR)).into_owned()
    }

    fn table_url(&self, ident: &TableIdent) -> String {
        self.url(&format!(
            "namespaces/{}/tables/{}",
            Self::namespace_path(&ident.namespace),
            urlencoding::encode(&ident.name)
        ))
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        headers
    }

    fn post_json<B: serde::Serialize>(&self, url: &str, body: &B) -> Result<HttpResponse> {
        let body = serde_json::to_vec(body).context("Failed to serialize request")?;
        self.http.post(url, self.headers(), body)
    }

    /// Handle error responses from the catalog
    fn handle_error_response(&self, response: &HttpResponse) -> anyhow::Error {
        if let Ok(model) = response.json::<ErrorModel>() {
            return Self::catalog_error(&model.error);
        }
        if let Ok(error) = response.json::<ErrorResponse>() {
            return Self::catalog_error(&error);
        }

        let body = response
            .body_string()
            .unwrap_or_else(|_| "<binary>".to_string());
        anyhow!("HTTP {} error from catalog: {}", response.status, body)
    }

    fn catalog_error(error: &ErrorResponse) -> anyhow::Error {
        anyhow!(
            "Iceberg catalog error ({} {}): {}",
            error.code,
            error.error_type,
            error.message
        )
    }

    fn into_table(ident: &TableIdent, response: LoadTableResponse) -> Table {
        Table {
            ident: ident.clone(),
            metadata: response.metadata,
            metadata_location: response.metadata_location,
        }
    }
}

impl<T: HttpClient> Catalog for RestCatalog<T> {
    /// Calls: GET /v1/{prefix}/namespaces/{namespace}, then POST
    /// /v1/{prefix}/namespaces when it is missing
    #[instrument(skip(self, properties), fields(namespace = %namespace))]
    fn create_namespace_if_not_exists(
        &self,
        namespace: &NamespaceIdent,
        properties: &BTreeMap<String, String>,
    ) -> Result<()> {
        let url = self.url(&format!("namespaces/{}", Self::namespace_path(namespace)));
        let response = self
            .http
            .get(&url, self.headers())
            .context("Failed to load namespace")?;
        if response.is_success() {
            debug!("Namespace exists");
            return Ok(());
        }
        if response.status != 404 {
            return Err(self.handle_error_response(&response));
        }

        let request = CreateNamespaceRequest {
            namespace: namespace.parts().to_vec(),
            properties: properties.clone(),
        };
        let response = self
            .post_json(&self.url("namespaces"), &request)
            .context("Failed to create namespace")?;
        match response.status {
            // Created by someone else in the meantime
            409 => debug!("Namespace already exists"),
            _ if response.is_success() => info!("Created namespace"),
            _ => return Err(self.handle_error_response(&response)),
        }
        Ok(())
    }

    /// Calls: GET /v1/{prefix}/namespaces/{namespace}/tables/{table}
    #[instrument(skip(self), fields(table = %ident))]
    fn load_table(&self, ident: &TableIdent) -> Result<Table> {
        let url = self.table_url(ident);
        debug!("Loading table metadata from: {}", url);

        let response = self
            .http
            .get(&url, self.headers())
            .context("Failed to load table")?;
        if !response.is_success() {
            return Err(self.handle_error_response(&response));
        }

        let load_response: LoadTableResponse = response
            .json()
            .context("Failed to parse LoadTableResponse")?;
        Ok(Self::into_table(ident, load_response))
    }

    /// Calls: POST /v1/{prefix}/namespaces/{namespace}/tables, loading the
    /// table instead on 409
    #[instrument(skip(self, creation), fields(table = %ident))]
    fn create_table_if_not_exists(
        &self,
        ident: &TableIdent,
        creation: TableCreation,
    ) -> Result<Table> {
        let url = self.url(&format!(
            "namespaces/{}/tables",
            Self::namespace_path(&ident.namespace)
        ));
        let request = CreateTableRequest {
            name: ident.name.clone(),
            location: creation.location,
            schema: creation.schema,
            properties: creation.properties,
            stage_create: false,
        };
        let response = self
            .post_json(&url, &request)
            .context("Failed to create table")?;

        if response.status == 409 {
            debug!("Table already exists, loading it");
            return self.load_table(ident);
        }
        if !response.is_success() {
            return Err(self.handle_error_response(&response));
        }

        let load_response: LoadTableResponse = response
            .json()
            .context("Failed to parse LoadTableResponse")?;
        info!("Created table");
        Ok(Self::into_table(ident, load_response))
    }

    /// Calls: POST /v1/{prefix}/namespaces/{namespace}/tables/{table}
    #[instrument(skip(self, table, snapshot), fields(table = %table.ident, snapshot_id = snapshot.snapshot_id))]
    fn commit_snapshot(&self, table: &mut Table, snapshot: Snapshot) -> Result<()> {
        let snapshot_id = snapshot.snapshot_id;
        let request = CommitTableRequest {
            identifier: Some(TableIdentifier {
                namespace: table.ident.namespace.parts().to_vec(),
                name: table.ident.name.clone(),
            }),
            requirements: vec![TableRequirement::AssertRefSnapshotId {
                reference: MAIN_BRANCH.to_string(),
                snapshot_id: table.metadata.main_snapshot_id(),
            }],
            updates: vec![
                TableUpdate::AddSnapshot { snapshot },
                TableUpdate::SetSnapshotRef {
                    ref_name: MAIN_BRANCH.to_string(),
                    snapshot_id,
                    ref_type: SnapshotRefType::Branch,
                },
            ],
        };

        let response = self
            .post_json(&self.table_url(&table.ident), &request)
            .context("Failed to commit snapshot")?;
        if response.status == 409 {
            return Err(anyhow!(
                "Commit conflict on table {}: {}",
                table.ident,
                self.handle_error_response(&response)
            ));
        }
        if !response.is_success() {
            return Err(self.handle_error_response(&response));
        }

        let commit: CommitTableResponse = response
            .json()
            .context("Failed to parse CommitTableResponse")?;
        info!(metadata_location = %commit.metadata_location, "Committed snapshot");
        table.metadata = commit.metadata;
        table.metadata_location = Some(commit.metadata_location);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NestedField, PrimitiveType, Schema, TableMetadata};
    use std::sync::Mutex;

    /// Replays queued responses and records every request
    struct MockHttpClient {
        responses: Mutex<Vec<HttpResponse>>,
        requests: Mutex<Vec<(String, String, Option<serde_json::Value>)>>,
    }

    impl MockHttpClient {
        fn new(responses: Vec<HttpResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl HttpClient for MockHttpClient {
        fn request(
            &self,
            method: &str,
            url: &str,
            _headers: Vec<(String, String)>,
            body: Option<Vec<u8>>,
        ) -> Result<HttpResponse> {
            let body = body.map(|b| serde_json::from_slice(&b).unwrap());
            self.requests
                .lock()
                .unwrap()
                .push((method.to_string(), url.to_string(), body));
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(anyhow!("No more mock responses"));
            }
            Ok(responses.remove(0))
        }
    }

    fn response(status: u16, body: serde_json::Value) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: serde_json::to_vec(&body).unwrap(),
        }
    }

    fn ident() -> TableIdent {
        TableIdent::new(
            NamespaceIdent::from_vec(vec!["crawl".to_string(), "daily".to_string()]).unwrap(),
            "quotes",
        )
        .unwrap()
    }

    fn metadata() -> TableMetadata {
        TableMetadata::new(
            "s3://bucket/crawl/quotes",
            Schema::new(
                0,
                vec![NestedField::optional(1, "text", PrimitiveType::String.into())],
            ),
            BTreeMap::new(),
            0,
        )
    }

    fn load_response() -> serde_json::Value {
        serde_json::json!({
            "metadata-location": "s3://bucket/crawl/quotes/metadata/00000.metadata.json",
            "metadata": metadata(),
        })
    }

    #[test]
    fn test_namespace_is_created_when_missing() {
        let mock = MockHttpClient::new(vec![
            response(404, serde_json::json!({"error": {"message": "missing", "type": "NoSuchNamespaceException", "code": 404}})),
            response(200, serde_json::json!({"namespace": ["crawl", "daily"]})),
        ]);
        let catalog = RestCatalog::new(mock, "http://catalog:8181/").with_prefix(Some("wh".to_string()));

        catalog
            .create_namespace_if_not_exists(&ident().namespace, &BTreeMap::new())
            .unwrap();

        let requests = catalog.http.requests.lock().unwrap();
        assert_eq!(requests[0].0, "GET");
        assert_eq!(requests[0].1, "http://catalog:8181/v1/wh/namespaces/crawl%1Fdaily");
        assert_eq!(requests[1].0, "POST");
        assert_eq!(requests[1].1, "http://catalog:8181/v1/wh/namespaces");
        assert_eq!(
            requests[1].2.as_ref().unwrap()["namespace"],
            serde_json::json!(["crawl", "daily"])
        );
    }

    #[test]
    fn test_existing_namespace_is_left_alone() {
        let mock = MockHttpClient::new(vec![response(
            200,
            serde_json::json!({"namespace": ["crawl", "daily"]}),
        )]);
        let catalog = RestCatalog::new(mock, "http://catalog:8181");
        catalog
            .create_namespace_if_not_exists(&ident().namespace, &BTreeMap::new())
            .unwrap();
        assert_eq!(catalog.http.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_config_prefix_overrides() {
        let mock = MockHttpClient::new(vec![response(
            200,
            serde_json::json!({"defaults": {}, "overrides": {"prefix": "server"}}),
        )]);
        let mut catalog = RestCatalog::new(mock, "http://catalog:8181")
            .with_warehouse(Some("s3://bucket/wh".to_string()))
            .with_prefix(Some("local".to_string()));
        catalog.load_config().unwrap();

        assert_eq!(catalog.url("namespaces"), "http://catalog:8181/v1/server/namespaces");
        let requests = catalog.http.requests.lock().unwrap();
        assert_eq!(
            requests[0].1,
            "http://catalog:8181/v1/config?warehouse=s3%3A%2F%2Fbucket%2Fwh"
        );
    }

    #[test]
    fn test_create_table_conflict_loads_existing() {
        let mock = MockHttpClient::new(vec![
            response(409, serde_json::json!({"error": {"message": "exists", "type": "AlreadyExistsException", "code": 409}})),
            response(200, load_response()),
        ]);
        let catalog = RestCatalog::new(mock, "http://catalog:8181");
        let table = catalog
            .create_table_if_not_exists(
                &ident(),
                TableCreation {
                    schema: metadata().schemas[0].clone(),
                    location: None,
                    properties: BTreeMap::new(),
                },
            )
            .unwrap();

        assert_eq!(table.metadata.location, "s3://bucket/crawl/quotes");
        let requests = catalog.http.requests.lock().unwrap();
        assert_eq!(requests[0].1, "http://catalog:8181/v1/namespaces/crawl%1Fdaily/tables");
        assert_eq!(requests[1].0, "GET");
        assert_eq!(
            requests[1].1,
            "http://catalog:8181/v1/namespaces/crawl%1Fdaily/tables/quotes"
        );
    }

    #[test]
    fn test_commit_asserts_main_ref() {
        let snapshot = Snapshot {
            snapshot_id: 9,
            parent_snapshot_id: None,
            sequence_number: 1,
            timestamp_ms: 1,
            manifest_list: "s3://bucket/crawl/quotes/metadata/snap-9.avro".to_string(),
            summary: BTreeMap::from([("operation".to_string(), "append".to_string())]),
            schema_id: Some(0),
        };
        let committed = metadata().with_snapshot(snapshot.clone(), None);
        let mock = MockHttpClient::new(vec![response(
            200,
            serde_json::json!({
                "metadata-location": "s3://bucket/crawl/quotes/metadata/00001.metadata.json",
                "metadata": committed,
            }),
        )]);
        let catalog = RestCatalog::new(mock, "http://catalog:8181").with_token(Some("t0k".to_string()));
        let mut table = Table {
            ident: ident(),
            metadata: metadata(),
            metadata_location: None,
        };

        catalog.commit_snapshot(&mut table, snapshot).unwrap();
        assert_eq!(table.metadata.main_snapshot_id(), Some(9));
        assert!(table.metadata_location.unwrap().ends_with("00001.metadata.json"));

        let requests = catalog.http.requests.lock().unwrap();
        let body = requests[0].2.as_ref().unwrap();
        assert_eq!(body["identifier"]["name"], "quotes");
        assert_eq!(body["requirements"][0]["type"], "assert-ref-snapshot-id");
        assert!(body["requirements"][0]["snapshot-id"].is_null());
        assert_eq!(body["updates"][0]["action"], "add-snapshot");
        assert_eq!(body["updates"][1]["snapshot-id"], 9);
    }

    #[test]
    fn test_commit_conflict_is_reported() {
        let mock = MockHttpClient::new(vec![response(
            409,
            serde_json::json!({"error": {"message": "Requirement failed: branch main has changed", "type": "CommitFailedException", "code": 409}}),
        )]);
        let catalog = RestCatalog::new(mock, "http://catalog:8181");
        let mut table = Table {
            ident: ident(),
            metadata: metadata(),
            metadata_location: None,
        };
        let snapshot = Snapshot {
            snapshot_id: 3,
            parent_snapshot_id: None,
            sequence_number: 1,
            timestamp_ms: 1,
            manifest_list: "x.avro".to_string(),
            summary: BTreeMap::new(),
            schema_id: None,
        };

        let err = catalog.commit_snapshot(&mut table, snapshot).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Commit conflict"));
        assert!(message.contains("CommitFailedException"));
    }

    #[test]
    fn test_plain_text_error_body() {
        let mock = MockHttpClient::new(vec![HttpResponse {
            status: 500,
            headers: vec![],
            body: b"upstream exploded".to_vec(),
        }]);
        let catalog = RestCatalog::new(mock, "http://catalog:8181");
        let err = catalog.load_table(&ident()).unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500 error from catalog: upstream exploded");
    }
}
