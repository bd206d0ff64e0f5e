// Exporter options
//
// Options arrive as a JSON-like key/value map (the host's keyword arguments,
// a TOML table or `--option k=v` pairs). Each format deserializes the map into
// its own struct; keys nobody claims end up in `extra` and are either rejected
// or, in tolerant mode, logged and ignored.

use bigexport_core::{BatchPolicy, ExportError, Format, Result, SchemaSpec};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::env_overrides::EnvSource;
use crate::validation;

/// Raw option map as handed over by the host
pub type OptionMap = serde_json::Map<String, Value>;

/// String properties; scalar values of other types are stringified
pub type Properties = BTreeMap<String, String>;

const DEFAULT_BATCH: usize = 10_000;

fn default_batch() -> usize {
    DEFAULT_BATCH
}

fn default_true() -> bool {
    true
}

/// Options understood by every exporter
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommonOptions {
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub fields_to_export: Option<Vec<String>>,
    #[serde(default)]
    pub export_empty_fields: bool,
    #[serde(default)]
    pub convertallstrings: bool,
    #[serde(default = "default_true")]
    pub hasnulls: bool,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            fields_to_export: None,
            export_empty_fields: false,
            convertallstrings: false,
            hasnulls: true,
        }
    }
}

impl CommonOptions {
    pub fn batch_policy(&self, threshold: usize) -> BatchPolicy {
        BatchPolicy::new(threshold)
            .with_convert_all_strings(self.convertallstrings)
            .with_fields_to_export(self.fields_to_export.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    #[serde(alias = "uncompressed")]
    None,
    Snappy,
    Gzip,
    #[serde(alias = "lz4_raw")]
    Lz4,
    Brotli,
    #[default]
    Zstd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ParquetVersion {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "2.4")]
    V2_4,
    #[default]
    #[serde(rename = "2.6")]
    V2_6,
}

/// Parquet exporter options
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParquetOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    #[serde(default = "default_batch")]
    pub no_items_batch: usize,
    #[serde(default)]
    pub schema: Option<SchemaSpec>,
    #[serde(default = "default_true")]
    pub pyarrow_safe_schema: bool,
    #[serde(default)]
    pub row_group_size: Option<usize>,
    #[serde(default)]
    pub version: ParquetVersion,
    #[serde(default = "default_true")]
    pub use_dictionary: bool,
    #[serde(default)]
    pub compression: ParquetCompression,
    #[serde(default)]
    pub compression_level: Option<i32>,
    #[serde(default = "default_true")]
    pub write_statistics: bool,
    #[serde(default)]
    pub data_page_size: Option<usize>,
    #[serde(default)]
    pub write_batch_size: Option<usize>,
    #[serde(default)]
    pub dictionary_pagesize_limit: Option<usize>,
    #[serde(default = "default_true")]
    pub store_schema: bool,
    #[serde(default)]
    pub write_page_index: bool,
    #[serde(default, deserialize_with = "string_map")]
    pub key_value_metadata: Properties,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl ParquetOptions {
    pub fn batch_policy(&self) -> BatchPolicy {
        self.common.batch_policy(self.no_items_batch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvroCodec {
    #[serde(alias = "none")]
    Null,
    #[default]
    Deflate,
    Snappy,
    #[serde(alias = "zstd")]
    Zstandard,
    #[serde(alias = "bzip")]
    Bzip2,
    Xz,
}

/// Avro exporter options
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AvroOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    /// Record schema, as a JSON object or JSON text
    #[serde(default)]
    pub avroschema: Option<Value>,
    #[serde(default)]
    pub compression: AvroCodec,
    #[serde(default)]
    pub compressionlevel: Option<i32>,
    #[serde(default = "default_sync_interval")]
    pub syncinterval: usize,
    #[serde(default)]
    pub syncmarker: Option<String>,
    #[serde(default = "default_batch")]
    pub recordcache: usize,
    #[serde(default, deserialize_with = "string_map")]
    pub metadata: Properties,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

fn default_sync_interval() -> usize {
    16_000
}

impl AvroOptions {
    pub fn batch_policy(&self) -> BatchPolicy {
        self.common.batch_policy(self.recordcache)
    }

    /// Schema as JSON text
    pub fn schema_json(&self) -> Result<String> {
        match &self.avroschema {
            None | Some(Value::Null) => Err(ExportError::configuration("No avro schema defined")),
            Some(Value::String(text)) if text.trim().is_empty() => {
                Err(ExportError::configuration("No avro schema defined"))
            }
            Some(Value::String(text)) => Ok(text.clone()),
            Some(other) => Ok(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrcCompression {
    #[serde(alias = "uncompressed")]
    None,
    Zlib,
    Snappy,
    Lz4,
    #[default]
    Zstd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrcCompressionStrategy {
    #[default]
    Speed,
    Compression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum OrcFileVersion {
    #[serde(rename = "0.11")]
    V0_11,
    #[default]
    #[serde(rename = "0.12")]
    V0_12,
}

/// ORC exporter options
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrcOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    #[serde(default)]
    pub schema: Option<SchemaSpec>,
    #[serde(default = "default_batch")]
    pub no_items_batch: usize,
    #[serde(default = "default_true")]
    pub pyarrow_safe_schema: bool,
    #[serde(default)]
    pub file_version: OrcFileVersion,
    #[serde(default = "default_orc_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_stripe_size")]
    pub stripe_size: usize,
    #[serde(default)]
    pub compression: OrcCompression,
    #[serde(default = "default_compression_block_size")]
    pub compression_block_size: usize,
    #[serde(default)]
    pub compression_strategy: OrcCompressionStrategy,
    #[serde(default = "default_row_index_stride")]
    pub row_index_stride: usize,
    #[serde(default)]
    pub padding_tolerance: f64,
    #[serde(default)]
    pub dictionary_key_size_threshold: f64,
    #[serde(default)]
    pub bloom_filter_columns: Vec<String>,
    #[serde(default = "default_bloom_filter_fpp")]
    pub bloom_filter_fpp: f64,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

fn default_orc_batch_size() -> usize {
    1024
}

fn default_stripe_size() -> usize {
    64 * 1024 * 1024
}

fn default_compression_block_size() -> usize {
    64 * 1024
}

fn default_row_index_stride() -> usize {
    10_000
}

fn default_bloom_filter_fpp() -> f64 {
    0.05
}

impl OrcOptions {
    pub fn batch_policy(&self) -> BatchPolicy {
        self.common.batch_policy(self.no_items_batch)
    }
}

/// `iceberg_namespace` option
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct NamespaceOptions {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub create_if_not_exists: bool,
    #[serde(default, deserialize_with = "string_map")]
    pub properties: Properties,
}

impl NamespaceOptions {
    pub fn levels(&self) -> Vec<String> {
        split_levels(&self.name)
    }
}

/// `iceberg_table` option
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct TableOptions {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub create_if_not_exists: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "string_map")]
    pub properties: Properties,
}

impl TableOptions {
    /// Namespace levels and table name. A dotted table name such as
    /// `mynamespace.scraping_data` carries its own namespace.
    pub fn identifier(&self, namespace: &NamespaceOptions) -> (Vec<String>, String) {
        match self.name.rsplit_once('.') {
            Some((ns, table)) => (split_levels(ns), table.to_string()),
            None => (namespace.levels(), self.name.clone()),
        }
    }
}

fn split_levels(name: &str) -> Vec<String> {
    name.split('.')
        .filter(|level| !level.is_empty())
        .map(str::to_string)
        .collect()
}

/// Kind of Iceberg catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    /// Warehouse directory with `version-hint.text` tables
    Filesystem,
    Rest,
}

impl std::str::FromStr for CatalogKind {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "filesystem" | "hadoop" | "fs" => Ok(CatalogKind::Filesystem),
            "rest" => Ok(CatalogKind::Rest),
            other => Err(ExportError::configuration(format!(
                "Unsupported Iceberg catalog type: {}. Supported: filesystem, hadoop, rest",
                other
            ))),
        }
    }
}

/// One resolved catalog configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogOptions {
    pub name: String,
    pub kind: CatalogKind,
    pub properties: Properties,
}

impl CatalogOptions {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    fn from_entry(name: &str, value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(ExportError::configuration(format!(
                "Iceberg catalog '{}' must be a table of properties",
                name
            )));
        };
        let kind = match map.get("type") {
            Some(Value::String(kind)) => kind.parse()?,
            Some(_) => {
                return Err(ExportError::configuration(format!(
                    "Iceberg catalog '{}': type must be a string",
                    name
                )))
            }
            None => CatalogKind::Filesystem,
        };
        let properties = map
            .iter()
            .filter(|(key, _)| key.as_str() != "type")
            .map(|(key, value)| Ok((key.clone(), scalar_to_string(key, value)?)))
            .collect::<Result<Properties>>()?;
        Ok(Self {
            name: name.to_string(),
            kind,
            properties,
        })
    }

    /// Catalog described by `BIGEXPORT_ICEBERG_*` variables
    pub fn from_env(env: &dyn EnvSource) -> Result<Self> {
        let kind = env.get("ICEBERG_CATALOG_TYPE").ok_or_else(|| {
            ExportError::configuration(
                "No Iceberg catalog configured: set iceberg_catalog or BIGEXPORT_ICEBERG_CATALOG_TYPE",
            )
        })?;
        let mut properties = Properties::new();
        for (var, key) in [
            ("ICEBERG_WAREHOUSE", "warehouse"),
            ("ICEBERG_URI", "uri"),
            ("ICEBERG_TOKEN", "token"),
            ("ICEBERG_PREFIX", "prefix"),
        ] {
            if let Some(value) = env.get(var) {
                properties.insert(key.to_string(), value);
            }
        }
        Ok(Self {
            name: env
                .get("ICEBERG_CATALOG_NAME")
                .unwrap_or_else(|| "default".to_string()),
            kind: kind.parse()?,
            properties,
        })
    }
}

/// Iceberg exporter options
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IcebergOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    #[serde(default = "default_batch")]
    pub no_items_batch: usize,
    #[serde(default)]
    pub schema: Option<SchemaSpec>,
    #[serde(default = "default_true")]
    pub pyarrow_safe_schema: bool,
    #[serde(default)]
    pub iceberg_catalog: OptionMap,
    #[serde(default)]
    pub iceberg_namespace: Option<NamespaceOptions>,
    #[serde(default)]
    pub iceberg_table: Option<TableOptions>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl IcebergOptions {
    pub fn batch_policy(&self) -> BatchPolicy {
        self.common.batch_policy(self.no_items_batch)
    }

    /// First configured catalog, or `None` when the catalog comes from the
    /// environment
    pub fn catalog(&self) -> Result<Option<CatalogOptions>> {
        match self.iceberg_catalog.iter().next() {
            Some((name, value)) => CatalogOptions::from_entry(name, value).map(Some),
            None => Ok(None),
        }
    }

    pub fn namespace(&self) -> Result<&NamespaceOptions> {
        match &self.iceberg_namespace {
            None => Err(ExportError::configuration(
                "No namespace configuration \"iceberg_namespace\" specified",
            )),
            Some(ns) if ns.name.is_empty() => Err(ExportError::configuration(
                "No namespace name configuration \"iceberg_namespace\" specified",
            )),
            Some(ns) => Ok(ns),
        }
    }

    pub fn table(&self) -> Result<&TableOptions> {
        match &self.iceberg_table {
            None => Err(ExportError::configuration(
                "No table configuration \"iceberg_table\" specified",
            )),
            Some(table) if table.name.is_empty() => Err(ExportError::configuration(
                "No table name configuration \"iceberg_table\" specified",
            )),
            Some(table) => Ok(table),
        }
    }
}

/// Per-format option struct
pub trait FormatOptions: DeserializeOwned {
    const FORMAT: Format;

    /// Keys not claimed by any known option
    fn extra_mut(&mut self) -> &mut BTreeMap<String, Value>;

    fn validate(&self) -> Result<()>;

    /// Parse and validate an option map
    fn parse(options: &OptionMap, tolerant: bool) -> Result<Self> {
        let mut opts: Self = deserialize(Self::FORMAT, options)?;
        check_unknown(Self::FORMAT, std::mem::take(opts.extra_mut()), tolerant)?;
        opts.validate()?;
        Ok(opts)
    }
}

impl FormatOptions for ParquetOptions {
    const FORMAT: Format = Format::Parquet;

    fn extra_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.extra
    }

    fn validate(&self) -> Result<()> {
        validation::validate_parquet(self)
    }
}

impl FormatOptions for AvroOptions {
    const FORMAT: Format = Format::Avro;

    fn extra_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.extra
    }

    fn validate(&self) -> Result<()> {
        validation::validate_avro(self)
    }
}

impl FormatOptions for OrcOptions {
    const FORMAT: Format = Format::Orc;

    fn extra_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.extra
    }

    fn validate(&self) -> Result<()> {
        validation::validate_orc(self)
    }
}

impl FormatOptions for IcebergOptions {
    const FORMAT: Format = Format::Iceberg;

    fn extra_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.extra
    }

    fn validate(&self) -> Result<()> {
        validation::validate_iceberg(self)
    }
}

/// Validated options of one exporter
#[derive(Debug, Clone, PartialEq)]
pub enum ExporterOptions {
    Parquet(ParquetOptions),
    Avro(AvroOptions),
    Orc(OrcOptions),
    Iceberg(IcebergOptions),
}

impl ExporterOptions {
    /// Parse and validate the option map for `format`
    pub fn parse(format: Format, options: &OptionMap, tolerant: bool) -> Result<Self> {
        Ok(match format {
            Format::Parquet => ExporterOptions::Parquet(ParquetOptions::parse(options, tolerant)?),
            Format::Avro => ExporterOptions::Avro(AvroOptions::parse(options, tolerant)?),
            Format::Orc => ExporterOptions::Orc(OrcOptions::parse(options, tolerant)?),
            Format::Iceberg => ExporterOptions::Iceberg(IcebergOptions::parse(options, tolerant)?),
        })
    }

    pub fn format(&self) -> Format {
        match self {
            ExporterOptions::Parquet(_) => Format::Parquet,
            ExporterOptions::Avro(_) => Format::Avro,
            ExporterOptions::Orc(_) => Format::Orc,
            ExporterOptions::Iceberg(_) => Format::Iceberg,
        }
    }

    pub fn common(&self) -> &CommonOptions {
        match self {
            ExporterOptions::Parquet(o) => &o.common,
            ExporterOptions::Avro(o) => &o.common,
            ExporterOptions::Orc(o) => &o.common,
            ExporterOptions::Iceberg(o) => &o.common,
        }
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        match self {
            ExporterOptions::Parquet(o) => o.batch_policy(),
            ExporterOptions::Avro(o) => o.batch_policy(),
            ExporterOptions::Orc(o) => o.batch_policy(),
            ExporterOptions::Iceberg(o) => o.batch_policy(),
        }
    }
}

fn deserialize<T: DeserializeOwned>(format: Format, options: &OptionMap) -> Result<T> {
    serde_json::from_value(Value::Object(options.clone())).map_err(|e| {
        ExportError::configuration(format!("Invalid {} option: {}", format, e))
    })
}

fn check_unknown(format: Format, extra: BTreeMap<String, Value>, tolerant: bool) -> Result<()> {
    if extra.is_empty() {
        return Ok(());
    }
    if tolerant {
        for key in extra.keys() {
            warn!(format = %format, option = %key, "Ignoring unknown exporter option");
        }
        return Ok(());
    }
    let keys: Vec<&str> = extra.keys().map(String::as_str).collect();
    Err(ExportError::configuration(format!(
        "Unknown {} option(s): {}",
        format,
        keys.join(", ")
    )))
}

fn scalar_to_string(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ExportError::configuration(format!(
            "Property '{}' must be a string, number or boolean",
            key
        ))),
    }
}

fn string_map<'de, D>(deserializer: D) -> std::result::Result<Properties, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    raw.iter()
        .map(|(key, value)| {
            scalar_to_string(key, value)
                .map(|s| (key.clone(), s))
                .map_err(serde::de::Error::custom)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> OptionMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_parquet_defaults() {
        let opts = ParquetOptions::parse(&OptionMap::new(), false).unwrap();
        assert_eq!(opts.no_items_batch, 10_000);
        assert_eq!(opts.compression, ParquetCompression::Zstd);
        assert_eq!(opts.version, ParquetVersion::V2_6);
        assert!(opts.use_dictionary);
        assert!(opts.write_statistics);
        assert!(opts.store_schema);
        assert!(opts.pyarrow_safe_schema);
        assert!(opts.common.hasnulls);
        assert!(!opts.common.convertallstrings);
    }

    #[test]
    fn test_unknown_option_rejected_unless_tolerant() {
        let options = map(json!({"no_items_batch": 5, "bogus": 1}));
        let err = ParquetOptions::parse(&options, false).unwrap_err();
        assert!(err.to_string().contains("bogus"));

        let opts = ParquetOptions::parse(&options, true).unwrap();
        assert_eq!(opts.no_items_batch, 5);
    }

    #[test]
    fn test_common_options_flatten() {
        let options = map(json!({
            "convertallstrings": true,
            "hasnulls": false,
            "fields_to_export": ["a", "b"],
            "recordcache": 3,
            "avroschema": {"type": "record", "name": "r", "fields": []}
        }));
        let opts = AvroOptions::parse(&options, false).unwrap();
        let policy = opts.batch_policy();
        assert_eq!(policy.threshold, 3);
        assert!(policy.convert_all_strings);
        assert_eq!(
            policy.fields_to_export,
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert!(!opts.common.hasnulls);
        assert_eq!(opts.compression, AvroCodec::Deflate);
        assert_eq!(opts.syncinterval, 16_000);
    }

    #[test]
    fn test_avro_schema_required() {
        let err = AvroOptions::parse(&OptionMap::new(), false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "[E001] Invalid configuration: No avro schema defined"
        );
    }

    #[test]
    fn test_invalid_value_is_configuration_error() {
        let options = map(json!({"compression": "lzma"}));
        let err = ParquetOptions::parse(&options, false).unwrap_err();
        assert!(matches!(err, ExportError::Configuration { .. }));
    }

    #[test]
    fn test_iceberg_identifiers() {
        let options = map(json!({
            "iceberg_catalog": {
                "local": {"type": "hadoop", "warehouse": "/tmp/wh"},
                "other": {"type": "rest", "uri": "http://localhost"}
            },
            "iceberg_namespace": {"name": "mynamespace", "create_if_not_exists": true},
            "iceberg_table": {
                "name": "other_ns.scraping_data",
                "properties": {"write.parquet.compression-level": 3}
            }
        }));
        let opts = IcebergOptions::parse(&options, false).unwrap();

        let catalog = opts.catalog().unwrap().unwrap();
        assert_eq!(catalog.name, "local");
        assert_eq!(catalog.kind, CatalogKind::Filesystem);
        assert_eq!(catalog.property("warehouse"), Some("/tmp/wh"));

        let namespace = opts.namespace().unwrap();
        let table = opts.table().unwrap();
        assert_eq!(
            table.identifier(namespace),
            (vec!["other_ns".to_string()], "scraping_data".to_string())
        );
        assert_eq!(
            table.properties.get("write.parquet.compression-level"),
            Some(&"3".to_string())
        );
    }

    #[test]
    fn test_iceberg_requires_namespace_and_table() {
        let err = IcebergOptions::parse(&map(json!({"iceberg_table": {"name": "t"}})), false)
            .unwrap_err();
        assert!(err.to_string().contains("iceberg_namespace"));

        let err = IcebergOptions::parse(
            &map(json!({"iceberg_namespace": {"name": "ns"}, "iceberg_table": {}})),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("No table name"));

        let err = IcebergOptions::parse(
            &map(json!({
                "no_items_batch": 0,
                "iceberg_namespace": {"name": "ns"},
                "iceberg_table": {"name": "t"}
            })),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("smaller than 1"));
    }

    #[test]
    fn test_catalog_from_env() {
        let env = std::collections::HashMap::from([
            ("ICEBERG_CATALOG_TYPE".to_string(), "rest".to_string()),
            ("ICEBERG_URI".to_string(), "http://localhost:8181".to_string()),
        ]);
        let catalog = CatalogOptions::from_env(&env).unwrap();
        assert_eq!(catalog.kind, CatalogKind::Rest);
        assert_eq!(catalog.name, "default");
        assert_eq!(catalog.property("uri"), Some("http://localhost:8181"));

        let empty = std::collections::HashMap::<String, String>::new();
        assert!(CatalogOptions::from_env(&empty).is_err());
    }
}
