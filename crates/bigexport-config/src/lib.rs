// bigexport-config - exporter options and feed configuration
//
// Exporter options are parsed per format from a key/value map. Feed files
// describe several exporters at once and are loaded from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from BIGEXPORT_CONFIG env var
// 3. Config file contents from BIGEXPORT_CONFIG_CONTENT env var
// 4. Default config file (./bigexport.toml)
// 5. Defaults (lowest priority)

use anyhow::Result;
use bigexport_core::Format;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod env_overrides;
mod options;
mod sources;
mod validation;

pub use env_overrides::{apply_env_overrides, EnvSource, StdEnvSource, ENV_PREFIX};
pub use options::{
    AvroCodec, AvroOptions, CatalogKind, CatalogOptions, CommonOptions, ExporterOptions,
    FormatOptions, IcebergOptions, NamespaceOptions, OptionMap, OrcCompression,
    OrcCompressionStrategy, OrcFileVersion, OrcOptions, ParquetCompression, ParquetOptions,
    ParquetVersion, Properties, TableOptions,
};
pub use sources::{load_config, load_from_file_path};

/// Feed file: logging setup plus one entry per exporter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedsConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// One exporter: where to write, which format, and its options
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub path: PathBuf,
    pub format: Format,
    /// Ignore unknown options with a warning instead of failing
    #[serde(default)]
    pub tolerant: bool,
    #[serde(default)]
    pub options: OptionMap,
}

impl FeedConfig {
    /// Parse and validate this feed's exporter options
    pub fn exporter_options(&self) -> bigexport_core::Result<ExporterOptions> {
        ExporterOptions::parse(self.format, &self.options, self.tolerant)
    }
}

impl FeedsConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Parse a TOML document without consulting the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_feeds(self)
    }
}
