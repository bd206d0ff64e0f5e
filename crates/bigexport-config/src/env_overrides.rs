// Environment variable access and overrides
//
// Reads go through `EnvSource` so tests can supply a map instead of the
// process environment.

use crate::{FeedsConfig, LogFormat};
use anyhow::{bail, Result};
use std::collections::HashMap;

/// Prefix of every bigexport environment variable
pub const ENV_PREFIX: &str = "BIGEXPORT_";

pub trait EnvSource {
    /// Look up `BIGEXPORT_<key>`
    fn get(&self, key: &str) -> Option<String>;
}

/// Process environment
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }
}

/// Keys are given without the prefix
impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Apply `BIGEXPORT_LOG_LEVEL` and `BIGEXPORT_LOG_FORMAT`
pub fn apply_env_overrides(config: &mut FeedsConfig, env: &dyn EnvSource) -> Result<()> {
    if let Some(level) = env.get("LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.logging.format = match format.to_lowercase().as_str() {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => bail!(
                "Invalid {}LOG_FORMAT: {}. Supported: text, json",
                ENV_PREFIX,
                other
            ),
        };
    }
    Ok(())
}
