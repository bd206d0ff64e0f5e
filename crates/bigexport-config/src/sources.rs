// Configuration source loading
//
// Priority order:
// 1. Environment variables (BIGEXPORT_LOG_* overrides)
// 2. Config file path from BIGEXPORT_CONFIG
// 3. Inline config content from BIGEXPORT_CONFIG_CONTENT
// 4. Default config file (./bigexport.toml)
// 5. Defaults

use crate::env_overrides::{self, EnvSource, StdEnvSource};
use crate::FeedsConfig;
use anyhow::{Context, Result};
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "./bigexport.toml";

/// Load the feed configuration from the process environment and default paths
pub fn load_config() -> Result<FeedsConfig> {
    load_with_env(&StdEnvSource)
}

fn load_with_env(env: &dyn EnvSource) -> Result<FeedsConfig> {
    let mut config = load_from_sources(env)?.unwrap_or_default();
    env_overrides::apply_env_overrides(&mut config, env)?;
    config.validate()?;
    Ok(config)
}

fn load_from_sources(env: &dyn EnvSource) -> Result<Option<FeedsConfig>> {
    if let Some(path) = env.get("CONFIG") {
        return read_file(Path::new(&path)).map(Some);
    }

    if let Some(content) = env.get("CONFIG_CONTENT") {
        let config: FeedsConfig = toml::from_str(&content)
            .context("Failed to parse inline config from BIGEXPORT_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        return read_file(default_path).map(Some);
    }

    Ok(None)
}

fn read_file(path: &Path) -> Result<FeedsConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load configuration from a specific file path (for the CLI --config flag).
/// Environment overrides still apply on top of the file.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<FeedsConfig> {
    let mut config = read_file(path.as_ref())?;
    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}
