use anyhow::{anyhow, Result};
use std::path::PathBuf;
use url::Url;

/// Join a table location with a relative suffix to produce the catalog-visible path.
pub fn catalog_path(base_location: &str, suffix: &str) -> String {
    let base = base_location.trim_end_matches('/');
    let suffix = suffix.trim_start_matches('/');
    if base.is_empty() {
        suffix.to_string()
    } else if suffix.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, suffix)
    }
}

/// Local filesystem path for a location: a plain path or a `file://` URI.
///
/// Object-store schemes are rejected; data files are written with `std::fs`.
pub fn to_local_path(location: &str) -> Result<PathBuf> {
    match Url::parse(location) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map_err(|_| anyhow!("Invalid file URI: {}", location)),
        // Single letters are Windows drive prefixes, not schemes
        Ok(url) if url.scheme().len() > 1 => Err(anyhow!(
            "Unsupported storage scheme '{}' in location {}; only local paths and file:// are supported",
            url.scheme(),
            location
        )),
        _ => Ok(PathBuf::from(location)),
    }
}
