//! Output formats and the startup capability probe
//!
//! Whether a format can be written is decided by which encoders were compiled
//! in. Backends report a [`Capability`]; the lifecycle checks it in
//! `start_exporting` before any record is accepted.

use crate::error::{ExportError, Result};
use crate::exporter::{Backend, Batch};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output formats supported by bigexport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Parquet,
    Avro,
    Orc,
    Iceberg,
}

impl Format {
    pub const ALL: [Format; 4] = [Format::Parquet, Format::Avro, Format::Orc, Format::Iceberg];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Parquet => "parquet",
            Format::Avro => "avro",
            Format::Orc => "orc",
            Format::Iceberg => "iceberg",
        }
    }

    /// Crate providing the encoder for this format
    pub fn dependency(&self) -> &'static str {
        match self {
            Format::Parquet => "parquet",
            Format::Avro => "apache-avro",
            Format::Orc => "orc-rust",
            Format::Iceberg => "bigexport-iceberg",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "parquet" => Ok(Format::Parquet),
            "avro" => Ok(Format::Avro),
            "orc" => Ok(Format::Orc),
            "iceberg" => Ok(Format::Iceberg),
            other => Err(ExportError::configuration(format!(
                "Unsupported format: {}. Supported: parquet, avro, orc, iceberg",
                other
            ))),
        }
    }
}

/// Result of probing a backend's encoding library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub format: Format,
    pub dependency: &'static str,
    /// Cargo feature that compiles the encoder in
    pub feature: &'static str,
    pub available: bool,
}

impl Capability {
    pub fn available(format: Format) -> Self {
        Self {
            format,
            dependency: format.dependency(),
            feature: format.as_str(),
            available: true,
        }
    }

    pub fn unavailable(format: Format) -> Self {
        Self {
            available: false,
            ..Self::available(format)
        }
    }

    /// Fail with a named-dependency error when the encoder is missing
    pub fn ensure(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(ExportError::capability_unavailable(
                self.format,
                self.dependency,
                self.feature,
            ))
        }
    }
}

/// Stand-in backend for a format whose encoder was not compiled in.
///
/// Construction succeeds so the host can register the feed; the run fails at
/// `start_exporting`.
#[derive(Debug)]
pub struct UnavailableBackend {
    format: Format,
}

impl UnavailableBackend {
    pub fn new(format: Format) -> Self {
        Self { format }
    }
}

impl Backend for UnavailableBackend {
    fn format(&self) -> Format {
        self.format
    }

    fn capability(&self) -> Capability {
        Capability::unavailable(self.format)
    }

    fn write_batch(&mut self, _batch: Batch<'_>) -> Result<()> {
        Err(ExportError::capability_unavailable(
            self.format,
            self.format.dependency(),
            self.format.as_str(),
        ))
    }
}
