//! File exporters for bigexport
//!
//! Parquet, Avro and ORC backends for the batch exporter in `bigexport-core`.
//! Each encoder sits behind a cargo feature of the same name; a build without
//! it still answers `capability` so callers can fail with a clear message.

mod sink;

#[cfg(feature = "avro")]
pub mod avro;
#[cfg(feature = "orc")]
pub mod orc;
#[cfg(feature = "parquet")]
pub mod parquet;

pub use sink::FileSink;

#[cfg(feature = "avro")]
pub use self::avro::AvroBackend;
#[cfg(feature = "orc")]
pub use self::orc::OrcBackend;
#[cfg(feature = "parquet")]
pub use self::parquet::ParquetBackend;

use bigexport_core::{Capability, Format};

/// Whether this build carries the encoder for a file format.
///
/// Iceberg lives in its own crate and is reported unavailable here.
pub fn capability(format: Format) -> Capability {
    let compiled = match format {
        Format::Parquet => cfg!(feature = "parquet"),
        Format::Avro => cfg!(feature = "avro"),
        Format::Orc => cfg!(feature = "orc"),
        Format::Iceberg => false,
    };
    if compiled {
        Capability::available(format)
    } else {
        Capability::unavailable(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_follows_features() {
        assert_eq!(
            capability(Format::Parquet).available,
            cfg!(feature = "parquet")
        );
        assert_eq!(capability(Format::Orc).available, cfg!(feature = "orc"));
        assert!(!capability(Format::Iceberg).available);
    }
}
