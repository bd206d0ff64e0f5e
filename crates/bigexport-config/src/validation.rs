// Configuration validation
//
// Validates that required options are present and values are sensible.
// Exporter options fail with configuration errors before any file is touched.

use crate::options::*;
use crate::FeedsConfig;
use bigexport_core::{ExportError, Result};
use std::collections::HashSet;
use tracing::warn;

fn invalid(message: impl Into<String>) -> ExportError {
    ExportError::configuration(message)
}

fn validate_common(common: &CommonOptions) -> Result<()> {
    if let Some(encoding) = &common.encoding {
        let normalized = encoding.to_lowercase().replace(['-', '_'], "");
        if normalized != "utf8" {
            return Err(invalid(format!(
                "Unsupported encoding: {}. Only UTF-8 is supported",
                encoding
            )));
        }
    }

    if let Some(fields) = &common.fields_to_export {
        if fields.is_empty() {
            return Err(invalid("fields_to_export must not be empty"));
        }
        let mut seen = HashSet::new();
        for field in fields {
            if !seen.insert(field) {
                return Err(invalid(format!(
                    "fields_to_export lists '{}' more than once",
                    field
                )));
            }
        }
    }

    Ok(())
}

fn positive(name: &str, value: Option<usize>) -> Result<()> {
    match value {
        Some(0) => Err(invalid(format!("{} must be greater than 0", name))),
        _ => Ok(()),
    }
}

fn fraction(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{} must be between 0 and 1", name)))
    }
}

pub fn validate_parquet(options: &ParquetOptions) -> Result<()> {
    validate_common(&options.common)?;

    positive("row_group_size", options.row_group_size)?;
    positive("data_page_size", options.data_page_size)?;
    positive("write_batch_size", options.write_batch_size)?;
    positive("dictionary_pagesize_limit", options.dictionary_pagesize_limit)?;

    if let Some(schema) = &options.schema {
        schema.to_arrow(options.common.hasnulls)?;
    }

    if options.compression_level.is_some()
        && matches!(
            options.compression,
            ParquetCompression::None | ParquetCompression::Snappy | ParquetCompression::Lz4
        )
    {
        warn!(
            compression = ?options.compression,
            "compression_level has no effect for this codec"
        );
    }

    if options.no_items_batch > 10_000_000 {
        warn!(
            no_items_batch = options.no_items_batch,
            "no_items_batch is very large; may cause memory issues"
        );
    }

    Ok(())
}

pub fn validate_avro(options: &AvroOptions) -> Result<()> {
    validate_common(&options.common)?;

    options.schema_json()?;

    positive("syncinterval", Some(options.syncinterval))?;

    if let Some(marker) = &options.syncmarker {
        if marker.len() != 32 || !marker.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("syncmarker must be 16 bytes written as 32 hex digits"));
        }
    }

    if let Some(level) = options.compressionlevel {
        let range = match options.compression {
            AvroCodec::Zstandard => Some(1..=22),
            AvroCodec::Bzip2 => Some(1..=9),
            AvroCodec::Xz => Some(0..=9),
            AvroCodec::Null | AvroCodec::Deflate | AvroCodec::Snappy => None,
        };
        match range {
            Some(range) if !range.contains(&level) => {
                return Err(invalid(format!(
                    "compressionlevel {} is out of range {}..={} for {:?}",
                    level,
                    range.start(),
                    range.end(),
                    options.compression
                )));
            }
            Some(_) => {}
            None => warn!(
                codec = ?options.compression,
                "compressionlevel is ignored for this codec, its default level is used"
            ),
        }
    }

    Ok(())
}

pub fn validate_orc(options: &OrcOptions) -> Result<()> {
    validate_common(&options.common)?;

    let schema = options
        .schema
        .as_ref()
        .ok_or_else(|| invalid("No orc schema defined"))?
        .to_arrow(options.common.hasnulls)?;

    positive("batch_size", Some(options.batch_size))?;
    positive("stripe_size", Some(options.stripe_size))?;
    positive("compression_block_size", Some(options.compression_block_size))?;
    fraction("padding_tolerance", options.padding_tolerance)?;
    fraction(
        "dictionary_key_size_threshold",
        options.dictionary_key_size_threshold,
    )?;

    if !(options.bloom_filter_fpp > 0.0 && options.bloom_filter_fpp < 1.0) {
        return Err(invalid("bloom_filter_fpp must be between 0 and 1 (exclusive)"));
    }

    for column in &options.bloom_filter_columns {
        if schema.field_with_name(column).is_err() {
            return Err(invalid(format!(
                "bloom_filter_columns names unknown column '{}'",
                column
            )));
        }
    }

    Ok(())
}

pub fn validate_iceberg(options: &IcebergOptions) -> Result<()> {
    validate_common(&options.common)?;

    if options.no_items_batch < 1 {
        return Err(invalid(
            "Number of items in batch processing cannot be smaller than 1",
        ));
    }

    if let Some(schema) = &options.schema {
        schema.to_arrow(options.common.hasnulls)?;
    }

    if options.catalog()?.is_none() {
        warn!("Empty Iceberg catalog specified, expecting it in BIGEXPORT_ICEBERG_* environment variables");
    }

    let namespace = options.namespace()?;
    let table = options.table()?;
    let (levels, name) = table.identifier(namespace);
    if levels.is_empty() || name.is_empty() {
        return Err(invalid(format!("Invalid Iceberg table name: {}", table.name)));
    }

    Ok(())
}

pub fn validate_feeds(config: &FeedsConfig) -> anyhow::Result<()> {
    let mut paths = HashSet::new();
    for (index, feed) in config.feeds.iter().enumerate() {
        if feed.path.as_os_str().is_empty() {
            anyhow::bail!("feeds[{}].path must not be empty", index);
        }
        if !paths.insert(&feed.path) {
            anyhow::bail!(
                "feeds[{}].path {} is used by more than one feed",
                index,
                feed.path.display()
            );
        }
    }

    if config.logging.level.trim().is_empty() {
        anyhow::bail!("logging.level must not be empty");
    }

    Ok(())
}
