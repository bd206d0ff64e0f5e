//! Convert Parquet write results to Iceberg DataFile descriptors
//!
//! Extracts metadata and statistics from Parquet files for Iceberg commits.

use crate::types::{DataContentType, DataFile, DataFileFormat, Schema};
use anyhow::{Context, Result};
use parquet::file::metadata::ParquetMetaData;
use parquet::file::statistics::Statistics;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Typed bound, compared by value rather than by encoded bytes
#[derive(Debug, Clone, PartialEq, PartialOrd)]
enum Bound {
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
}

impl Bound {
    /// Iceberg single-value binary serialization
    fn into_bytes(self) -> Vec<u8> {
        match self {
            Bound::Boolean(v) => vec![v as u8],
            Bound::Int(v) => v.to_le_bytes().to_vec(),
            Bound::Long(v) => v.to_le_bytes().to_vec(),
            Bound::Float(v) => v.to_le_bytes().to_vec(),
            Bound::Double(v) => v.to_le_bytes().to_vec(),
            Bound::Bytes(v) => v,
        }
    }
}

fn bounds(stats: &Statistics) -> Option<(Bound, Bound)> {
    match stats {
        Statistics::Boolean(s) => Some((Bound::Boolean(*s.min_opt()?), Bound::Boolean(*s.max_opt()?))),
        Statistics::Int32(s) => Some((Bound::Int(*s.min_opt()?), Bound::Int(*s.max_opt()?))),
        Statistics::Int64(s) => Some((Bound::Long(*s.min_opt()?), Bound::Long(*s.max_opt()?))),
        Statistics::Float(s) => Some((Bound::Float(*s.min_opt()?), Bound::Float(*s.max_opt()?))),
        Statistics::Double(s) => Some((Bound::Double(*s.min_opt()?), Bound::Double(*s.max_opt()?))),
        Statistics::ByteArray(s) => Some((
            Bound::Bytes(s.min_opt()?.data().to_vec()),
            Bound::Bytes(s.max_opt()?.data().to_vec()),
        )),
        Statistics::FixedLenByteArray(s) => Some((
            Bound::Bytes(s.min_opt()?.data().to_vec()),
            Bound::Bytes(s.max_opt()?.data().to_vec()),
        )),
        Statistics::Int96(_) => None,
    }
}

fn keep(current: &mut Option<Bound>, candidate: Bound, wanted: Ordering) {
    let replace = match current {
        None => true,
        Some(existing) => candidate.partial_cmp(existing) == Some(wanted),
    };
    if replace {
        *current = Some(candidate);
    }
}

/// Build the DataFile for a Parquet file written at `file_path`
///
/// Statistics of top-level columns are aggregated across row groups and keyed
/// by the Iceberg field ID of the column with the same name. Nested columns
/// only contribute to the file totals.
pub fn build_data_file(
    file_path: &str,
    file_size: u64,
    parquet_metadata: &ParquetMetaData,
    schema: &Schema,
) -> Result<DataFile> {
    let record_count = parquet_metadata.file_metadata().num_rows().max(0) as u64;
    debug!(
        path = %file_path,
        row_count = record_count,
        file_size,
        num_row_groups = parquet_metadata.num_row_groups(),
        "constructing iceberg DataFile from Parquet metadata"
    );

    let mut column_sizes = BTreeMap::new();
    let mut value_counts = BTreeMap::new();
    let mut null_value_counts = BTreeMap::new();
    let mut lower_bounds = BTreeMap::new();
    let mut upper_bounds = BTreeMap::new();

    let schema_descr = parquet_metadata.file_metadata().schema_descr();
    for column_idx in 0..schema_descr.num_columns() {
        let column_path = schema_descr.column(column_idx).path().parts().to_vec();
        if column_path.len() != 1 {
            continue;
        }
        let Some(field) = schema.field_by_name(&column_path[0]) else {
            debug!(
                column = %column_path[0],
                "Column in Parquet file not found in Iceberg schema, skipping statistics"
            );
            continue;
        };

        let mut total_size = 0u64;
        let mut total_values = 0u64;
        let mut total_nulls = 0u64;
        let mut col_min: Option<Bound> = None;
        let mut col_max: Option<Bound> = None;

        for row_group in parquet_metadata.row_groups() {
            let column_chunk = row_group.column(column_idx);
            total_size += column_chunk.compressed_size().max(0) as u64;
            total_values += column_chunk.num_values().max(0) as u64;

            if let Some(stats) = column_chunk.statistics() {
                total_nulls += stats.null_count_opt().unwrap_or(0);
                if let Some((min, max)) = bounds(stats) {
                    keep(&mut col_min, min, Ordering::Less);
                    keep(&mut col_max, max, Ordering::Greater);
                }
            }
        }

        column_sizes.insert(field.id, total_size);
        value_counts.insert(field.id, total_values);
        null_value_counts.insert(field.id, total_nulls);
        if let Some(min) = col_min {
            lower_bounds.insert(field.id, min.into_bytes());
        }
        if let Some(max) = col_max {
            upper_bounds.insert(field.id, max.into_bytes());
        }
    }

    // Row group starts, from the first column chunk
    let split_offsets = parquet_metadata
        .row_groups()
        .iter()
        .filter(|rg| rg.num_columns() > 0)
        .map(|rg| {
            let first = rg.column(0);
            first
                .dictionary_page_offset()
                .unwrap_or_else(|| first.data_page_offset())
        })
        .collect();

    DataFile::builder()
        .content(DataContentType::Data)
        .file_path(file_path)
        .file_format(DataFileFormat::Parquet)
        .record_count(record_count)
        .file_size_in_bytes(file_size)
        .column_sizes(column_sizes)
        .value_counts(value_counts)
        .null_value_counts(null_value_counts)
        .lower_bounds(lower_bounds)
        .upper_bounds(upper_bounds)
        .split_offsets(split_offsets)
        .build()
        .context("failed to build Iceberg DataFile from Parquet metadata")
}
