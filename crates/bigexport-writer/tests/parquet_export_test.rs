// Parquet files written through the batch exporter and read back
#![cfg(feature = "parquet")]

use std::fs::File;
use std::path::Path;

use arrow::array::{Array, AsArray, RecordBatch};
use arrow::datatypes::Int64Type;
use bigexport_config::{FormatOptions, OptionMap, ParquetOptions};
use bigexport_core::{BatchExporter, ItemExporter, Record};
use bigexport_writer::ParquetBackend;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::json;

fn options(value: serde_json::Value) -> ParquetOptions {
    let map: OptionMap = value.as_object().cloned().unwrap_or_default();
    ParquetOptions::parse(&map, false).unwrap()
}

fn quote(i: i64) -> Record {
    Record::new()
        .with("text", format!("quote {}", i))
        .with("rating", i)
        .with("tags", vec!["a", "b", "c"])
}

fn export(path: &Path, opts: &ParquetOptions, count: i64) -> Box<dyn ItemExporter> {
    let backend = ParquetBackend::new(path, opts).unwrap();
    let mut exporter: Box<dyn ItemExporter> =
        Box::new(BatchExporter::new(backend, opts.batch_policy()));
    exporter.start_exporting().unwrap();
    for i in 0..count {
        exporter.export_item(quote(i)).unwrap();
    }
    exporter
}

fn read(path: &Path) -> (usize, Vec<RecordBatch>) {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path).unwrap()).unwrap();
    let row_groups = builder.metadata().num_row_groups();
    let batches = builder.build().unwrap().map(|b| b.unwrap()).collect();
    (row_groups, batches)
}

#[test]
fn test_typed_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quotes.parquet");
    let opts = options(json!({}));

    let mut exporter = export(&path, &opts, 3);
    let summary = exporter.finish_exporting().unwrap();
    assert_eq!(summary.records_exported, 3);

    let (_, batches) = read(&path);
    let batch = &batches[0];
    assert_eq!(batch.num_rows(), 3);

    let text = batch.column_by_name("text").unwrap().as_string::<i32>();
    assert_eq!(text.value(1), "quote 1");
    let rating = batch
        .column_by_name("rating")
        .unwrap()
        .as_primitive::<Int64Type>();
    assert_eq!(rating.value(2), 2);
    let tags = batch.column_by_name("tags").unwrap().as_list::<i32>();
    let first = tags.value(0);
    let first = first.as_string::<i32>();
    assert_eq!(first.len(), 3);
    assert_eq!(first.value(2), "c");
}

#[test]
fn test_string_mode_renders_lists_as_literals() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quotes.parquet");
    let opts = options(json!({"convertallstrings": true}));

    let mut exporter = export(&path, &opts, 2);
    exporter.finish_exporting().unwrap();

    let (_, batches) = read(&path);
    let tags = batches[0].column_by_name("tags").unwrap().as_string::<i32>();
    assert_eq!(tags.value(0), "['a', 'b', 'c']");
    let rating = batches[0].column_by_name("rating").unwrap().as_string::<i32>();
    assert_eq!(rating.value(1), "1");
}

#[test]
fn test_each_flush_is_a_row_group() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quotes.parquet");
    let opts = options(json!({"no_items_batch": 3}));

    let mut exporter = export(&path, &opts, 10);
    let summary = exporter.finish_exporting().unwrap();
    assert_eq!(summary.batches_flushed, 3);

    let (row_groups, batches) = read(&path);
    assert_eq!(row_groups, 3);
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 10);
}

#[test]
fn test_explicit_schema_with_empty_run_writes_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.parquet");
    let opts = options(json!({"schema": "struct<text:string,rating:bigint>"}));

    let mut exporter = export(&path, &opts, 0);
    exporter.finish_exporting().unwrap();

    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap()).unwrap();
    assert_eq!(builder.schema().fields().len(), 2);
    assert_eq!(builder.metadata().file_metadata().num_rows(), 0);
}

#[test]
fn test_inferred_schema_with_empty_run_leaves_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.parquet");

    let mut exporter = export(&path, &options(json!({})), 0);
    exporter.finish_exporting().unwrap();

    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
}
