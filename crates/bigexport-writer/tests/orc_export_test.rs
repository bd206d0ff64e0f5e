// ORC files written through the batch exporter and read back
#![cfg(feature = "orc")]

use std::fs::File;
use std::path::Path;

use arrow::array::{AsArray, RecordBatch};
use arrow::datatypes::{Float64Type, Int64Type};
use bigexport_config::{FormatOptions, OptionMap, OrcOptions};
use bigexport_core::{BatchExporter, ErrorCode, ItemExporter, Record};
use bigexport_writer::OrcBackend;
use orc_rust::arrow_reader::ArrowReaderBuilder;
use serde_json::json;

fn options(value: serde_json::Value) -> OrcOptions {
    let map: OptionMap = value.as_object().cloned().unwrap_or_default();
    OrcOptions::parse(&map, false).unwrap()
}

fn run(path: &Path, opts: &OrcOptions, count: i64) {
    let backend = OrcBackend::new(path, opts).unwrap();
    let policy = opts
        .batch_policy()
        .with_fields_to_export(Some(backend.schema_columns()));
    let mut exporter = BatchExporter::new(backend, policy);
    exporter.start_exporting().unwrap();
    for i in 0..count {
        exporter
            .export_item(
                Record::new()
                    .with("text", format!("quote {}", i))
                    .with("rating", i)
                    .with("score", i as f64 / 2.0),
            )
            .unwrap();
    }
    exporter.finish_exporting().unwrap();
}

fn read(path: &Path) -> Vec<RecordBatch> {
    ArrowReaderBuilder::try_new(File::open(path).unwrap())
        .unwrap()
        .build()
        .map(|b| b.unwrap())
        .collect()
}

#[test]
fn test_scalar_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quotes.orc");
    let opts = options(json!({
        "schema": "struct<text:string,rating:bigint,score:double>",
        "no_items_batch": 2
    }));

    run(&path, &opts, 5);

    let batches = read(&path);
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 5);

    let batch = &batches[0];
    assert_eq!(batch.column(0).as_string::<i32>().value(1), "quote 1");
    assert_eq!(batch.column(1).as_primitive::<Int64Type>().value(2), 2);
    assert_eq!(batch.column(2).as_primitive::<Float64Type>().value(1), 0.5);
}

#[test]
fn test_string_mode_with_string_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quotes.orc");
    let opts = options(json!({
        "schema": "struct<text:string,rating:string,score:string>",
        "convertallstrings": true
    }));

    run(&path, &opts, 3);

    let batches = read(&path);
    assert_eq!(batches[0].column(1).as_string::<i32>().value(2), "2");
    assert_eq!(batches[0].column(2).as_string::<i32>().value(1), "0.5");
}

#[test]
fn test_empty_run_writes_valid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.orc");
    let opts = options(json!({"schema": "struct<text:string>"}));

    run(&path, &opts, 0);

    let rows: usize = read(&path).iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 0);
}

#[test]
fn test_list_column_is_rejected_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quotes.orc");
    let opts = options(json!({"schema": "struct<text:string,tags:array<string>>"}));

    let err = OrcBackend::new(&path, &opts).err().unwrap();
    assert_eq!(err.code(), ErrorCode::E001InvalidConfig);
    assert!(err.to_string().contains("'tags'"));
    assert!(!path.exists());
}

#[test]
fn test_string_mode_renders_lists_as_literals() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quotes.orc");
    let opts = options(json!({
        "schema": "struct<text:string,tags:string>",
        "convertallstrings": true
    }));

    let backend = OrcBackend::new(&path, &opts).unwrap();
    let policy = opts
        .batch_policy()
        .with_fields_to_export(Some(backend.schema_columns()));
    let mut exporter = BatchExporter::new(backend, policy);
    exporter.start_exporting().unwrap();
    exporter
        .export_item(
            Record::new()
                .with("text", "a quote")
                .with("tags", vec!["a", "b", "c"]),
        )
        .unwrap();
    exporter.finish_exporting().unwrap();

    let batches = read(&path);
    assert_eq!(batches[0].column(0).as_string::<i32>().value(0), "a quote");
    assert_eq!(
        batches[0].column(1).as_string::<i32>().value(0),
        "['a', 'b', 'c']"
    );
}
