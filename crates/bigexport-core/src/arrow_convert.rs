//! Conversion of buffered records into Arrow record batches

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryBuilder, BooleanBuilder, Date32Builder, Float32Builder, Float64Builder,
    Int16Builder, Int32Builder, Int64Builder, Int8Builder, ListArray, RecordBatch,
    StringBuilder, TimestampMicrosecondBuilder,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::{DataType, FieldRef, SchemaRef, TimeUnit};
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{ExportError, Result};
use crate::record::{Record, Value};

/// Value conversion rules for an explicit schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coercion {
    /// Range-check integer narrowing instead of wrapping
    pub safe: bool,
}

impl Default for Coercion {
    fn default() -> Self {
        Self { safe: true }
    }
}

/// Build a `RecordBatch` with `schema` from records.
///
/// Columns are looked up by schema field name; fields a record lacks are null.
pub fn records_to_batch(
    schema: &SchemaRef,
    records: &[Record],
    coercion: Coercion,
) -> Result<RecordBatch> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let values: Vec<&Value> = records
                .iter()
                .map(|record| record.get(field.name()).unwrap_or(&Value::Null))
                .collect();
            if !field.is_nullable() {
                if let Some(row) = values.iter().position(|v| v.is_null()) {
                    return Err(ExportError::encoding(
                        field.name(),
                        format!("null value in non-nullable column (row {})", row),
                    ));
                }
            }
            build_array(field.name(), field.data_type(), &values, coercion)
        })
        .collect::<Result<Vec<_>>>()?;

    RecordBatch::try_new(schema.clone(), columns)
        .map_err(|e| ExportError::encoding("<batch>", e.to_string()))
}

fn mismatch(field: &str, expected: &str, value: &Value) -> ExportError {
    ExportError::encoding(
        field,
        format!("expected {}, got {}", expected, value.kind()),
    )
}

macro_rules! build_int {
    ($builder:ty, $native:ty, $field:expr, $values:expr, $coercion:expr) => {{
        let mut builder = <$builder>::with_capacity($values.len());
        for value in $values {
            match value {
                Value::Null => builder.append_null(),
                Value::Int(i) => {
                    let narrowed = if $coercion.safe {
                        <$native>::try_from(*i).map_err(|_| {
                            ExportError::encoding(
                                $field,
                                format!("integer {} out of range for {}", i, stringify!($native)),
                            )
                        })?
                    } else {
                        *i as $native
                    };
                    builder.append_value(narrowed)
                }
                Value::Bool(b) if !$coercion.safe => builder.append_value(*b as $native),
                other => return Err(mismatch($field, "int", other)),
            }
        }
        Arc::new(builder.finish()) as ArrayRef
    }};
}

fn build_array(
    field: &str,
    data_type: &DataType,
    values: &[&Value],
    coercion: Coercion,
) -> Result<ArrayRef> {
    let array: ArrayRef = match data_type {
        DataType::Utf8 => {
            let mut builder = StringBuilder::with_capacity(values.len(), values.len() * 16);
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Str(s) => builder.append_value(s),
                    Value::Map(_) => builder.append_value(value.to_json().to_string()),
                    other => return Err(mismatch(field, "string", other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Binary => {
            let mut builder = BinaryBuilder::with_capacity(values.len(), values.len() * 16);
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Str(s) => builder.append_value(s.as_bytes()),
                    other => return Err(mismatch(field, "binary", other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(values.len());
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Bool(b) => builder.append_value(*b),
                    other => return Err(mismatch(field, "bool", other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Int8 => build_int!(Int8Builder, i8, field, values, coercion),
        DataType::Int16 => build_int!(Int16Builder, i16, field, values, coercion),
        DataType::Int32 => build_int!(Int32Builder, i32, field, values, coercion),
        DataType::Int64 => build_int!(Int64Builder, i64, field, values, coercion),
        DataType::Float32 => {
            let mut builder = Float32Builder::with_capacity(values.len());
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Float(f) => builder.append_value(*f as f32),
                    Value::Int(i) => builder.append_value(*i as f32),
                    other => return Err(mismatch(field, "float", other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(values.len());
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Float(f) => builder.append_value(*f),
                    Value::Int(i) => builder.append_value(*i as f64),
                    other => return Err(mismatch(field, "float", other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            let mut builder = TimestampMicrosecondBuilder::with_capacity(values.len())
                .with_data_type(data_type.clone());
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Timestamp(ts) => builder.append_value(ts.timestamp_micros()),
                    Value::Str(s) => builder.append_value(parse_timestamp(field, s)?.timestamp_micros()),
                    other => return Err(mismatch(field, "timestamp", other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Date32 => {
            let mut builder = Date32Builder::with_capacity(values.len());
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Timestamp(ts) => builder.append_value(days_since_epoch(ts.date_naive())),
                    Value::Str(s) => {
                        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
                            ExportError::encoding(field, format!("invalid date '{}': {}", s, e))
                        })?;
                        builder.append_value(days_since_epoch(date))
                    }
                    other => return Err(mismatch(field, "date", other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::List(item) => build_list(field, item, values, coercion)?,
        other => {
            return Err(ExportError::encoding(
                field,
                format!("unsupported column type {}", other),
            ))
        }
    };
    Ok(array)
}

fn build_list(
    field: &str,
    item: &FieldRef,
    values: &[&Value],
    coercion: Coercion,
) -> Result<ArrayRef> {
    let mut lengths = Vec::with_capacity(values.len());
    let mut validity = Vec::with_capacity(values.len());
    let mut children: Vec<&Value> = Vec::new();

    for value in values {
        match value {
            Value::Null => {
                lengths.push(0);
                validity.push(false);
            }
            Value::List(items) => {
                lengths.push(items.len());
                validity.push(true);
                children.extend(items.iter());
            }
            other => return Err(mismatch(field, "list", other)),
        }
    }

    let child = build_array(field, item.data_type(), &children, coercion)?;
    let nulls = if validity.iter().all(|v| *v) {
        None
    } else {
        Some(NullBuffer::from(validity))
    };
    let list = ListArray::try_new(item.clone(), OffsetBuffer::from_lengths(lengths), child, nulls)
        .map_err(|e| ExportError::encoding(field, e.to_string()))?;
    Ok(Arc::new(list))
}

fn parse_timestamp(field: &str, text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ExportError::encoding(field, format!("invalid timestamp '{}': {}", text, e)))
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    date.signed_duration_since(NaiveDate::default()).num_days() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{infer_schema, SchemaSpec};
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Int16Type, Int64Type};
    use chrono::TimeZone;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_inferred_round_trip() {
        let records = vec![
            Record::new()
                .with("text", "hello")
                .with("tags", vec!["a", "b", "c"])
                .with("n", 3i64),
            Record::new()
                .with("text", Value::Null)
                .with("tags", Value::Null)
                .with("n", 4i64),
        ];
        let schema = infer_schema(&columns(&["text", "tags", "n"]), &records, true).unwrap();
        let batch = records_to_batch(&schema, &records, Coercion::default()).unwrap();

        assert_eq!(batch.num_rows(), 2);
        let text = batch.column(0).as_string::<i32>();
        assert_eq!(text.value(0), "hello");
        assert!(text.is_null(1));

        let tags = batch.column(1).as_list::<i32>();
        let first = tags.value(0);
        let first = first.as_string::<i32>();
        assert_eq!(first.len(), 3);
        assert_eq!(first.value(2), "c");
        assert!(tags.is_null(1));

        let n = batch.column(2).as_primitive::<Int64Type>();
        assert_eq!(n.value(1), 4);
    }

    #[test]
    fn test_safe_narrowing_rejects_overflow() {
        let schema = SchemaSpec::TypeString("struct<v:smallint>".into())
            .to_arrow(true)
            .unwrap();
        let records = vec![Record::new().with("v", 70_000i64)];

        let err = records_to_batch(&schema, &records, Coercion { safe: true }).unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let batch = records_to_batch(&schema, &records, Coercion { safe: false }).unwrap();
        assert_eq!(
            batch.column(0).as_primitive::<Int16Type>().value(0),
            70_000i64 as i16
        );
    }

    #[test]
    fn test_non_nullable_column_rejects_null() {
        let schema = SchemaSpec::TypeString("struct<v:bigint>".into())
            .to_arrow(false)
            .unwrap();
        let records = vec![Record::new().with("v", Value::Null)];
        let err = records_to_batch(&schema, &records, Coercion::default()).unwrap_err();
        assert!(matches!(err, ExportError::Encoding { .. }));
    }

    #[test]
    fn test_timestamps_and_dates() {
        let schema = SchemaSpec::TypeString("struct<ts:timestamp,day:date>".into())
            .to_arrow(true)
            .unwrap();
        let ts = Utc.with_ymd_and_hms(1970, 1, 2, 0, 0, 1).unwrap();
        let records = vec![
            Record::new().with("ts", ts).with("day", ts),
            Record::new()
                .with("ts", "1970-01-01T00:00:00Z")
                .with("day", "1970-01-03"),
        ];
        let batch = records_to_batch(&schema, &records, Coercion::default()).unwrap();
        let ts_col = batch
            .column(0)
            .as_primitive::<arrow::datatypes::TimestampMicrosecondType>();
        assert_eq!(ts_col.value(0), 86_401_000_000);
        assert_eq!(ts_col.value(1), 0);
        let day_col = batch
            .column(1)
            .as_primitive::<arrow::datatypes::Date32Type>();
        assert_eq!(day_col.value(0), 1);
        assert_eq!(day_col.value(1), 2);
    }

    #[test]
    fn test_type_mismatch_names_field() {
        let schema = SchemaSpec::TypeString("struct<flag:boolean>".into())
            .to_arrow(true)
            .unwrap();
        let records = vec![Record::new().with("flag", "yes")];
        let err = records_to_batch(&schema, &records, Coercion::default()).unwrap_err();
        assert!(err.to_string().contains("'flag'"));
    }
}
