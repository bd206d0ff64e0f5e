//! Arrow <-> Iceberg schema conversion
//!
//! New tables get their Iceberg schema from the Arrow schema of the first
//! batch. Data files are always written with the table's current schema
//! converted back to Arrow, carrying `PARQUET:field_id` metadata so the
//! Parquet columns map to Iceberg field IDs.

use crate::types::{NestedField, PrimitiveType, Schema, Type};
use anyhow::{anyhow, Context, Result};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema, SchemaRef, TimeUnit};
use parquet::arrow::PARQUET_FIELD_ID_META_KEY;
use std::collections::HashMap;
use std::sync::Arc;

/// Convert an Arrow schema to an Iceberg schema.
///
/// Field IDs come from `PARQUET:field_id` metadata when every field has one,
/// otherwise they are assigned: top-level fields first, then nested IDs.
pub fn arrow_to_iceberg_schema(arrow_schema: &ArrowSchema) -> Result<Schema> {
    let all_have_ids = arrow_schema
        .fields()
        .iter()
        .all(|f| f.metadata().contains_key(PARQUET_FIELD_ID_META_KEY));

    let mut next_id = arrow_schema.fields().len() as i32 + 1;
    let mut fields = Vec::with_capacity(arrow_schema.fields().len());
    for (index, arrow_field) in arrow_schema.fields().iter().enumerate() {
        let id = if all_have_ids {
            field_id(arrow_field)?
        } else {
            index as i32 + 1
        };
        let field_type = convert_data_type(arrow_field.data_type(), arrow_field.name(), &mut next_id)?;
        fields.push(NestedField {
            id,
            name: arrow_field.name().to_string(),
            required: !arrow_field.is_nullable(),
            field_type,
            doc: None,
        });
    }

    Ok(Schema::new(0, fields))
}

fn field_id(field: &Field) -> Result<i32> {
    field
        .metadata()
        .get(PARQUET_FIELD_ID_META_KEY)
        .ok_or_else(|| anyhow!("Field '{}' is missing PARQUET:field_id metadata", field.name()))?
        .parse::<i32>()
        .with_context(|| format!("Failed to parse PARQUET:field_id for field '{}'", field.name()))
}

/// Convert Arrow DataType to Iceberg Type
///
/// Iceberg has no unsigned integers: `UInt32` widens to `long`, `UInt64` is
/// rejected.
fn convert_data_type(data_type: &DataType, field_name: &str, next_id: &mut i32) -> Result<Type> {
    let primitive = match data_type {
        DataType::Boolean => PrimitiveType::Boolean,
        DataType::Int8 | DataType::Int16 | DataType::Int32 => PrimitiveType::Int,
        DataType::UInt8 | DataType::UInt16 => PrimitiveType::Int,
        DataType::Int64 | DataType::UInt32 => PrimitiveType::Long,
        DataType::UInt64 => {
            return Err(anyhow!(
                "Field '{}' has type UInt64 which cannot be represented in Iceberg",
                field_name
            ))
        }
        DataType::Float16 | DataType::Float32 => PrimitiveType::Float,
        DataType::Float64 => PrimitiveType::Double,
        DataType::Utf8 | DataType::LargeUtf8 => PrimitiveType::String,
        DataType::Binary | DataType::LargeBinary => PrimitiveType::Binary,
        DataType::FixedSizeBinary(len) => PrimitiveType::Fixed(*len as u64),
        DataType::Timestamp(TimeUnit::Microsecond | TimeUnit::Nanosecond, Some(_)) => {
            PrimitiveType::Timestamptz
        }
        DataType::Timestamp(TimeUnit::Microsecond | TimeUnit::Nanosecond, None) => {
            PrimitiveType::Timestamp
        }
        DataType::Date32 => PrimitiveType::Date,
        DataType::Time64(TimeUnit::Microsecond) => PrimitiveType::Time,
        DataType::Decimal128(precision, scale) => PrimitiveType::Decimal {
            precision: *precision as u32,
            scale: *scale as u32,
        },
        DataType::List(item) | DataType::LargeList(item) => {
            let element_id = *next_id;
            *next_id += 1;
            let element = convert_data_type(item.data_type(), field_name, next_id)?;
            return Ok(Type::list(element_id, element, !item.is_nullable()));
        }
        other => {
            return Err(anyhow!(
                "Unsupported Arrow type for field '{}': {}",
                field_name,
                other
            ))
        }
    };
    Ok(Type::Primitive(primitive))
}

/// Convert the table schema to Arrow, with field IDs in field metadata
pub fn iceberg_to_arrow_schema(schema: &Schema) -> Result<SchemaRef> {
    let fields = schema
        .fields
        .iter()
        .map(|field| arrow_field(&field.name, field.id, &field.field_type, !field.required))
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(ArrowSchema::new(fields)))
}

fn arrow_field(name: &str, id: i32, field_type: &Type, nullable: bool) -> Result<Field> {
    let metadata = HashMap::from([(PARQUET_FIELD_ID_META_KEY.to_string(), id.to_string())]);
    Ok(Field::new(name, arrow_type(name, field_type)?, nullable).with_metadata(metadata))
}

fn arrow_type(name: &str, field_type: &Type) -> Result<DataType> {
    let data_type = match field_type {
        Type::Primitive(primitive) => match primitive {
            PrimitiveType::Boolean => DataType::Boolean,
            PrimitiveType::Int => DataType::Int32,
            PrimitiveType::Long => DataType::Int64,
            PrimitiveType::Float => DataType::Float32,
            PrimitiveType::Double => DataType::Float64,
            PrimitiveType::Decimal { precision, scale } => {
                DataType::Decimal128(*precision as u8, *scale as i8)
            }
            PrimitiveType::Date => DataType::Date32,
            PrimitiveType::Time => DataType::Time64(TimeUnit::Microsecond),
            PrimitiveType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
            PrimitiveType::Timestamptz => {
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
            }
            PrimitiveType::String => DataType::Utf8,
            PrimitiveType::Uuid => DataType::FixedSizeBinary(16),
            PrimitiveType::Fixed(len) => DataType::FixedSizeBinary(*len as i32),
            PrimitiveType::Binary => DataType::Binary,
        },
        Type::List(list) => DataType::List(Arc::new(arrow_field(
            "element",
            list.element_id,
            &list.element,
            !list.element_required,
        )?)),
        Type::Struct(_) | Type::Map(_) => {
            return Err(anyhow!(
                "Column '{}' has a struct or map type, which records cannot fill",
                name
            ))
        }
    };
    Ok(data_type)
}
