//! Arrow schemas for exported columns
//!
//! A schema is either given explicitly, as a type string such as
//! `struct<text:string,tags:array<string>>` or as a list of field entries,
//! or inferred from the first flushed batch.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use serde::Deserialize;

use crate::error::{ExportError, Result};
use crate::record::{Record, Value};

/// One entry of a field-list schema
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

/// Explicit schema as written in exporter options
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SchemaSpec {
    TypeString(String),
    Fields(Vec<FieldSpec>),
}

impl SchemaSpec {
    /// Build the Arrow schema. `nullable` applies to type-string schemas,
    /// field lists carry their own flag.
    pub fn to_arrow(&self, nullable: bool) -> Result<SchemaRef> {
        let fields = match self {
            SchemaSpec::TypeString(s) => parse_struct_type(s, nullable)?,
            SchemaSpec::Fields(specs) => {
                if specs.is_empty() {
                    return Err(ExportError::configuration("Schema has no fields"));
                }
                specs
                    .iter()
                    .map(|spec| {
                        Ok(Field::new(
                            spec.name.clone(),
                            parse_type(&spec.data_type)?,
                            spec.nullable,
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?
            }
        };
        check_unique_names(&fields)?;
        Ok(Arc::new(Schema::new(fields)))
    }
}

fn check_unique_names(fields: &[Field]) -> Result<()> {
    for (i, field) in fields.iter().enumerate() {
        if fields[..i].iter().any(|f| f.name() == field.name()) {
            return Err(ExportError::configuration(format!(
                "Duplicate field '{}' in schema",
                field.name()
            )));
        }
    }
    Ok(())
}

/// Parse a single type expression such as `bigint` or `array<string>`
pub fn parse_type(text: &str) -> Result<DataType> {
    let mut parser = TypeParser::new(text);
    let data_type = parser.parse_type()?;
    parser.expect_end()?;
    if matches!(data_type, DataType::Struct(_)) {
        return Err(ExportError::configuration(format!(
            "Nested struct columns are not supported: {}",
            text
        )));
    }
    Ok(data_type)
}

/// Parse a top-level `struct<...>` into its column fields
pub fn parse_struct_type(text: &str, nullable: bool) -> Result<Vec<Field>> {
    let mut parser = TypeParser::new(text);
    let fields = parser.parse_top_level(nullable)?;
    parser.expect_end()?;
    Ok(fields)
}

struct TypeParser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.text.len() - trimmed.len();
    }

    fn error(&self, what: &str) -> ExportError {
        ExportError::configuration(format!(
            "Invalid schema type '{}': {} at position {}",
            self.text, what, self.pos
        ))
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c)))
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        self.skip_whitespace();
        if self.rest().is_empty() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing input"))
        }
    }

    fn ident(&mut self) -> Result<String> {
        self.skip_whitespace();
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(self.rest().len());
        if len == 0 {
            return Err(self.error("expected a type name"));
        }
        let ident = self.rest()[..len].to_ascii_lowercase();
        self.pos += len;
        Ok(ident)
    }

    // Field names run up to the ':' separator
    fn field_name(&mut self) -> Result<String> {
        self.skip_whitespace();
        let len = self
            .rest()
            .find([':', ',', '<', '>'])
            .ok_or_else(|| self.error("expected ':' after field name"))?;
        let name = self.rest()[..len].trim().trim_matches('`').to_string();
        if name.is_empty() {
            return Err(self.error("empty field name"));
        }
        self.pos += len;
        Ok(name)
    }

    // `varchar(20)`, `char(1)` and `decimal(p,s)` carry size arguments
    fn skip_size_arguments(&mut self) -> Result<()> {
        if self.eat('(') {
            let close = self
                .rest()
                .find(')')
                .ok_or_else(|| self.error("unclosed '('"))?;
            self.pos += close + 1;
        }
        Ok(())
    }

    fn parse_top_level(&mut self, nullable: bool) -> Result<Vec<Field>> {
        let name = self.ident()?;
        if name != "struct" {
            return Err(self.error("top-level type must be struct<...>"));
        }
        let fields = self.struct_fields(nullable)?;
        if fields.is_empty() {
            return Err(self.error("struct has no fields"));
        }
        Ok(fields)
    }

    fn struct_fields(&mut self, nullable: bool) -> Result<Vec<Field>> {
        self.expect('<')?;
        let mut fields = Vec::new();
        if self.eat('>') {
            return Ok(fields);
        }
        loop {
            let name = self.field_name()?;
            self.expect(':')?;
            let data_type = self.parse_type()?;
            fields.push(Field::new(name, data_type, nullable));
            if self.eat(',') {
                continue;
            }
            self.expect('>')?;
            return Ok(fields);
        }
    }

    fn parse_type(&mut self) -> Result<DataType> {
        let name = self.ident()?;
        let data_type = match name.as_str() {
            "struct" => DataType::Struct(self.struct_fields(true)?.into()),
            "array" | "list" => {
                self.expect('<')?;
                let item = self.parse_type()?;
                self.expect('>')?;
                DataType::List(Arc::new(Field::new("item", item, true)))
            }
            "string" | "varchar" | "char" | "utf8" => {
                self.skip_size_arguments()?;
                DataType::Utf8
            }
            "boolean" | "bool" => DataType::Boolean,
            "tinyint" | "int8" => DataType::Int8,
            "smallint" | "int16" => DataType::Int16,
            "int" | "integer" | "int32" => DataType::Int32,
            "bigint" | "long" | "int64" => DataType::Int64,
            "float" | "float32" => DataType::Float32,
            "double" | "float64" => DataType::Float64,
            "binary" => DataType::Binary,
            "timestamp" => timestamp_type(),
            "date" => DataType::Date32,
            other => return Err(self.error(&format!("unknown type '{}'", other))),
        };
        Ok(data_type)
    }
}

/// Arrow type used for timestamp columns
pub fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

#[derive(Debug, Clone, PartialEq)]
enum Inferred {
    Unknown,
    Bool,
    Int,
    Float,
    Str,
    Timestamp,
    Json,
    List(Box<Inferred>),
}

impl Inferred {
    /// `None` when the elements of a list have conflicting types
    fn of(value: &Value) -> Option<Inferred> {
        Some(match value {
            Value::Null => Inferred::Unknown,
            Value::Bool(_) => Inferred::Bool,
            Value::Int(_) => Inferred::Int,
            Value::Float(_) => Inferred::Float,
            Value::Str(_) => Inferred::Str,
            Value::Timestamp(_) => Inferred::Timestamp,
            Value::Map(_) => Inferred::Json,
            Value::List(items) => {
                let mut item = Inferred::Unknown;
                for value in items {
                    item = item.merge(Inferred::of(value)?)?;
                }
                Inferred::List(Box::new(item))
            }
        })
    }

    fn merge(self, other: Inferred) -> Option<Inferred> {
        match (self, other) {
            (Inferred::Unknown, x) | (x, Inferred::Unknown) => Some(x),
            (Inferred::Int, Inferred::Float) | (Inferred::Float, Inferred::Int) => {
                Some(Inferred::Float)
            }
            (Inferred::List(a), Inferred::List(b)) => {
                Some(Inferred::List(Box::new(a.merge(*b)?)))
            }
            (a, b) if a == b => Some(a),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Inferred::Unknown => "null",
            Inferred::Bool => "bool",
            Inferred::Int => "int",
            Inferred::Float => "float",
            Inferred::Str => "string",
            Inferred::Timestamp => "timestamp",
            Inferred::Json => "map",
            Inferred::List(_) => "list",
        }
    }

    fn to_arrow(&self) -> DataType {
        match self {
            Inferred::Unknown | Inferred::Str | Inferred::Json => DataType::Utf8,
            Inferred::Bool => DataType::Boolean,
            Inferred::Int => DataType::Int64,
            Inferred::Float => DataType::Float64,
            Inferred::Timestamp => timestamp_type(),
            Inferred::List(item) => {
                DataType::List(Arc::new(Field::new("item", item.to_arrow(), true)))
            }
        }
    }
}

/// Infer a schema for `columns` from a batch of records.
///
/// The first non-null value of a column decides its type; ints and floats
/// widen to `Float64`, other conflicts are encoding errors. The same rules
/// apply to the elements of a list.
pub fn infer_schema(columns: &[String], records: &[Record], nullable: bool) -> Result<SchemaRef> {
    let fields = columns
        .iter()
        .map(|column| {
            let mut inferred = Inferred::Unknown;
            for record in records {
                let Some(value) = record.get(column) else {
                    continue;
                };
                let next = Inferred::of(value).ok_or_else(|| {
                    ExportError::encoding(
                        column.clone(),
                        "list elements have mixed value types; give an explicit schema or convert all strings",
                    )
                })?;
                let seen = inferred.name();
                let found = next.name();
                inferred = inferred.merge(next).ok_or_else(|| {
                    ExportError::encoding(
                        column.clone(),
                        format!("mixed value types {} and {}", seen, found),
                    )
                })?;
            }
            Ok(Field::new(column.clone(), inferred.to_arrow(), nullable))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(Schema::new(fields)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_struct_type() {
        let fields =
            parse_struct_type("struct<text:string, tags:array<string>, n:bigint>", true).unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].name(), "text");
        assert_eq!(fields[0].data_type(), &DataType::Utf8);
        assert_eq!(
            fields[1].data_type(),
            &DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)))
        );
        assert_eq!(fields[2].data_type(), &DataType::Int64);
    }

    #[test]
    fn test_parse_type_aliases() {
        assert_eq!(parse_type("VARCHAR(20)").unwrap(), DataType::Utf8);
        assert_eq!(parse_type("tinyint").unwrap(), DataType::Int8);
        assert_eq!(parse_type("int").unwrap(), DataType::Int32);
        assert_eq!(parse_type("long").unwrap(), DataType::Int64);
        assert_eq!(parse_type("double").unwrap(), DataType::Float64);
        assert_eq!(parse_type("date").unwrap(), DataType::Date32);
        assert_eq!(parse_type("timestamp").unwrap(), timestamp_type());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_struct_type("string", true).is_err());
        assert!(parse_struct_type("struct<a:string", true).is_err());
        assert!(parse_struct_type("struct<a:uuid>", true).is_err());
        assert!(parse_struct_type("struct<>", true).is_err());
        assert!(parse_type("struct<a:int>").is_err());
    }

    #[test]
    fn test_field_list_schema() {
        let spec: SchemaSpec = serde_json::from_value(serde_json::json!([
            {"name": "id", "type": "bigint", "nullable": false},
            {"name": "text", "type": "string"}
        ]))
        .unwrap();
        let schema = spec.to_arrow(true).unwrap();
        assert!(!schema.field(0).is_nullable());
        assert!(schema.field(1).is_nullable());
    }

    #[test]
    fn test_duplicate_fields_rejected() {
        let spec = SchemaSpec::TypeString("struct<a:int,a:string>".to_string());
        assert!(spec.to_arrow(true).is_err());
    }

    #[test]
    fn test_infer_schema() {
        let columns = vec![
            "n".to_string(),
            "x".to_string(),
            "empty".to_string(),
            "tags".to_string(),
            "meta".to_string(),
        ];
        let records = vec![
            Record::new()
                .with("n", 1i64)
                .with("x", 1i64)
                .with("empty", Value::Null)
                .with("tags", Value::List(vec![]))
                .with("meta", Value::Map(vec![("k".into(), Value::Int(1))])),
            Record::new()
                .with("n", 2i64)
                .with("x", 2.5)
                .with("empty", Value::Null)
                .with("tags", vec!["a"])
                .with("meta", Value::Null),
        ];
        let schema = infer_schema(&columns, &records, true).unwrap();
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(1).data_type(), &DataType::Float64);
        assert_eq!(schema.field(2).data_type(), &DataType::Utf8);
        assert_eq!(
            schema.field(3).data_type(),
            &DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)))
        );
        assert_eq!(schema.field(4).data_type(), &DataType::Utf8);
    }

    #[test]
    fn test_infer_conflict_names_field() {
        let columns = vec!["v".to_string()];
        let records = vec![Record::new().with("v", 1i64), Record::new().with("v", "one")];
        let err = infer_schema(&columns, &records, true).unwrap_err();
        assert!(err.to_string().contains("'v'"));
    }

    #[test]
    fn test_mixed_list_elements_are_rejected() {
        let columns = vec!["tags".to_string()];
        let records = vec![Record::new().with(
            "tags",
            Value::List(vec![Value::Int(1), Value::Str("a".to_string())]),
        )];
        let err = infer_schema(&columns, &records, true).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::E003Encoding);
        assert!(err.to_string().contains("'tags'"));
        assert!(err.to_string().contains("list elements have mixed value types"));
    }

    #[test]
    fn test_list_elements_widen_to_float() {
        let columns = vec!["scores".to_string()];
        let records = vec![Record::new().with(
            "scores",
            Value::List(vec![Value::Int(1), Value::Float(2.5)]),
        )];
        let schema = infer_schema(&columns, &records, true).unwrap();
        assert_eq!(
            schema.field(0).data_type(),
            &DataType::List(Arc::new(Field::new("item", DataType::Float64, true)))
        );
    }
}
