//! Iceberg schema types
//!
//! Minimal implementation of Iceberg schema JSON. Primitive types serialize as
//! plain strings (`"long"`, `"decimal(10,2)"`), nested types as objects
//! tagged by `type`.
//! Based on Iceberg Table Spec v2: <https://iceberg.apache.org/spec/#schemas>

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! type_tag {
    ($name:ident, $tag:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub enum $name {
            #[default]
            #[serde(rename = $tag)]
            Tag,
        }
    };
}

type_tag!(StructTag, "struct");
type_tag!(ListTag, "list");
type_tag!(MapTag, "map");

/// Iceberg schema definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Schema {
    #[serde(rename = "type", default)]
    pub tag: StructTag,
    /// Unique schema identifier
    #[serde(default)]
    pub schema_id: i32,
    /// Top-level fields in the schema
    pub fields: Vec<NestedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier_field_ids: Option<Vec<i32>>,
}

impl Schema {
    pub fn new(schema_id: i32, fields: Vec<NestedField>) -> Self {
        Self {
            tag: StructTag::Tag,
            schema_id,
            fields,
            identifier_field_ids: None,
        }
    }

    /// Find a field by name (top-level only)
    pub fn field_by_name(&self, name: &str) -> Option<&NestedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Find a field by ID (searches recursively)
    pub fn field_by_id(&self, id: i32) -> Option<&NestedField> {
        self.fields.iter().find_map(|f| f.find_by_id(id))
    }

    /// Highest field, element, key or value ID in use
    pub fn highest_field_id(&self) -> i32 {
        self.fields
            .iter()
            .map(|f| f.highest_id())
            .max()
            .unwrap_or(0)
    }
}

/// Iceberg nested field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NestedField {
    pub id: i32,
    pub name: String,
    /// Whether field is required (non-nullable)
    pub required: bool,
    #[serde(rename = "type")]
    pub field_type: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl NestedField {
    pub fn optional(id: i32, name: impl Into<String>, field_type: Type) -> Self {
        Self {
            id,
            name: name.into(),
            required: false,
            field_type,
            doc: None,
        }
    }

    pub fn required(id: i32, name: impl Into<String>, field_type: Type) -> Self {
        Self {
            required: true,
            ..Self::optional(id, name, field_type)
        }
    }

    /// Recursively find a field by ID
    pub fn find_by_id(&self, id: i32) -> Option<&NestedField> {
        if self.id == id {
            return Some(self);
        }
        match &self.field_type {
            Type::Struct(st) => st.fields.iter().find_map(|f| f.find_by_id(id)),
            _ => None,
        }
    }

    fn highest_id(&self) -> i32 {
        self.id.max(self.field_type.highest_id())
    }
}

/// Iceberg data type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Type {
    Primitive(PrimitiveType),
    Struct(StructType),
    List(ListType),
    Map(MapType),
}

impl Type {
    pub fn list(element_id: i32, element: Type, element_required: bool) -> Self {
        Type::List(ListType {
            tag: ListTag::Tag,
            element_id,
            element: Box::new(element),
            element_required,
        })
    }

    fn highest_id(&self) -> i32 {
        match self {
            Type::Primitive(_) => 0,
            Type::Struct(st) => st.fields.iter().map(|f| f.highest_id()).max().unwrap_or(0),
            Type::List(list) => list.element_id.max(list.element.highest_id()),
            Type::Map(map) => map
                .key_id
                .max(map.value_id)
                .max(map.key.highest_id())
                .max(map.value.highest_id()),
        }
    }
}

impl From<PrimitiveType> for Type {
    fn from(primitive: PrimitiveType) -> Self {
        Type::Primitive(primitive)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructType {
    #[serde(rename = "type")]
    pub tag: StructTag,
    pub fields: Vec<NestedField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListType {
    #[serde(rename = "type")]
    pub tag: ListTag,
    pub element_id: i32,
    pub element: Box<Type>,
    pub element_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MapType {
    #[serde(rename = "type")]
    pub tag: MapTag,
    pub key_id: i32,
    pub key: Box<Type>,
    pub value_id: i32,
    pub value: Box<Type>,
    pub value_required: bool,
}

/// Iceberg primitive types, written in their string form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PrimitiveType {
    Boolean,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    Float,
    Double,
    Decimal { precision: u32, scale: u32 },
    /// Days since epoch
    Date,
    /// Microseconds since midnight
    Time,
    /// Microseconds since epoch, no zone
    Timestamp,
    /// Microseconds since epoch, UTC
    Timestamptz,
    String,
    Uuid,
    Fixed(u64),
    Binary,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveType::Boolean => f.write_str("boolean"),
            PrimitiveType::Int => f.write_str("int"),
            PrimitiveType::Long => f.write_str("long"),
            PrimitiveType::Float => f.write_str("float"),
            PrimitiveType::Double => f.write_str("double"),
            PrimitiveType::Decimal { precision, scale } => {
                write!(f, "decimal({},{})", precision, scale)
            }
            PrimitiveType::Date => f.write_str("date"),
            PrimitiveType::Time => f.write_str("time"),
            PrimitiveType::Timestamp => f.write_str("timestamp"),
            PrimitiveType::Timestamptz => f.write_str("timestamptz"),
            PrimitiveType::String => f.write_str("string"),
            PrimitiveType::Uuid => f.write_str("uuid"),
            PrimitiveType::Fixed(len) => write!(f, "fixed[{}]", len),
            PrimitiveType::Binary => f.write_str("binary"),
        }
    }
}

impl FromStr for PrimitiveType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let primitive = match s {
            "boolean" => PrimitiveType::Boolean,
            "int" => PrimitiveType::Int,
            "long" => PrimitiveType::Long,
            "float" => PrimitiveType::Float,
            "double" => PrimitiveType::Double,
            "date" => PrimitiveType::Date,
            "time" => PrimitiveType::Time,
            "timestamp" => PrimitiveType::Timestamp,
            "timestamptz" => PrimitiveType::Timestamptz,
            "string" => PrimitiveType::String,
            "uuid" => PrimitiveType::Uuid,
            "binary" => PrimitiveType::Binary,
            _ => {
                if let Some(args) = s.strip_prefix("decimal(").and_then(|r| r.strip_suffix(')')) {
                    let (precision, scale) = args
                        .split_once(',')
                        .ok_or_else(|| format!("invalid decimal type: {}", s))?;
                    PrimitiveType::Decimal {
                        precision: precision.trim().parse().map_err(|_| format!("invalid decimal type: {}", s))?,
                        scale: scale.trim().parse().map_err(|_| format!("invalid decimal type: {}", s))?,
                    }
                } else if let Some(len) = s.strip_prefix("fixed[").and_then(|r| r.strip_suffix(']')) {
                    PrimitiveType::Fixed(
                        len.trim().parse().map_err(|_| format!("invalid fixed type: {}", s))?,
                    )
                } else {
                    return Err(format!("unknown Iceberg type: {}", s));
                }
            }
        };
        Ok(primitive)
    }
}

impl TryFrom<String> for PrimitiveType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PrimitiveType> for String {
    fn from(value: PrimitiveType) -> Self {
        value.to_string()
    }
}
