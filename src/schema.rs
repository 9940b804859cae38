//! Record schemas: an ordered list of named, typed fields.
//!
//! Schemas are exchanged as JSON in the Avro record syntax:
//!
//! ```
//! use ironbeam_formats::schema::{FieldType, Schema};
//!
//! let schema = Schema::parse_json(r#"{
//!     "type": "record",
//!     "name": "event",
//!     "fields": [
//!         {"name": "id", "type": "long"},
//!         {"name": "note", "type": ["string", "null"]}
//!     ]
//! }"#)?;
//!
//! assert_eq!(schema.field("id")?.field_type, FieldType::Long);
//! assert!(schema.field("note")?.nullable);
//! # Ok::<(), ironbeam_formats::error::SchemaError>(())
//! ```
//!
//! Field order is fixed at construction and defines the positional mapping for
//! order-dependent formats such as delimited text.

use crate::error::SchemaError;
use serde_json::{Map, Value as Json, json};
use std::collections::HashMap;
use std::fmt;

/// Record name used when a schema is built without one.
pub const DEFAULT_RECORD_NAME: &str = "etlSchemaBody";

/// Primitive field types understood by every codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Boolean,
    Int,
    Long,
    Float,
    Double,
    String,
    Bytes,
}

impl FieldType {
    /// The Avro/JSON name of this type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }

    /// The Hive type name, used by ORC schemas.
    #[must_use]
    pub const fn hive_name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Int => "int",
            Self::Long => "bigint",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Bytes => "binary",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "boolean" => Self::Boolean,
            "int" => Self::Int,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            _ => return None,
        })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single named field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
}

impl Field {
    /// A non-nullable field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
        }
    }

    /// A nullable field.
    pub fn nullable(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
        }
    }
}

/// An ordered, immutable list of uniquely named fields.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.fields == other.fields
    }
}

impl Eq for Schema {}

impl Schema {
    /// Build a schema named [`DEFAULT_RECORD_NAME`].
    ///
    /// # Errors
    /// Fails if a field name is empty or appears twice.
    pub fn new(fields: Vec<Field>) -> Result<Self, SchemaError> {
        Self::with_name(DEFAULT_RECORD_NAME, fields)
    }

    /// Build a schema with an explicit record name.
    ///
    /// # Errors
    /// Fails if the record name or a field name is empty, or a field name
    /// appears twice.
    pub fn with_name(name: impl Into<String>, fields: Vec<Field>) -> Result<Self, SchemaError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SchemaError::Invalid("record name must not be empty".into()));
        }
        let mut index = HashMap::with_capacity(fields.len());
        for (pos, field) in fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(SchemaError::Invalid(format!(
                    "field #{} has an empty name",
                    pos + 1
                )));
            }
            if index.insert(field.name.clone(), pos).is_some() {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self {
            name,
            fields,
            index,
        })
    }

    /// Record name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a field by name.
    ///
    /// # Errors
    /// [`SchemaError::FieldNotFound`] if no field has that name.
    pub fn field(&self, name: &str) -> Result<&Field, SchemaError> {
        self.position(name)
            .map(|i| &self.fields[i])
            .ok_or_else(|| SchemaError::FieldNotFound(name.to_string()))
    }

    /// Position of a field in declaration order.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Parse a schema from its JSON record syntax.
    ///
    /// Nullable fields are written as a two-branch union with `"null"`, in
    /// either order. Types may be given as a bare name or as `{"type": name}`.
    ///
    /// # Errors
    /// [`SchemaError::Malformed`] carries the JSON parser's message;
    /// [`SchemaError::UnsupportedType`] names a field whose type is not a
    /// supported primitive.
    pub fn parse_json(text: &str) -> Result<Self, SchemaError> {
        let json: Json =
            serde_json::from_str(text).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        Self::from_json(&json)
    }

    /// Build a schema from an already-parsed JSON value.
    ///
    /// # Errors
    /// See [`Schema::parse_json`].
    pub fn from_json(json: &Json) -> Result<Self, SchemaError> {
        let obj = json
            .as_object()
            .ok_or_else(|| SchemaError::Invalid("schema must be a JSON object".into()))?;
        match obj.get("type").and_then(Json::as_str) {
            Some("record") => {}
            Some(other) => {
                return Err(SchemaError::Invalid(format!(
                    "top-level type must be 'record', got '{other}'"
                )));
            }
            None => return Err(SchemaError::Invalid("missing 'type'".into())),
        }
        let name = obj
            .get("name")
            .and_then(Json::as_str)
            .unwrap_or(DEFAULT_RECORD_NAME);
        let raw_fields = obj
            .get("fields")
            .and_then(Json::as_array)
            .ok_or_else(|| SchemaError::Invalid("missing 'fields' array".into()))?;

        let mut fields = Vec::with_capacity(raw_fields.len());
        for raw in raw_fields {
            let field_name = raw
                .get("name")
                .and_then(Json::as_str)
                .ok_or_else(|| SchemaError::Invalid("field without a 'name'".into()))?;
            let ty = raw.get("type").ok_or_else(|| {
                SchemaError::Invalid(format!("field '{field_name}' has no 'type'"))
            })?;
            let (field_type, nullable) = parse_field_type(field_name, ty)?;
            fields.push(Field {
                name: field_name.to_string(),
                field_type,
                nullable,
            });
        }
        Self::with_name(name, fields)
    }

    /// Render the schema in its JSON record syntax.
    #[must_use]
    pub fn to_json(&self) -> Json {
        let fields: Vec<Json> = self
            .fields
            .iter()
            .map(|f| {
                let ty = if f.nullable {
                    json!([f.field_type.name(), "null"])
                } else {
                    json!(f.field_type.name())
                };
                json!({ "name": f.name, "type": ty })
            })
            .collect();
        let mut obj = Map::new();
        obj.insert("type".into(), json!("record"));
        obj.insert("name".into(), json!(self.name));
        obj.insert("fields".into(), Json::Array(fields));
        Json::Object(obj)
    }

    /// Render the schema as a Hive struct type, e.g. `struct<id:bigint,name:string>`.
    #[must_use]
    pub fn to_hive_type(&self) -> String {
        let body = self
            .fields
            .iter()
            .map(|f| format!("{}:{}", f.name, f.field_type.hive_name()))
            .collect::<Vec<_>>()
            .join(",");
        format!("struct<{body}>")
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

fn parse_field_type(field: &str, ty: &Json) -> Result<(FieldType, bool), SchemaError> {
    let unsupported = || SchemaError::UnsupportedType {
        field: field.to_string(),
        found: ty.to_string(),
    };
    match ty {
        Json::String(name) => FieldType::from_name(name)
            .map(|t| (t, false))
            .ok_or_else(unsupported),
        Json::Object(obj) => match obj.get("type") {
            Some(inner @ Json::String(_)) => parse_field_type(field, inner),
            _ => Err(unsupported()),
        },
        Json::Array(branches) => {
            let (nulls, others): (Vec<&Json>, Vec<&Json>) = branches
                .iter()
                .partition(|b| b.as_str() == Some("null"));
            if nulls.len() != 1 || others.len() != 1 {
                return Err(unsupported());
            }
            let (inner, nested_nullable) = parse_field_type(field, others[0])?;
            if nested_nullable {
                return Err(unsupported());
            }
            Ok((inner, true))
        }
        _ => Err(unsupported()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hive_type_uses_hive_names() {
        let schema = Schema::new(vec![
            Field::new("id", FieldType::Long),
            Field::nullable("payload", FieldType::Bytes),
        ])
        .unwrap();
        assert_eq!(schema.to_hive_type(), "struct<id:bigint,payload:binary>");
    }

    #[test]
    fn union_with_null_first_is_nullable() {
        let ty = json!(["null", "int"]);
        assert_eq!(parse_field_type("x", &ty).unwrap(), (FieldType::Int, true));
    }

    #[test]
    fn three_branch_union_is_rejected() {
        let ty = json!(["null", "int", "string"]);
        assert!(matches!(
            parse_field_type("x", &ty),
            Err(SchemaError::UnsupportedType { .. })
        ));
    }
}
