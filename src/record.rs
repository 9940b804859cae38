//! The generic record model shared by every codec.
//!
//! A [`StructuredRecord`] is an immutable, schema-conformant set of values. It
//! can only be produced by [`RecordBuilder::build`], which checks that every
//! non-nullable field was set and that every value matches its declared type,
//! so no partially built record ever escapes.

use crate::error::ConversionError;
use crate::schema::{Field, FieldType, Schema};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Name of the value's type, as used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_long(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v as i64),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert a non-null value to `target`, allowing only lossless widening
    /// and range-checked narrowing.
    fn coerce(self, field: &Field) -> Result<Self, ConversionError> {
        let target = field.field_type;
        let mismatch = |found: &Self| ConversionError::TypeCoercion {
            field: field.name.clone(),
            expected: target.name().to_string(),
            found: found.type_name().to_string(),
        };
        Ok(match (target, self) {
            (FieldType::Boolean, v @ Self::Boolean(_))
            | (FieldType::Int, v @ Self::Int(_))
            | (FieldType::Long, v @ Self::Long(_))
            | (FieldType::Float, v @ Self::Float(_))
            | (FieldType::Double, v @ Self::Double(_))
            | (FieldType::String, v @ Self::String(_))
            | (FieldType::Bytes, v @ Self::Bytes(_)) => v,
            (FieldType::Int, Self::Long(v)) => match i32::try_from(v) {
                Ok(v) => Self::Int(v),
                Err(_) => return Err(mismatch(&Self::Long(v))),
            },
            (FieldType::Long, Self::Int(v)) => Self::Long(i64::from(v)),
            (FieldType::Float, Self::Int(v)) => Self::Float(v as f32),
            (FieldType::Float, Self::Long(v)) => Self::Float(v as f32),
            (FieldType::Double, Self::Int(v)) => Self::Double(f64::from(v)),
            (FieldType::Double, Self::Long(v)) => Self::Double(v as f64),
            (FieldType::Double, Self::Float(v)) => Self::Double(f64::from(v)),
            (FieldType::Bytes, Self::String(s)) => Self::Bytes(s.into_bytes()),
            (_, other) => return Err(mismatch(&other)),
        })
    }

    /// Parse text into a value of `field`'s type.
    ///
    /// Parsing is locale independent: booleans are `true`/`false` in any ASCII
    /// case, integers are plain decimal, floats use Rust float syntax.
    fn parse(text: &str, field: &Field) -> Result<Self, ConversionError> {
        let bad = || ConversionError::TypeCoercion {
            field: field.name.clone(),
            expected: field.field_type.name().to_string(),
            found: format!("'{text}'"),
        };
        Ok(match field.field_type {
            FieldType::Boolean => {
                if text.eq_ignore_ascii_case("true") {
                    Self::Boolean(true)
                } else if text.eq_ignore_ascii_case("false") {
                    Self::Boolean(false)
                } else {
                    return Err(bad());
                }
            }
            FieldType::Int => Self::Int(text.parse().map_err(|_| bad())?),
            FieldType::Long => Self::Long(text.parse().map_err(|_| bad())?),
            FieldType::Float => Self::Float(text.parse().map_err(|_| bad())?),
            FieldType::Double => Self::Double(text.parse().map_err(|_| bad())?),
            FieldType::String => Self::String(text.to_string()),
            FieldType::Bytes => Self::Bytes(text.as_bytes().to_vec()),
        })
    }
}

impl fmt::Display for Value {
    /// Text form used by the delimited codecs. Nulls render as empty.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Bytes(v) => f.write_str(&String::from_utf8_lossy(v)),
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::$variant(v.into())
            }
        })*
    };
}

value_from! {
    bool => Boolean,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
    &str => String,
    Vec<u8> => Bytes,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// An immutable record conforming to exactly one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRecord {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl StructuredRecord {
    /// Start building a record for `schema`.
    #[must_use]
    pub fn builder(schema: Arc<Schema>) -> RecordBuilder {
        RecordBuilder::new(schema)
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Value of a field by name.
    ///
    /// # Errors
    /// [`ConversionError::FieldNotFound`] if the schema has no such field.
    pub fn get(&self, name: &str) -> Result<&Value, ConversionError> {
        self.schema
            .position(name)
            .map(|i| &self.values[i])
            .ok_or_else(|| ConversionError::FieldNotFound(name.to_string()))
    }

    /// Values in schema field order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// `(field, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&Field, &Value)> {
        self.schema.fields().iter().zip(self.values.iter())
    }
}

impl Serialize for StructuredRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in self.iter() {
            match value {
                Value::Null => map.serialize_entry(&field.name, &())?,
                Value::Boolean(v) => map.serialize_entry(&field.name, v)?,
                Value::Int(v) => map.serialize_entry(&field.name, v)?,
                Value::Long(v) => map.serialize_entry(&field.name, v)?,
                Value::Float(v) => map.serialize_entry(&field.name, v)?,
                Value::Double(v) => map.serialize_entry(&field.name, v)?,
                Value::String(v) => map.serialize_entry(&field.name, v)?,
                Value::Bytes(v) => map.serialize_entry(&field.name, v)?,
            }
        }
        map.end()
    }
}

/// Incremental builder for [`StructuredRecord`].
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    schema: Arc<Schema>,
    values: Vec<Option<Value>>,
}

impl RecordBuilder {
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        let values = vec![None; schema.len()];
        Self { schema, values }
    }

    fn slot(&self, name: &str) -> Result<(usize, &Field), ConversionError> {
        let pos = self
            .schema
            .position(name)
            .ok_or_else(|| ConversionError::FieldNotFound(name.to_string()))?;
        Ok((pos, &self.schema.fields()[pos]))
    }

    /// Set a field, coercing the value to the field's declared type.
    ///
    /// # Errors
    /// - [`ConversionError::FieldNotFound`] for an unknown field
    /// - [`ConversionError::NullNotAllowed`] for a null in a non-nullable field
    /// - [`ConversionError::TypeCoercion`] if the value cannot be converted
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self, ConversionError> {
        let (pos, field) = self.slot(name)?;
        let value = match value.into() {
            Value::Null if field.nullable => Value::Null,
            Value::Null => {
                return Err(ConversionError::NullNotAllowed {
                    field: field.name.clone(),
                });
            }
            v => v.coerce(field)?,
        };
        self.values[pos] = Some(value);
        Ok(self)
    }

    /// Parse `text` according to the field's declared type and set it.
    ///
    /// # Errors
    /// As [`RecordBuilder::set`], with parse failures reported as
    /// [`ConversionError::TypeCoercion`].
    pub fn convert_and_set(&mut self, name: &str, text: &str) -> Result<&mut Self, ConversionError> {
        let (pos, field) = self.slot(name)?;
        let value = Value::parse(text, field)?;
        self.values[pos] = Some(value);
        Ok(self)
    }

    /// Finish the record. Unset nullable fields become null.
    ///
    /// # Errors
    /// [`ConversionError::IncompleteRecord`] naming every non-nullable field
    /// that was never set.
    pub fn build(self) -> Result<StructuredRecord, ConversionError> {
        let missing: Vec<String> = self
            .schema
            .fields()
            .iter()
            .zip(&self.values)
            .filter(|(f, v)| v.is_none() && !f.nullable)
            .map(|(f, _)| f.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(ConversionError::IncompleteRecord { fields: missing });
        }
        let values = self
            .values
            .into_iter()
            .map(|v| v.unwrap_or(Value::Null))
            .collect();
        Ok(StructuredRecord {
            schema: self.schema,
            values,
        })
    }
}
