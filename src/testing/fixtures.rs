//! Pre-built schemas and records.

use crate::record::{StructuredRecord, Value};
use crate::schema::{Field, FieldType, Schema};
use std::sync::Arc;

/// JSON for [`sample_schema`].
pub const SAMPLE_SCHEMA_JSON: &str = r#"{
  "type": "record",
  "name": "event",
  "fields": [
    {"name": "id", "type": "long"},
    {"name": "user", "type": "string"},
    {"name": "referrer", "type": ["string", "null"]},
    {"name": "score", "type": "double"},
    {"name": "active", "type": "boolean"},
    {"name": "retries", "type": ["null", "int"]}
  ]
}"#;

/// A web-event schema mixing every scalar kind and nullable fields.
///
/// # Panics
/// Never; the embedded JSON is valid.
#[must_use]
pub fn sample_schema() -> Arc<Schema> {
    Arc::new(Schema::parse_json(SAMPLE_SCHEMA_JSON).expect("sample schema is valid"))
}

/// Records conforming to [`sample_schema`]. Contains nulls but no empty
/// strings, so they survive a delimited round trip unchanged.
///
/// # Panics
/// Never; every record matches the schema.
#[must_use]
pub fn sample_records() -> Vec<StructuredRecord> {
    let schema = sample_schema();
    let rows: [(i64, &str, Option<&str>, f64, bool, Option<i32>); 4] = [
        (1, "alice", Some("search"), 0.5, true, Some(0)),
        (2, "bob", None, 12.25, false, None),
        (3, "carol", Some("mail"), -3.0, true, Some(4)),
        (4, "dave", None, 1e-3, false, Some(1)),
    ];
    rows.into_iter()
        .map(|(id, user, referrer, score, active, retries)| {
            let mut b = StructuredRecord::builder(Arc::clone(&schema));
            b.set("id", id)
                .and_then(|b| b.set("user", user))
                .and_then(|b| b.set("referrer", referrer))
                .and_then(|b| b.set("score", score))
                .and_then(|b| b.set("active", active))
                .and_then(|b| b.set("retries", retries))
                .expect("fixture values match the schema");
            b.build().expect("fixture record is complete")
        })
        .collect()
}

/// `f1: string, f2: nullable string, f3: int`.
///
/// # Panics
/// Never; the field names are distinct.
#[must_use]
pub fn three_field_schema() -> Arc<Schema> {
    Arc::new(
        Schema::new(vec![
            Field::new("f1", FieldType::String),
            Field::nullable("f2", FieldType::String),
            Field::new("f3", FieldType::Int),
        ])
        .expect("field names are distinct"),
    )
}

/// Build a record of `schema` from positional values.
///
/// # Panics
/// If a value does not fit its field or the count is wrong.
#[must_use]
pub fn record_of(schema: &Arc<Schema>, values: Vec<Value>) -> StructuredRecord {
    assert_eq!(values.len(), schema.len(), "value count must match schema");
    let mut b = StructuredRecord::builder(Arc::clone(schema));
    for (field, value) in schema.fields().iter().zip(values) {
        b.set(&field.name, value).expect("value fits field");
    }
    b.build().expect("record is complete")
}
