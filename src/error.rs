//! Error taxonomy for the format connectors and the retention manager.
//!
//! Three families, matching when they can occur:
//! - [`ConfigError`] is raised while validating configuration, before any data
//!   is read or written. It names the offending value and is never retried.
//! - [`ConversionError`] is raised while converting a single record and aborts
//!   the enclosing split or writer task.
//! - [`RetentionError`] is raised by a retention sweep. Per-partition deletion
//!   failures are aggregated rather than stopping the sweep.
//!
//! Schema construction has its own [`SchemaError`], which surfaces as
//! [`ConfigError::InvalidSchema`] when the schema comes from configuration.

use crate::partition::Partition;
use thiserror::Error;

/// Errors produced while building or querying a [`Schema`](crate::schema::Schema).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema is not valid JSON: {0}")]
    Malformed(String),

    #[error("invalid schema: {0}")]
    Invalid(String),

    #[error("field '{field}' has unsupported type {found}")]
    UnsupportedType { field: String, found: String },

    #[error("duplicate field name '{0}'")]
    DuplicateField(String),

    #[error("field '{0}' not found in schema")]
    FieldNotFound(String),
}

/// Configuration validation failures. Raised synchronously at setup time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown format '{0}'")]
    UnknownFormat(String),

    #[error("{format}: required option '{option}' is missing")]
    MissingOption {
        format: String,
        option: &'static str,
    },

    #[error("invalid value '{value}' for option '{option}': {reason}")]
    InvalidOption {
        option: String,
        value: String,
        reason: String,
    },

    #[error("unable to parse schema: {0}")]
    InvalidSchema(#[from] SchemaError),

    #[error("{format}: unsupported compression codec '{codec}'")]
    UnsupportedCodec { format: String, codec: String },

    #[error(
        "invalid duration '{input}': expected a positive number followed by 's', 'm', 'h' or 'd'"
    )]
    InvalidDurationFormat { input: String },

    #[error("option '{option}' references unresolved macro '${{{name}}}'")]
    UnresolvedMacro { option: String, name: String },
}

/// Failures converting one record to or from its encoded form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("field '{0}' not found in schema")]
    FieldNotFound(String),

    #[error("field '{field}': cannot convert {found} to {expected}")]
    TypeCoercion {
        field: String,
        expected: String,
        found: String,
    },

    #[error("field '{field}' is not nullable")]
    NullNotAllowed { field: String },

    #[error("record is missing non-nullable fields: {}", .fields.join(", "))]
    IncompleteRecord { fields: Vec<String> },

    #[error("line {line}: expected {expected} fields but found {found}")]
    FieldCountMismatch {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("field '{field}' cannot be encoded: {reason}")]
    UnencodableValue { field: String, reason: String },

    #[error("record schema '{found}' does not match writer schema '{expected}'")]
    SchemaMismatch { expected: String, found: String },
}

/// One partition that could not be deleted during a sweep.
#[derive(Debug, Clone)]
pub struct DeletionFailure {
    pub partition: Partition,
    pub reason: String,
}

/// Failures of a retention sweep.
#[derive(Debug, Error)]
pub enum RetentionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cutoff for run time {run_time} minus {retention} is out of range")]
    CutoffOutOfRange { run_time: String, retention: String },

    #[error("failed to enumerate partitions: {0:#}")]
    Enumerate(anyhow::Error),

    #[error("failed to delete {} partition(s): {}", .failures.len(), describe_failures(.failures))]
    DeletionFailed {
        deleted: Vec<Partition>,
        failures: Vec<DeletionFailure>,
    },
}

fn describe_failures(failures: &[DeletionFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.partition, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}
