//! Delimited text formats.
//!
//! Three flavors share one implementation:
//! - `csv`: comma by default, quote-aware (RFC 4180) via the `csv` crate. The
//!   delimiter must be a single byte.
//! - `tsv`: tab by default, split on the literal delimiter, no quoting.
//! - `delimited`: comma by default, split on the literal delimiter (which may
//!   be several characters long), no quoting.
//!
//! # Read semantics
//! Each line is one record. Tokens map to schema fields by position. An empty
//! token is null (and fails for non-nullable fields); any other token is parsed
//! into the field's declared type. A line whose token count differs from the
//! schema's field count fails with [`ConversionError::FieldCountMismatch`],
//! which aborts the split: lines are never padded or truncated.
//!
//! # Write semantics
//! Values are rendered as text and nulls as empty tokens. Empty strings and
//! bytes, and bytes that are not UTF-8, are rejected with
//! [`ConversionError::UnencodableValue`] since they would not read back. Unquoted
//! flavors also reject values containing the delimiter or a line break.
//!
//! Files ending in `.gz`, `.zst`, `.bz2` or `.xz` are (de)compressed
//! transparently.

use super::{FileFormat, InputSplit, RecordStream, RecordWriter, WriteConfiguration, check_schema};
use crate::config::{FormatConfig, keys};
use crate::error::{ConfigError, ConversionError};
use crate::io::compression::{auto_detect_reader, auto_detect_writer};
use crate::record::{StructuredRecord, Value};
use crate::schema::Schema;
use anyhow::{Context, Result};
use std::fs::{File, create_dir_all};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A delimited text flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedFormat {
    name: &'static str,
    default_delimiter: &'static str,
    quoted: bool,
}

impl DelimitedFormat {
    /// Quote-aware comma-separated values.
    #[must_use]
    pub const fn csv() -> Self {
        Self {
            name: "csv",
            default_delimiter: ",",
            quoted: true,
        }
    }

    /// Tab-separated text.
    #[must_use]
    pub const fn tsv() -> Self {
        Self {
            name: "tsv",
            default_delimiter: "\t",
            quoted: false,
        }
    }

    /// Text split on an arbitrary delimiter string (comma unless configured).
    #[must_use]
    pub const fn delimited() -> Self {
        Self {
            name: "delimited",
            default_delimiter: ",",
            quoted: false,
        }
    }

    #[must_use]
    pub const fn default_delimiter(&self) -> &'static str {
        self.default_delimiter
    }

    fn delimiter_from(&self, conf: &WriteConfiguration) -> String {
        conf.get(keys::DELIMITER)
            .unwrap_or(self.default_delimiter)
            .to_string()
    }

    fn configuration(&self, config: &FormatConfig) -> Result<WriteConfiguration, ConfigError> {
        self.validate_config(config)?;
        let delimiter = config
            .delimiter
            .as_deref()
            .unwrap_or(self.default_delimiter);
        Ok([(keys::DELIMITER, delimiter)].into_iter().collect())
    }
}

impl FileFormat for DelimitedFormat {
    fn name(&self) -> &str {
        self.name
    }

    fn validate_config(&self, config: &FormatConfig) -> Result<(), ConfigError> {
        let delimiter = config
            .delimiter
            .as_deref()
            .unwrap_or(self.default_delimiter);
        let invalid = |reason: &str| ConfigError::InvalidOption {
            option: keys::DELIMITER.to_string(),
            value: delimiter.to_string(),
            reason: reason.to_string(),
        };
        if delimiter.is_empty() {
            return Err(invalid("delimiter must not be empty"));
        }
        if delimiter.contains(['\n', '\r']) {
            return Err(invalid("delimiter must not contain line breaks"));
        }
        if self.quoted && delimiter.len() != 1 {
            return Err(invalid("csv delimiter must be a single byte"));
        }
        Ok(())
    }

    fn build_write_configuration(
        &self,
        config: &FormatConfig,
    ) -> Result<WriteConfiguration, ConfigError> {
        self.configuration(config)
    }

    fn build_read_configuration(
        &self,
        config: &FormatConfig,
    ) -> Result<WriteConfiguration, ConfigError> {
        self.configuration(config)
    }

    fn create_reader(
        &self,
        split: &InputSplit,
        schema: Arc<Schema>,
        conf: &WriteConfiguration,
    ) -> Result<RecordStream> {
        let path = split.path.clone();
        let f = File::open(&path).with_context(|| format!("open {}", path.display()))?;
        let rdr = auto_detect_reader(f, &path)
            .with_context(|| format!("setup decompression for {}", path.display()))?;
        let delimiter = self.delimiter_from(conf);

        if self.quoted {
            let rdr = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .delimiter(single_byte(&delimiter)?)
                .from_reader(rdr);
            let records = rdr.into_records().enumerate().map(move |(i, rec)| {
                let line = i as u64 + 1;
                let rec = rec.with_context(|| format!("read {} record #{line}", path.display()))?;
                let line = rec.position().map_or(line, csv::Position::line);
                parse_tokens(&schema, line, rec.iter().collect())
                    .with_context(|| format!("parse {} line #{line}", path.display()))
            });
            Ok(RecordStream::new(split, records))
        } else {
            let records = rdr.lines().enumerate().map(move |(i, line)| {
                let n = i as u64 + 1;
                let line = line.with_context(|| format!("read {} line #{n}", path.display()))?;
                parse_tokens(&schema, n, line.split(delimiter.as_str()).collect())
                    .with_context(|| format!("parse {} line #{n}", path.display()))
            });
            Ok(RecordStream::new(split, records))
        }
    }

    fn create_writer(
        &self,
        path: &Path,
        schema: Arc<Schema>,
        conf: &WriteConfiguration,
    ) -> Result<Box<dyn RecordWriter>> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let w = auto_detect_writer(f, path)
            .with_context(|| format!("setup compression for {}", path.display()))?;
        let delimiter = self.delimiter_from(conf);
        let sink = if self.quoted {
            Sink::Quoted(
                csv::WriterBuilder::new()
                    .has_headers(false)
                    .delimiter(single_byte(&delimiter)?)
                    .from_writer(w),
            )
        } else {
            Sink::Plain { out: w, delimiter }
        };
        Ok(Box::new(DelimitedWriter {
            path: path.to_path_buf(),
            schema,
            sink,
            rows: 0,
        }))
    }
}

fn single_byte(delimiter: &str) -> Result<u8> {
    match delimiter.as_bytes() {
        [b] => Ok(*b),
        _ => anyhow::bail!("csv delimiter '{delimiter}' is not a single byte"),
    }
}

/// Build a record from one line's tokens.
fn parse_tokens(
    schema: &Arc<Schema>,
    line: u64,
    tokens: Vec<&str>,
) -> Result<StructuredRecord, ConversionError> {
    if tokens.len() != schema.len() {
        return Err(ConversionError::FieldCountMismatch {
            line,
            expected: schema.len(),
            found: tokens.len(),
        });
    }
    let mut builder = StructuredRecord::builder(Arc::clone(schema));
    for (field, token) in schema.fields().iter().zip(tokens) {
        if token.is_empty() {
            builder.set(&field.name, Value::Null)?;
        } else {
            builder.convert_and_set(&field.name, token)?;
        }
    }
    builder.build()
}

/// Text form of one value. Values that would not read back as themselves are
/// rejected: empty strings and bytes (an empty token is null) and bytes that
/// are not UTF-8.
fn token(field: &str, value: &Value) -> Result<String, ConversionError> {
    let unencodable = |reason: &str| ConversionError::UnencodableValue {
        field: field.to_string(),
        reason: reason.to_string(),
    };
    match value {
        Value::String(s) if s.is_empty() => {
            Err(unencodable("empty string would read back as null"))
        }
        Value::Bytes(b) if b.is_empty() => Err(unencodable("empty bytes would read back as null")),
        Value::Bytes(b) => std::str::from_utf8(b)
            .map(str::to_string)
            .map_err(|_| unencodable("bytes are not valid UTF-8")),
        other => Ok(other.to_string()),
    }
}

enum Sink {
    Quoted(csv::Writer<Box<dyn Write + Send>>),
    Plain {
        out: Box<dyn Write + Send>,
        delimiter: String,
    },
}

struct DelimitedWriter {
    path: PathBuf,
    schema: Arc<Schema>,
    sink: Sink,
    rows: u64,
}

impl RecordWriter for DelimitedWriter {
    fn write(&mut self, record: &StructuredRecord) -> Result<()> {
        check_schema(&self.schema, record)?;
        let row = self.rows + 1;
        match &mut self.sink {
            Sink::Quoted(wtr) => {
                let tokens = record
                    .iter()
                    .map(|(field, value)| token(&field.name, value))
                    .collect::<Result<Vec<_>, _>>()?;
                wtr.write_record(&tokens)
                    .with_context(|| format!("write {} row #{row}", self.path.display()))?;
            }
            Sink::Plain { out, delimiter } => {
                let mut line = String::new();
                for (i, (field, value)) in record.iter().enumerate() {
                    let text = token(&field.name, value)?;
                    if text.contains(delimiter.as_str()) || text.contains(['\n', '\r']) {
                        return Err(ConversionError::UnencodableValue {
                            field: field.name.clone(),
                            reason: "value contains the delimiter or a line break".into(),
                        }
                        .into());
                    }
                    if i > 0 {
                        line.push_str(delimiter);
                    }
                    line.push_str(&text);
                }
                line.push('\n');
                out.write_all(line.as_bytes())
                    .with_context(|| format!("write {} row #{row}", self.path.display()))?;
            }
        }
        self.rows = row;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<u64> {
        let path = self.path;
        match self.sink {
            Sink::Quoted(mut wtr) => wtr.flush(),
            Sink::Plain { mut out, .. } => out.flush(),
        }
        .with_context(|| format!("flush {}", path.display()))?;
        Ok(self.rows)
    }
}
