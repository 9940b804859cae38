//! Parquet format, backed by Arrow + Parquet.
//!
//! Configuration:
//! - `schema` (required): JSON record schema, passed through under
//!   [`SCHEMA_KEY`].
//! - `compressionCodec`: `snappy`, `gzip`, `lzo` or `none`, case-insensitive,
//!   written as the upper-case engine name under [`COMPRESSION_KEY`].
//!
//! Records are buffered into Arrow `RecordBatch`es of [`BATCH_ROWS`] rows and
//! written with `parquet::arrow::ArrowWriter`. Reads iterate batches from
//! `ParquetRecordBatchReader` and convert one row at a time, so a split is
//! never materialized in memory.
//!
//! The Rust Parquet writer cannot produce LZO pages. `lzo` passes validation
//! (it is a legal Parquet codec for other engines) but [`FileFormat::create_writer`]
//! refuses it.

use super::compression::{BlockCodec, negotiate};
use super::{FileFormat, InputSplit, RecordStream, RecordWriter, WriteConfiguration, check_schema};
use crate::config::{FormatConfig, keys};
use crate::error::ConfigError;
use crate::record::{StructuredRecord, Value};
use crate::schema::{FieldType, Schema};
use anyhow::{Context, Result, anyhow, bail};
use arrow::array::{
    Array, ArrayRef, BinaryArray, BinaryBuilder, BooleanArray, BooleanBuilder, Float32Array,
    Float32Builder, Float64Array, Float64Builder, Int32Array, Int32Builder, Int64Array,
    Int64Builder, LargeBinaryArray, LargeStringArray, StringArray, StringBuilder,
};
use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;
use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Write configuration key carrying the JSON schema.
pub const SCHEMA_KEY: &str = "parquet.avro.schema";
/// Write configuration key carrying the compression codec.
pub const COMPRESSION_KEY: &str = "parquet.compression";
/// Rows per Arrow batch on both read and write.
pub const BATCH_ROWS: usize = 8 * 1024;

const SUPPORTED: &[BlockCodec] = &[BlockCodec::Snappy, BlockCodec::Gzip, BlockCodec::Lzo];

/// The `parquet` format.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetFormat;

impl FileFormat for ParquetFormat {
    fn name(&self) -> &str {
        "parquet"
    }

    fn validate_config(&self, config: &FormatConfig) -> Result<(), ConfigError> {
        let schema = config.schema.as_deref().ok_or(ConfigError::MissingOption {
            format: self.name().to_string(),
            option: keys::SCHEMA,
        })?;
        Schema::parse_json(schema)?;
        negotiate(self.name(), config.compression_codec.as_deref(), SUPPORTED)?;
        Ok(())
    }

    fn build_write_configuration(
        &self,
        config: &FormatConfig,
    ) -> Result<WriteConfiguration, ConfigError> {
        self.validate_config(config)?;
        let mut conf = WriteConfiguration::new();
        if let Some(schema) = &config.schema {
            conf.insert(SCHEMA_KEY, schema.clone());
        }
        if let Some(codec) = negotiate(self.name(), config.compression_codec.as_deref(), SUPPORTED)? {
            conf.insert(COMPRESSION_KEY, codec.name().to_ascii_uppercase());
        }
        Ok(conf)
    }

    fn create_reader(
        &self,
        split: &InputSplit,
        schema: Arc<Schema>,
        _conf: &WriteConfiguration,
    ) -> Result<RecordStream> {
        let path = split.path.clone();
        let file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .context("open ParquetRecordBatchReader")?
            .with_batch_size(BATCH_ROWS)
            .build()
            .context("build ParquetRecordBatchReader")?;
        Ok(RecordStream::new(
            split,
            ParquetRecords {
                path,
                schema,
                reader,
                batch: None,
                row: 0,
            },
        ))
    }

    fn create_writer(
        &self,
        path: &Path,
        schema: Arc<Schema>,
        conf: &WriteConfiguration,
    ) -> Result<Box<dyn RecordWriter>> {
        if let Some(configured) = conf.get(SCHEMA_KEY) {
            let configured = Schema::parse_json(configured)?;
            if configured != *schema {
                bail!("writer schema does not match configured {SCHEMA_KEY}");
            }
        }
        let compression = match conf.get(COMPRESSION_KEY) {
            None => Compression::UNCOMPRESSED,
            Some("SNAPPY") => Compression::SNAPPY,
            Some("GZIP") => Compression::GZIP(GzipLevel::default()),
            Some("LZO") => bail!("LZO compression is not supported by the parquet writer"),
            Some(other) => bail!("unknown {COMPRESSION_KEY} value '{other}'"),
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let arrow_schema = to_arrow_schema(&schema);
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let props = WriterProperties::builder()
            .set_compression(compression)
            .build();
        let writer = ArrowWriter::try_new(file, Arc::clone(&arrow_schema), Some(props))
            .context("create ArrowWriter")?;
        Ok(Box::new(ParquetWriter {
            path: path.to_path_buf(),
            schema,
            arrow_schema,
            writer,
            buffer: Vec::with_capacity(BATCH_ROWS),
            rows: 0,
        }))
    }
}

/// Arrow schema equivalent of a record schema.
#[must_use]
pub fn to_arrow_schema(schema: &Schema) -> SchemaRef {
    let fields: Vec<ArrowField> = schema
        .fields()
        .iter()
        .map(|f| {
            let data_type = match f.field_type {
                FieldType::Boolean => DataType::Boolean,
                FieldType::Int => DataType::Int32,
                FieldType::Long => DataType::Int64,
                FieldType::Float => DataType::Float32,
                FieldType::Double => DataType::Float64,
                FieldType::String => DataType::Utf8,
                FieldType::Bytes => DataType::Binary,
            };
            ArrowField::new(&f.name, data_type, f.nullable)
        })
        .collect();
    Arc::new(ArrowSchema::new(fields))
}

macro_rules! build_column {
    ($builder:ty, $records:expr, $pos:expr, $pat:pat => $val:expr) => {{
        let mut b = <$builder>::new();
        for r in $records {
            b.append_option(match &r.values()[$pos] {
                $pat => Some($val),
                _ => None,
            });
        }
        Arc::new(b.finish()) as ArrayRef
    }};
}

fn to_record_batch(
    schema: &Schema,
    arrow_schema: &SchemaRef,
    records: &[StructuredRecord],
) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(pos, f)| match f.field_type {
            FieldType::Boolean => {
                build_column!(BooleanBuilder, records, pos, Value::Boolean(v) => *v)
            }
            FieldType::Int => build_column!(Int32Builder, records, pos, Value::Int(v) => *v),
            FieldType::Long => build_column!(Int64Builder, records, pos, Value::Long(v) => *v),
            FieldType::Float => build_column!(Float32Builder, records, pos, Value::Float(v) => *v),
            FieldType::Double => {
                build_column!(Float64Builder, records, pos, Value::Double(v) => *v)
            }
            FieldType::String => {
                build_column!(StringBuilder, records, pos, Value::String(v) => v.as_str())
            }
            FieldType::Bytes => {
                build_column!(BinaryBuilder, records, pos, Value::Bytes(v) => v.as_slice())
            }
        })
        .collect();
    RecordBatch::try_new(Arc::clone(arrow_schema), columns).context("assemble RecordBatch")
}

struct ParquetWriter {
    path: PathBuf,
    schema: Arc<Schema>,
    arrow_schema: SchemaRef,
    writer: ArrowWriter<File>,
    buffer: Vec<StructuredRecord>,
    rows: u64,
}

impl ParquetWriter {
    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = to_record_batch(&self.schema, &self.arrow_schema, &self.buffer)?;
        self.writer
            .write(&batch)
            .with_context(|| format!("write batch to {}", self.path.display()))?;
        self.buffer.clear();
        Ok(())
    }
}

impl RecordWriter for ParquetWriter {
    fn write(&mut self, record: &StructuredRecord) -> Result<()> {
        check_schema(&self.schema, record)?;
        self.buffer.push(record.clone());
        self.rows += 1;
        if self.buffer.len() >= BATCH_ROWS {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<u64> {
        self.flush_buffer()?;
        let rows = self.rows;
        self.writer
            .close()
            .with_context(|| format!("close ArrowWriter for {}", self.path.display()))?;
        Ok(rows)
    }
}

/// Lazily converts Arrow batches into records.
struct ParquetRecords {
    path: PathBuf,
    schema: Arc<Schema>,
    reader: ParquetRecordBatchReader,
    batch: Option<(RecordBatch, Vec<usize>)>,
    row: usize,
}

impl ParquetRecords {
    /// Map schema fields to batch columns by name.
    fn column_positions(&self, batch: &RecordBatch) -> Result<Vec<usize>> {
        let batch_schema = batch.schema();
        self.schema
            .fields()
            .iter()
            .map(|f| {
                batch_schema.index_of(&f.name).map_err(|_| {
                    anyhow!("column '{}' not found in {}", f.name, self.path.display())
                })
            })
            .collect()
    }

    fn next_record(&mut self) -> Option<Result<StructuredRecord>> {
        loop {
            if let Some((batch, columns)) = &self.batch
                && self.row < batch.num_rows()
            {
                let row = self.row;
                self.row += 1;
                return Some(row_to_record(&self.schema, batch, columns, row));
            }
            self.batch = None;
            let batch = match self.reader.next()? {
                Ok(batch) => batch,
                Err(e) => {
                    return Some(
                        Err(e).with_context(|| format!("read batch from {}", self.path.display())),
                    );
                }
            };
            match self.column_positions(&batch) {
                Ok(columns) => {
                    self.batch = Some((batch, columns));
                    self.row = 0;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl Iterator for ParquetRecords {
    type Item = Result<StructuredRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}

fn row_to_record(
    schema: &Arc<Schema>,
    batch: &RecordBatch,
    columns: &[usize],
    row: usize,
) -> Result<StructuredRecord> {
    let mut builder = StructuredRecord::builder(Arc::clone(schema));
    for (field, &col) in schema.fields().iter().zip(columns) {
        let value = cell(batch.column(col).as_ref(), row)
            .with_context(|| format!("read column '{}'", field.name))?;
        builder.set(&field.name, value)?;
    }
    Ok(builder.build()?)
}

fn downcast<T: 'static>(array: &dyn Array) -> Result<&T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow!("unexpected array layout for {}", array.data_type()))
}

/// Extract one cell as a [`Value`]. The record builder coerces it to the
/// declared field type afterwards.
fn cell(array: &dyn Array, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }
    Ok(match array.data_type() {
        DataType::Boolean => Value::Boolean(downcast::<BooleanArray>(array)?.value(row)),
        DataType::Int32 => Value::Int(downcast::<Int32Array>(array)?.value(row)),
        DataType::Int64 => Value::Long(downcast::<Int64Array>(array)?.value(row)),
        DataType::Float32 => Value::Float(downcast::<Float32Array>(array)?.value(row)),
        DataType::Float64 => Value::Double(downcast::<Float64Array>(array)?.value(row)),
        DataType::Utf8 => Value::String(downcast::<StringArray>(array)?.value(row).to_string()),
        DataType::LargeUtf8 => {
            Value::String(downcast::<LargeStringArray>(array)?.value(row).to_string())
        }
        DataType::Binary => Value::Bytes(downcast::<BinaryArray>(array)?.value(row).to_vec()),
        DataType::LargeBinary => {
            Value::Bytes(downcast::<LargeBinaryArray>(array)?.value(row).to_vec())
        }
        other => bail!("unsupported column type {other}"),
    })
}
