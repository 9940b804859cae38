//! Avro object container format, backed by `apache-avro`.
//!
//! Configuration:
//! - `schema` (required): JSON record schema, passed through under
//!   [`SCHEMA_KEY`]. The record schema syntax is Avro's own, so it is handed
//!   to the Avro parser unchanged.
//! - `compressionCodec`: `snappy`, `deflate` or `none`, case-insensitive.
//!   When compression is on, [`CODEC_KEY`] carries the lower-case codec name
//!   and [`COMPRESS_KEY`] is `"true"`.
//!
//! Nullable fields are unions `[T, "null"]`; the writer encodes present values
//! in branch 0 and nulls in branch 1.
//!
//! The writer validates each record as it arrives and writes a container
//! block every [`BLOCK_ROWS`] records, so memory stays bounded by one block.
//! All blocks of a file share one sync marker.

use super::compression::{BlockCodec, negotiate};
use super::{FileFormat, InputSplit, RecordStream, RecordWriter, WriteConfiguration, check_schema};
use crate::config::{FormatConfig, keys};
use crate::error::ConfigError;
use crate::record::{StructuredRecord, Value};
use crate::schema::Schema;
use anyhow::{Context, Result, anyhow, bail};
use apache_avro::types::Value as AvroValue;
use apache_avro::{Codec, Reader, Schema as AvroSchema, Writer};
use std::fs::{File, create_dir_all};
use std::hash::{BuildHasher, RandomState};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Write configuration key carrying the JSON schema.
pub const SCHEMA_KEY: &str = "avro.schema.output.key";
/// Write configuration key carrying the codec name.
pub const CODEC_KEY: &str = "avro.output.codec";
/// Write configuration flag set when compression is enabled.
pub const COMPRESS_KEY: &str = "mapred.output.compress";

/// Records per container block.
pub const BLOCK_ROWS: usize = 1024;

const SUPPORTED: &[BlockCodec] = &[BlockCodec::Snappy, BlockCodec::Deflate];

/// The `avro` format.
#[derive(Debug, Clone, Copy, Default)]
pub struct AvroFormat;

impl FileFormat for AvroFormat {
    fn name(&self) -> &str {
        "avro"
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
            conf.insert(COMPRESS_KEY, "true");
            conf.insert(CODEC_KEY, codec.name());
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
        let reader = Reader::new(BufReader::new(file))
            .with_context(|| format!("read avro header of {}", path.display()))?;
        let records = reader.enumerate().map(move |(i, value)| {
            let n = i + 1;
            let value = value.with_context(|| format!("decode {} record #{n}", path.display()))?;
            from_avro(&schema, value)
                .with_context(|| format!("convert {} record #{n}", path.display()))
        });
        Ok(RecordStream::new(split, records))
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
        let codec = match conf.get(CODEC_KEY) {
            Some(name) => Codec::from_str(name)
                .map_err(|_| anyhow!("unknown {CODEC_KEY} value '{name}'"))?,
            None => Codec::Null,
        };
        let avro_schema = AvroSchema::parse_str(&schema.to_json().to_string())
            .context("convert schema to avro")?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        Ok(Box::new(AvroWriter {
            path: path.to_path_buf(),
            schema,
            avro_schema,
            codec,
            marker: sync_marker(path),
            out: BufWriter::new(file),
            block: Vec::with_capacity(BLOCK_ROWS),
            header_written: false,
            rows: 0,
        }))
    }
}

struct AvroWriter {
    path: PathBuf,
    schema: Arc<Schema>,
    avro_schema: AvroSchema,
    codec: Codec,
    marker: [u8; 16],
    out: BufWriter<File>,
    block: Vec<AvroValue>,
    header_written: bool,
    rows: u64,
}

impl AvroWriter {
    /// Encode the buffered records as one block, writing the header first if
    /// this is the first block of the file.
    fn write_block(&mut self) -> Result<()> {
        let mut writer = Writer::builder()
            .schema(&self.avro_schema)
            .writer(&mut self.out)
            .codec(self.codec)
            .marker(self.marker)
            .has_header(self.header_written)
            .build();
        for value in self.block.drain(..) {
            writer
                .append(value)
                .with_context(|| format!("encode records into {}", self.path.display()))?;
        }
        writer
            .flush()
            .with_context(|| format!("flush {}", self.path.display()))?;
        self.header_written = true;
        Ok(())
    }
}

impl RecordWriter for AvroWriter {
    fn write(&mut self, record: &StructuredRecord) -> Result<()> {
        check_schema(&self.schema, record)?;
        let value = to_avro(record);
        if !value.validate(&self.avro_schema) {
            bail!(
                "record #{} does not conform to the avro schema of {}",
                self.rows + 1,
                self.path.display()
            );
        }
        self.block.push(value);
        self.rows += 1;
        if self.block.len() >= BLOCK_ROWS {
            self.write_block()?;
        }
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<u64> {
        if !self.header_written || !self.block.is_empty() {
            self.write_block()?;
        }
        self.out
            .flush()
            .with_context(|| format!("flush {}", self.path.display()))?;
        Ok(self.rows)
    }
}

/// Sync marker for one container file.
fn sync_marker(path: &Path) -> [u8; 16] {
    let state = RandomState::new();
    let mut marker = [0_u8; 16];
    for (i, chunk) in marker.chunks_exact_mut(8).enumerate() {
        chunk.copy_from_slice(&state.hash_one((path, i)).to_le_bytes());
    }
    marker
}

fn to_avro(record: &StructuredRecord) -> AvroValue {
    let fields = record
        .iter()
        .map(|(field, value)| {
            let plain = match value {
                Value::Null => AvroValue::Null,
                Value::Boolean(v) => AvroValue::Boolean(*v),
                Value::Int(v) => AvroValue::Int(*v),
                Value::Long(v) => AvroValue::Long(*v),
                Value::Float(v) => AvroValue::Float(*v),
                Value::Double(v) => AvroValue::Double(*v),
                Value::String(v) => AvroValue::String(v.clone()),
                Value::Bytes(v) => AvroValue::Bytes(v.clone()),
            };
            let encoded = match (field.nullable, plain) {
                (false, v) => v,
                (true, AvroValue::Null) => AvroValue::Union(1, Box::new(AvroValue::Null)),
                (true, v) => AvroValue::Union(0, Box::new(v)),
            };
            (field.name.clone(), encoded)
        })
        .collect();
    AvroValue::Record(fields)
}

fn from_avro(schema: &Arc<Schema>, value: AvroValue) -> Result<StructuredRecord> {
    let AvroValue::Record(fields) = value else {
        bail!("expected an avro record");
    };
    let mut builder = StructuredRecord::builder(Arc::clone(schema));
    for (name, value) in fields {
        if schema.position(&name).is_none() {
            continue;
        }
        builder.set(&name, plain_value(&name, value)?)?;
    }
    Ok(builder.build()?)
}

fn plain_value(name: &str, value: AvroValue) -> Result<Value> {
    Ok(match value {
        AvroValue::Union(_, inner) => return plain_value(name, *inner),
        AvroValue::Null => Value::Null,
        AvroValue::Boolean(v) => Value::Boolean(v),
        AvroValue::Int(v) => Value::Int(v),
        AvroValue::Long(v) => Value::Long(v),
        AvroValue::Float(v) => Value::Float(v),
        AvroValue::Double(v) => Value::Double(v),
        AvroValue::String(v) => Value::String(v),
        AvroValue::Bytes(v) => Value::Bytes(v),
        other => bail!("field '{name}' has unsupported avro value {other:?}"),
    })
}
