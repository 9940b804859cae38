//! ORC write configuration.
//!
//! This crate negotiates ORC options but does not encode ORC itself; the
//! produced [`WriteConfiguration`] is consumed by an external ORC writer.
//! Reading and writing through [`FileFormat::create_reader`] /
//! [`FileFormat::create_writer`] therefore report the format as unavailable.
//!
//! Keys produced:
//! - [`SCHEMA_KEY`]: the schema as a Hive struct type
//! - [`COMPRESS_KEY`]: `SNAPPY` or `ZLIB` when `compressionCodec` is set
//! - tuning knobs, each copied verbatim only when configured:
//!   `compressionChunkSize` → [`COMPRESS_SIZE_KEY`],
//!   `stripeSize` → [`STRIPE_SIZE_KEY`],
//!   `indexStride` → [`ROW_INDEX_STRIDE_KEY`],
//!   `createIndex` → [`CREATE_INDEX_KEY`]

use super::compression::{BlockCodec, negotiate};
use super::{FileFormat, WriteConfiguration};
use crate::config::{FormatConfig, keys};
use crate::error::ConfigError;
use crate::schema::Schema;

pub const SCHEMA_KEY: &str = "orc.mapred.output.schema";
pub const COMPRESS_KEY: &str = "orc.compress";
pub const COMPRESS_SIZE_KEY: &str = "orc.compress.size";
pub const STRIPE_SIZE_KEY: &str = "orc.stripe.size";
pub const ROW_INDEX_STRIDE_KEY: &str = "orc.row.index.stride";
pub const CREATE_INDEX_KEY: &str = "orc.create.index";

const SUPPORTED: &[BlockCodec] = &[BlockCodec::Snappy, BlockCodec::Zlib];

/// The `orc` format.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrcFormat;

impl OrcFormat {
    fn schema(&self, config: &FormatConfig) -> Result<Schema, ConfigError> {
        let raw = config.schema.as_deref().ok_or(ConfigError::MissingOption {
            format: self.name().to_string(),
            option: keys::SCHEMA,
        })?;
        Ok(Schema::parse_json(raw)?)
    }
}

impl FileFormat for OrcFormat {
    fn name(&self) -> &str {
        "orc"
    }

    fn validate_config(&self, config: &FormatConfig) -> Result<(), ConfigError> {
        self.schema(config)?;
        negotiate(self.name(), config.compression_codec.as_deref(), SUPPORTED)?;
        Ok(())
    }

    fn build_write_configuration(
        &self,
        config: &FormatConfig,
    ) -> Result<WriteConfiguration, ConfigError> {
        let schema = self.schema(config)?;
        let codec = negotiate(self.name(), config.compression_codec.as_deref(), SUPPORTED)?;

        let mut conf = WriteConfiguration::new();
        conf.insert(SCHEMA_KEY, schema.to_hive_type());
        if let Some(codec) = codec {
            conf.insert(COMPRESS_KEY, codec.name().to_ascii_uppercase());
        }
        let knobs = [
            (COMPRESS_SIZE_KEY, config.compression_chunk_size.map(|v| v.to_string())),
            (STRIPE_SIZE_KEY, config.stripe_size.map(|v| v.to_string())),
            (ROW_INDEX_STRIDE_KEY, config.index_stride.map(|v| v.to_string())),
            (CREATE_INDEX_KEY, config.create_index.map(|v| v.to_string())),
        ];
        for (key, value) in knobs {
            if let Some(value) = value {
                conf.insert(key, value);
            }
        }
        Ok(conf)
    }
}
