//! # Ironbeam Formats
//!
//! File-format connectors for batch pipelines: one generic record model,
//! codecs that move it to and from files, and a retention manager that retires
//! stale time-partitioned output.
//!
//! ## Key Features
//!
//! - **Generic records** - [`StructuredRecord`] values conforming to a [`Schema`],
//!   with checked type coercion
//! - **Format codecs** - delimited text (`csv`, `tsv`, `delimited`), Parquet and
//!   Avro read/write, ORC write configuration
//! - **Codec negotiation** - case-insensitive compression names validated per
//!   format before anything is written
//! - **Transparent stream compression** - `.gz`, `.zst`, `.bz2`, `.xz` text files
//! - **Partition retention** - delete committed partitions older than a window
//!   such as `7d`, collecting per-partition failures
//! - **Parallel I/O** - sharded writes and per-split reads on rayon
//!
//! ## Quick Start
//!
//! ```no_run
//! use chrono::Utc;
//! use ironbeam_formats::*;
//! use std::collections::BTreeMap;
//!
//! # fn main() -> anyhow::Result<()> {
//! let schema = std::sync::Arc::new(Schema::parse_json(
//!     r#"{"type":"record","name":"event","fields":[
//!         {"name":"id","type":"long"},
//!         {"name":"user","type":["string","null"]}]}"#,
//! )?);
//!
//! let config = SinkConfig::new("parquet")
//!     .with_property("schema", schema.to_json().to_string())
//!     .with_property("compressionCodec", "${codec}")
//!     .with_retention("7d");
//! let arguments = BTreeMap::from([("codec".to_string(), "snappy".to_string())]);
//!
//! let mut sink = FileSetSink::prepare(&config, &FormatRegistry::builtin(), &arguments, schema)?;
//! let store = LocalPartitionStore::new("/data/events");
//! let now = Utc::now();
//! sink.write_partition(&store, now, &[], None)?;
//! # struct Run(chrono::DateTime<Utc>);
//! # impl RunContext for Run { fn logical_start_time(&self) -> chrono::DateTime<Utc> { self.0 } }
//! sink.finish(RunOutcome::Succeeded, &Run(now), &store)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `io-parquet` - Parquet codec (arrow + parquet)
//! - `io-avro` - Avro codec (apache-avro)
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`,
//!   `compression-xz` - stream compression for text formats
//!
//! All are enabled by default.

pub mod config;
pub mod duration;
pub mod error;
pub mod format;
pub mod io;
pub mod partition;
pub mod record;
pub mod retention;
pub mod schema;
pub mod sink;
pub mod source;
pub mod testing;

pub use config::FormatConfig;
pub use duration::{RetentionSpec, TimeUnit};
pub use error::{ConfigError, ConversionError, RetentionError, SchemaError};
pub use format::registry::FormatRegistry;
pub use format::{FileFormat, InputSplit, RecordStream, RecordWriter, WriteConfiguration};
pub use partition::{LocalPartitionStore, Partition, PartitionStore, RunContext};
pub use record::{RecordBuilder, StructuredRecord, Value};
pub use retention::{RetentionManager, RunOutcome, SweepReport};
pub use schema::{Field, FieldType, Schema};
pub use sink::{FileSetSink, SinkConfig};
pub use source::FileSource;
