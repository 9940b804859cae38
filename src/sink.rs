//! Time-partitioned file-set output.
//!
//! A [`FileSetSink`] is prepared once per run: properties are resolved, the
//! format validates them and builds its [`WriteConfiguration`], and the
//! retention window is parsed. Configuration problems therefore surface before
//! any record is written.
//!
//! [`FileSetSink::write_partition`] then shards the records across rayon
//! workers. Each worker opens its own [`RecordWriter`](crate::format::RecordWriter)
//! on `part-NNNNN.<format>` and only reads the shared configuration. The
//! partition is committed once every shard has been written; a failed write
//! leaves nothing committed. [`FileSetSink::finish`] runs the retention sweep
//! after the run completes.

use crate::config::FormatConfig;
use crate::error::{ConfigError, RetentionError};
use crate::format::registry::FormatRegistry;
use crate::format::{FileFormat, WriteConfiguration};
use crate::partition::{LocalPartitionStore, Partition, PartitionStore, RunContext};
use crate::record::StructuredRecord;
use crate::retention::{RetentionManager, RunOutcome, SweepReport};
use crate::schema::Schema;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Output plugin properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkConfig {
    /// Registered format name.
    pub format: String,
    /// Raw format options; may contain `${name}` placeholders.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Retention window such as `7d`. Absent disables retention.
    #[serde(default)]
    pub clean_partitions_older_than: Option<String>,
}

impl SinkConfig {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_retention(mut self, window: impl Into<String>) -> Self {
        self.clean_partitions_older_than = Some(window.into());
        self
    }

    /// The retention manager for this output. Independent of the format
    /// properties, so it is available even while those are still unresolved.
    ///
    /// # Errors
    /// [`ConfigError::InvalidDurationFormat`] for a malformed window.
    pub fn retention_manager(&self) -> Result<RetentionManager, ConfigError> {
        RetentionManager::from_config(self.clean_partitions_older_than.as_deref())
    }
}

/// A prepared, time-partitioned file-set output.
pub struct FileSetSink {
    format: Arc<dyn FileFormat>,
    schema: Arc<Schema>,
    conf: Arc<WriteConfiguration>,
    retention: RetentionManager,
}

impl FileSetSink {
    /// Resolve and validate `config` for writing records of `schema`.
    ///
    /// # Errors
    /// Any [`ConfigError`]: unknown format, unresolved placeholder, invalid
    /// option, or malformed retention window.
    pub fn prepare(
        config: &SinkConfig,
        registry: &FormatRegistry,
        arguments: &BTreeMap<String, String>,
        schema: Arc<Schema>,
    ) -> Result<Self, ConfigError> {
        let format = registry.resolve(&config.format)?;
        let resolved = FormatConfig::resolve(&config.properties, arguments)?;
        let conf = format.build_write_configuration(&resolved)?;
        let retention = config.retention_manager()?;
        info!(
            format = format.name(),
            keys = conf.len(),
            retention = ?retention.retention().map(|r| r.to_string()),
            "prepared file set output"
        );
        Ok(Self {
            format,
            schema,
            conf: Arc::new(conf),
            retention,
        })
    }

    #[must_use]
    pub fn format(&self) -> &dyn FileFormat {
        self.format.as_ref()
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The shared configuration handed to every writer.
    #[must_use]
    pub fn write_configuration(&self) -> &Arc<WriteConfiguration> {
        &self.conf
    }

    #[must_use]
    pub fn retention(&self) -> &RetentionManager {
        &self.retention
    }

    /// Write `records` as the partition at `time` and commit it.
    ///
    /// * `shards`: number of part files; defaults to `2 * num_cpus()`, clamped
    ///   to `[1, records.len()]`. An empty partition is committed with no part
    ///   files.
    ///
    /// # Errors
    /// Fails if the partition is already committed or any shard fails; the
    /// partition is then left uncommitted and its directory removed.
    pub fn write_partition(
        &self,
        store: &LocalPartitionStore,
        time: DateTime<Utc>,
        records: &[StructuredRecord],
        shards: Option<usize>,
    ) -> Result<Partition> {
        let dir = store.begin_partition(time)?;
        let n = records.len();
        let ranges = if n == 0 {
            Vec::new()
        } else {
            let count = shards
                .unwrap_or_else(|| 2 * num_cpus::get().max(2))
                .clamp(1, n);
            shard_ranges(n, count)
        };

        let written = ranges
            .into_par_iter()
            .map(|(idx, start, end)| {
                let path = dir.join(format!("part-{idx:05}.{}", self.format.name()));
                let mut writer =
                    self.format
                        .create_writer(&path, Arc::clone(&self.schema), &self.conf)?;
                for record in &records[start..end] {
                    writer.write(record)?;
                }
                let rows = writer.close()?;
                debug!(path = %path.display(), rows, "wrote shard");
                Ok(rows)
            })
            .collect::<Result<Vec<u64>>>();

        match written {
            Ok(rows) => {
                let partition = store.commit_partition(time)?;
                info!(
                    %partition,
                    rows = rows.iter().sum::<u64>(),
                    shards = rows.len(),
                    "committed partition"
                );
                Ok(partition)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&dir) {
                    warn!(dir = %dir.display(), error = %cleanup, "failed to remove uncommitted partition");
                }
                Err(e)
            }
        }
    }

    /// Report the end of a run. Retention runs only for successful runs.
    ///
    /// # Errors
    /// See [`RetentionManager::sweep`].
    pub fn finish(
        &mut self,
        outcome: RunOutcome,
        ctx: &dyn RunContext,
        store: &dyn PartitionStore,
    ) -> Result<SweepReport, RetentionError> {
        self.retention.on_run_complete(outcome, ctx, store)
    }
}

impl std::fmt::Debug for FileSetSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSetSink")
            .field("format", &self.format.name())
            .field("schema", &self.schema.name())
            .field("conf", &self.conf)
            .field("retention", &self.retention)
            .finish()
    }
}

/// Split `[0, len)` into `parts` contiguous, non-empty `(index, start, end)`
/// ranges, spreading the remainder over the first ranges.
fn shard_ranges(len: usize, parts: usize) -> Vec<(usize, usize, usize)> {
    let parts = parts.clamp(1, len.max(1));
    let base = len / parts;
    let rem = len % parts;
    let mut out = Vec::with_capacity(parts);
    let mut start = 0;
    for idx in 0..parts {
        let end = start + base + usize::from(idx < rem);
        if start < end {
            out.push((idx, start, end));
        }
        start = end;
    }
    out
}
