//! Time partitions of an output file set and the collaborators that own them.
//!
//! The retention manager never writes partition metadata. It reads the set of
//! committed partitions from a [`PartitionStore`] and asks the store to delete
//! expired ones. [`LocalPartitionStore`] is a directory-backed store where a
//! partition counts as committed once its `_SUCCESS` marker exists.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Marker file that commits a partition directory.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Directory name format for partition times (UTC, nanosecond precision).
pub const PARTITION_TIME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S%.9f";

/// A committed, time-addressable slice of an output data set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Partition {
    /// Representative time of the partition.
    pub time: DateTime<Utc>,
    /// Where the partition's files live.
    pub location: String,
}

impl Partition {
    pub fn new(time: DateTime<Utc>, location: impl Into<String>) -> Self {
        Self {
            time,
            location: location.into(),
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.location, self.time.to_rfc3339())
    }
}

/// The run a sweep belongs to.
pub trait RunContext {
    /// Logical start time of the run.
    fn logical_start_time(&self) -> DateTime<Utc>;
}

/// Enumerates and deletes committed partitions of one output data set.
///
/// Implementations must only report partitions whose writes have committed;
/// partitions of runs still in flight are never returned.
pub trait PartitionStore {
    /// All committed partitions, read fresh on every call.
    ///
    /// # Errors
    /// Returns an error if the partition listing cannot be read.
    fn committed_partitions(&self) -> Result<Vec<Partition>>;

    /// Delete one partition and its data.
    ///
    /// # Errors
    /// Returns an error if the partition cannot be removed.
    fn delete_partition(&self, partition: &Partition) -> Result<()>;
}

/// A [`PartitionStore`] over a local directory.
///
/// Layout: `<base>/<time>/...data files...` plus `<base>/<time>/_SUCCESS`
/// once committed, with `<time>` formatted as [`PARTITION_TIME_FORMAT`].
#[derive(Debug, Clone)]
pub struct LocalPartitionStore {
    base: PathBuf,
}

impl LocalPartitionStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory for the partition at `time`. Nothing is created.
    #[must_use]
    pub fn partition_dir(&self, time: DateTime<Utc>) -> PathBuf {
        self.base
            .join(time.format(PARTITION_TIME_FORMAT).to_string())
    }

    /// Create the (uncommitted) directory for the partition at `time`.
    ///
    /// # Errors
    /// Fails if the partition is already committed or the directory cannot be
    /// created.
    pub fn begin_partition(&self, time: DateTime<Utc>) -> Result<PathBuf> {
        let dir = self.partition_dir(time);
        if dir.join(SUCCESS_MARKER).exists() {
            bail!("partition {} is already committed", dir.display());
        }
        fs::create_dir_all(&dir).with_context(|| format!("mkdir -p {}", dir.display()))?;
        Ok(dir)
    }

    /// Commit the partition at `time` by writing its marker file.
    ///
    /// # Errors
    /// Fails if the partition directory does not exist or the marker cannot be
    /// written.
    pub fn commit_partition(&self, time: DateTime<Utc>) -> Result<Partition> {
        let dir = self.partition_dir(time);
        if !dir.is_dir() {
            bail!("partition directory {} does not exist", dir.display());
        }
        let marker = dir.join(SUCCESS_MARKER);
        File::create(&marker).with_context(|| format!("create {}", marker.display()))?;
        debug!(partition = %dir.display(), "committed partition");
        Ok(Partition::new(time, dir.display().to_string()))
    }
}

impl PartitionStore for LocalPartitionStore {
    fn committed_partitions(&self) -> Result<Vec<Partition>> {
        if !self.base.is_dir() {
            return Ok(Vec::new());
        }
        let base = glob::Pattern::escape(&self.base.to_string_lossy());
        let pattern = Path::new(&base).join("*").join(SUCCESS_MARKER);
        let markers = crate::io::glob::expand_glob(&pattern.to_string_lossy())?;
        let mut out = Vec::with_capacity(markers.len());
        for marker in markers {
            let Some(dir) = marker.parent() else { continue };
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            // Directories that do not carry a partition time are not ours.
            let Ok(naive) = NaiveDateTime::parse_from_str(name, PARTITION_TIME_FORMAT) else {
                debug!(dir = %dir.display(), "skipping non-partition directory");
                continue;
            };
            out.push(Partition::new(naive.and_utc(), dir.display().to_string()));
        }
        out.sort();
        Ok(out)
    }

    fn delete_partition(&self, partition: &Partition) -> Result<()> {
        let dir = Path::new(&partition.location);
        if !dir.starts_with(&self.base) {
            bail!(
                "partition {} is outside store {}",
                dir.display(),
                self.base.display()
            );
        }
        fs::remove_dir_all(dir).with_context(|| format!("remove {}", dir.display()))
    }
}
