//! In-memory collaborators.

use crate::partition::{PARTITION_TIME_FORMAT, Partition, PartitionStore, RunContext};
use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A run whose logical start time is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRunContext {
    start: DateTime<Utc>,
}

impl FixedRunContext {
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self { start }
    }
}

impl RunContext for FixedRunContext {
    fn logical_start_time(&self) -> DateTime<Utc> {
        self.start
    }
}

/// A [`PartitionStore`] held in memory.
///
/// Deletions of chosen partitions can be made to fail, and every deletion
/// attempt is recorded so tests can check what a sweep touched.
#[derive(Debug, Default)]
pub struct InMemoryPartitionStore {
    partitions: Mutex<BTreeSet<Partition>>,
    failing: Mutex<HashSet<Partition>>,
    attempts: Mutex<Vec<Partition>>,
    fail_listing: Mutex<bool>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryPartitionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding one committed partition per time.
    pub fn with_times(times: impl IntoIterator<Item = DateTime<Utc>>) -> Self {
        let store = Self::new();
        for time in times {
            store.add(time);
        }
        store
    }

    /// Commit a partition at `time` under `mem://<time>`.
    pub fn add(&self, time: DateTime<Utc>) -> Partition {
        let partition = Partition::new(
            time,
            format!("mem://{}", time.format(PARTITION_TIME_FORMAT)),
        );
        lock(&self.partitions).insert(partition.clone());
        partition
    }

    /// Committed partitions in time order.
    #[must_use]
    pub fn partitions(&self) -> Vec<Partition> {
        lock(&self.partitions).iter().cloned().collect()
    }

    /// Make every later deletion of `partition` fail.
    pub fn fail_deletes_of(&self, partition: &Partition) {
        lock(&self.failing).insert(partition.clone());
    }

    /// Let all deletions succeed again.
    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
    }

    /// Make listing fail until switched back.
    pub fn fail_listing(&self, fail: bool) {
        *lock(&self.fail_listing) = fail;
    }

    /// Every partition a deletion was requested for, in request order.
    #[must_use]
    pub fn delete_attempts(&self) -> Vec<Partition> {
        lock(&self.attempts).clone()
    }
}

impl PartitionStore for InMemoryPartitionStore {
    fn committed_partitions(&self) -> Result<Vec<Partition>> {
        if *lock(&self.fail_listing) {
            bail!("partition listing unavailable");
        }
        Ok(self.partitions())
    }

    fn delete_partition(&self, partition: &Partition) -> Result<()> {
        lock(&self.attempts).push(partition.clone());
        if lock(&self.failing).contains(partition) {
            bail!("injected failure deleting {partition}");
        }
        if !lock(&self.partitions).remove(partition) {
            bail!("partition {partition} does not exist");
        }
        Ok(())
    }
}
