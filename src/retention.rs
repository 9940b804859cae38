//! Partition retention.
//!
//! After a run's writers have all succeeded, [`RetentionManager`] computes
//! `cutoff = logical start time - retention window` and deletes every
//! committed partition whose time is strictly before the cutoff. A partition
//! exactly at the cutoff is kept.
//!
//! Partitions are listed fresh from the [`PartitionStore`] on every sweep, so
//! retrying after a partial failure only attempts what is still there.
//!
//! ```
//! use chrono::{TimeDelta, TimeZone, Utc};
//! use ironbeam_formats::retention::RetentionManager;
//! use ironbeam_formats::testing::{FixedRunContext, InMemoryPartitionStore};
//!
//! let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
//! let store = InMemoryPartitionStore::with_times([now - TimeDelta::days(10), now]);
//! let mut manager = RetentionManager::from_config(Some("7d"))?;
//! let report = manager.sweep(&FixedRunContext::new(now), &store)?;
//! assert_eq!(report.deleted.len(), 1);
//! assert_eq!(report.retained.len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::duration::RetentionSpec;
use crate::error::{ConfigError, DeletionFailure, RetentionError};
use crate::partition::{Partition, PartitionStore, RunContext};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Lifecycle state of a [`RetentionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    Sweeping,
}

/// How a write run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

/// Result of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// `None` when nothing was swept.
    pub cutoff: Option<DateTime<Utc>>,
    pub deleted: Vec<Partition>,
    pub retained: Vec<Partition>,
    /// No retention window is configured, or the run did not succeed.
    pub skipped: bool,
}

impl SweepReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Deletes partitions older than a retention window.
#[derive(Debug, Clone)]
pub struct RetentionManager {
    retention: Option<RetentionSpec>,
    state: SweepState,
}

impl RetentionManager {
    #[must_use]
    pub fn new(retention: Option<RetentionSpec>) -> Self {
        Self {
            retention,
            state: SweepState::Idle,
        }
    }

    /// Parse the configured window (e.g. `cleanPartitionsOlderThan`). Absent or
    /// blank means retention is off.
    ///
    /// # Errors
    /// [`ConfigError::InvalidDurationFormat`] for a malformed window.
    pub fn from_config(raw: Option<&str>) -> Result<Self, ConfigError> {
        let retention = raw
            .filter(|s| !s.trim().is_empty())
            .map(RetentionSpec::parse)
            .transpose()?;
        Ok(Self::new(retention))
    }

    #[must_use]
    pub fn retention(&self) -> Option<RetentionSpec> {
        self.retention
    }

    #[must_use]
    pub fn state(&self) -> SweepState {
        self.state
    }

    /// Sweep only if the run succeeded.
    ///
    /// # Errors
    /// See [`RetentionManager::sweep`].
    pub fn on_run_complete(
        &mut self,
        outcome: RunOutcome,
        ctx: &dyn RunContext,
        store: &dyn PartitionStore,
    ) -> Result<SweepReport, RetentionError> {
        if outcome != RunOutcome::Succeeded {
            debug!(?outcome, "run did not succeed; skipping retention");
            return Ok(SweepReport::skipped());
        }
        self.sweep(ctx, store)
    }

    /// Delete every committed partition older than the cutoff.
    ///
    /// Every eligible partition is attempted even if earlier deletions fail.
    ///
    /// # Errors
    /// - [`RetentionError::CutoffOutOfRange`] if the cutoff is not representable
    /// - [`RetentionError::Enumerate`] if the store cannot list partitions
    /// - [`RetentionError::DeletionFailed`] naming each partition that could
    ///   not be deleted, alongside those that were
    pub fn sweep(
        &mut self,
        ctx: &dyn RunContext,
        store: &dyn PartitionStore,
    ) -> Result<SweepReport, RetentionError> {
        let Some(retention) = self.retention else {
            debug!("no retention window configured; nothing to sweep");
            return Ok(SweepReport::skipped());
        };
        self.state = SweepState::Sweeping;
        let result = run_sweep(retention, ctx, store);
        self.state = SweepState::Idle;
        result
    }
}

fn run_sweep(
    retention: RetentionSpec,
    ctx: &dyn RunContext,
    store: &dyn PartitionStore,
) -> Result<SweepReport, RetentionError> {
    let run_time = ctx.logical_start_time();
    let cutoff = run_time
        .checked_sub_signed(retention.as_delta())
        .ok_or_else(|| RetentionError::CutoffOutOfRange {
            run_time: run_time.to_rfc3339(),
            retention: retention.to_string(),
        })?;
    info!(%run_time, %retention, %cutoff, "sweeping expired partitions");

    let partitions = store
        .committed_partitions()
        .map_err(RetentionError::Enumerate)?;

    let mut report = SweepReport {
        cutoff: Some(cutoff),
        ..SweepReport::default()
    };
    let mut failures = Vec::new();
    for partition in partitions {
        if partition.time >= cutoff {
            report.retained.push(partition);
            continue;
        }
        match store.delete_partition(&partition) {
            Ok(()) => {
                info!(%partition, "deleted expired partition");
                report.deleted.push(partition);
            }
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(%partition, error = %reason, "failed to delete partition");
                failures.push(DeletionFailure { partition, reason });
            }
        }
    }

    if failures.is_empty() {
        info!(
            deleted = report.deleted.len(),
            retained = report.retained.len(),
            "retention sweep finished"
        );
        Ok(report)
    } else {
        Err(RetentionError::DeletionFailed {
            deleted: report.deleted,
            failures,
        })
    }
}
