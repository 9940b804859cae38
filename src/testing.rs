//! Test support for code built on this crate.
//!
//! - **Fakes**: [`InMemoryPartitionStore`] (with failure injection) and
//!   [`FixedRunContext`] stand in for the run's collaborators
//! - **Fixtures**: ready-made schemas and records
//! - **Assertions**: record comparisons with readable failure output
//! - **Mock I/O**: temporary directories and pre-written input files
//!
//! # Quick Start
//!
//! ```
//! use chrono::{TimeDelta, TimeZone, Utc};
//! use ironbeam_formats::retention::RetentionManager;
//! use ironbeam_formats::testing::*;
//!
//! let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
//! let store = InMemoryPartitionStore::with_times([now - TimeDelta::days(3)]);
//! store.fail_deletes_of(&store.partitions()[0]);
//!
//! let mut manager = RetentionManager::from_config(Some("1d")).unwrap();
//! assert!(manager.sweep(&FixedRunContext::new(now), &store).is_err());
//! assert_eq!(store.partitions().len(), 1);
//! ```

pub mod assertions;
pub mod fakes;
pub mod fixtures;
pub mod mock_io;

pub use assertions::*;
pub use fakes::*;
pub use fixtures::*;
pub use mock_io::*;
