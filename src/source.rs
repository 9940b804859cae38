//! File input.
//!
//! A [`FileSource`] expands its path (file, directory or glob) into one
//! [`InputSplit`] per file. Each split is read through its own
//! [`RecordStream`]; [`FileSource::read_all_par`] reads every split on the
//! rayon pool with one stream per task.

use crate::config::FormatConfig;
use crate::error::ConfigError;
use crate::format::{FileFormat, InputSplit, RecordStream, WriteConfiguration};
use crate::io::glob::expand_input;
use crate::record::StructuredRecord;
use crate::schema::Schema;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::info;

/// Reads records of one schema from a set of files.
pub struct FileSource {
    format: Arc<dyn FileFormat>,
    path: String,
    schema: Arc<Schema>,
    conf: WriteConfiguration,
}

impl FileSource {
    /// A source over `path` decoded with `format`.
    ///
    /// # Errors
    /// Any [`ConfigError`] the format reports for `config`.
    pub fn new(
        format: Arc<dyn FileFormat>,
        path: impl Into<String>,
        schema: Arc<Schema>,
        config: &FormatConfig,
    ) -> Result<Self, ConfigError> {
        let conf = format.build_read_configuration(config)?;
        Ok(Self {
            format,
            path: path.into(),
            schema,
            conf,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// One whole-file split per input file, in path order.
    ///
    /// # Errors
    /// Fails if the path matches no files.
    pub fn splits(&self) -> Result<Vec<InputSplit>> {
        Ok(expand_input(&self.path)?
            .into_iter()
            .map(InputSplit::whole)
            .collect())
    }

    /// Open a lazy stream over one split.
    ///
    /// # Errors
    /// Fails if the split cannot be opened.
    pub fn read_split(&self, split: &InputSplit) -> Result<RecordStream> {
        self.format
            .create_reader(split, Arc::clone(&self.schema), &self.conf)
            .with_context(|| format!("open {} split {split}", self.format.name()))
    }

    /// Read every split in parallel.
    ///
    /// Records keep file order within a split and splits are concatenated in
    /// path order.
    ///
    /// # Errors
    /// The first failing split fails the whole read.
    pub fn read_all_par(&self) -> Result<Vec<StructuredRecord>> {
        let splits = self.splits()?;
        let per_split = splits
            .par_iter()
            .map(|split| self.read_split(split)?.collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;
        let records: Vec<StructuredRecord> = per_split.into_iter().flatten().collect();
        info!(
            path = %self.path,
            splits = splits.len(),
            records = records.len(),
            "read file source"
        );
        Ok(records)
    }
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("format", &self.format.name())
            .field("path", &self.path)
            .field("schema", &self.schema.name())
            .finish()
    }
}
