//! Format codecs: conversion between [`StructuredRecord`]s and on-disk encodings.
//!
//! Every format implements [`FileFormat`]. The write path is two-phase: the
//! coordinating process calls [`FileFormat::build_write_configuration`] once,
//! which validates the [`FormatConfig`] and produces a flat, immutable
//! [`WriteConfiguration`]. That configuration is shared read-only with every
//! writer task, each of which opens its own [`RecordWriter`].
//!
//! The read path opens one [`RecordStream`] per [`InputSplit`]. Streams are
//! lazy, single pass, and close their underlying reader as soon as they are
//! exhausted, fail, or are dropped.
//!
//! Formats are looked up by name through [`registry::FormatRegistry`].

pub mod compression;
pub mod delimited;
pub mod orc;
pub mod registry;

#[cfg_attr(docsrs, doc(cfg(feature = "io-avro")))]
#[cfg(feature = "io-avro")]
pub mod avro;

#[cfg_attr(docsrs, doc(cfg(feature = "io-parquet")))]
#[cfg(feature = "io-parquet")]
pub mod parquet;

use crate::config::FormatConfig;
use crate::error::{ConfigError, ConversionError};
use crate::record::StructuredRecord;
use crate::schema::Schema;
use anyhow::{Result, bail};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Flat key/value configuration handed verbatim to a byte-level reader or writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteConfiguration(BTreeMap<String, String>);

impl WriteConfiguration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl From<BTreeMap<String, String>> for WriteConfiguration {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for WriteConfiguration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One unit of input: a file, optionally restricted to a window of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSplit {
    pub path: PathBuf,
    /// Record-index window `[start, end)` in the file's natural order.
    pub range: Option<(u64, u64)>,
}

impl InputSplit {
    /// The whole file.
    pub fn whole(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            range: None,
        }
    }

    /// Records `start..end` of the file.
    pub fn range(path: impl Into<PathBuf>, start: u64, end: u64) -> Self {
        Self {
            path: path.into(),
            range: Some((start, end.max(start))),
        }
    }
}

impl fmt::Display for InputSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range {
            Some((start, end)) => write!(f, "{}[{start}..{end})", self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

type BoxedRecords = Box<dyn Iterator<Item = Result<StructuredRecord>> + Send>;

/// A lazy, single-pass sequence of records from one split.
///
/// The underlying reader is dropped as soon as the stream is exhausted,
/// yields an error, is closed, or is itself dropped. After an error the stream
/// yields nothing further: a conversion failure aborts the split.
pub struct RecordStream {
    split: String,
    inner: Option<BoxedRecords>,
    position: u64,
    range: Option<(u64, u64)>,
}

impl RecordStream {
    /// Wrap a record iterator for `split`, applying the split's record window.
    pub fn new<I>(split: &InputSplit, records: I) -> Self
    where
        I: Iterator<Item = Result<StructuredRecord>> + Send + 'static,
    {
        debug!(split = %split, "opened split");
        Self {
            split: split.to_string(),
            inner: Some(Box::new(records)),
            position: 0,
            range: split.range,
        }
    }

    /// Whether the underlying reader has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Release the underlying reader now. Already yielded records stay valid.
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            debug!(split = %self.split, records = self.position, "closed split");
        }
    }
}

impl Iterator for RecordStream {
    type Item = Result<StructuredRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((_, end)) = self.range
                && self.position >= end
            {
                self.close();
                return None;
            }
            let next = self.inner.as_mut()?.next();
            match next {
                None => {
                    self.close();
                    return None;
                }
                Some(Err(e)) => {
                    self.close();
                    return Some(Err(e));
                }
                Some(Ok(record)) => {
                    let index = self.position;
                    self.position += 1;
                    if let Some((start, _)) = self.range
                        && index < start
                    {
                        continue;
                    }
                    return Some(Ok(record));
                }
            }
        }
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStream")
            .field("split", &self.split)
            .field("position", &self.position)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Writes records of one schema to one output file.
pub trait RecordWriter: Send {
    /// Encode one record.
    ///
    /// # Errors
    /// Returns an error if the record does not match the writer's schema, a
    /// value cannot be encoded, or the underlying write fails.
    fn write(&mut self, record: &StructuredRecord) -> Result<()>;

    /// Flush everything and close the file, returning the number of records
    /// written.
    ///
    /// # Errors
    /// Returns an error if the final flush fails.
    fn close(self: Box<Self>) -> Result<u64>;
}

/// Reject records whose schema differs from the writer's.
pub(crate) fn check_schema(expected: &Schema, record: &StructuredRecord) -> Result<(), ConversionError> {
    if record.schema().as_ref() == expected {
        Ok(())
    } else {
        Err(ConversionError::SchemaMismatch {
            expected: expected.name().to_string(),
            found: record.schema().name().to_string(),
        })
    }
}

/// A file format: configuration validation plus reader and writer factories.
pub trait FileFormat: Send + Sync {
    /// Registry name, lowercase.
    fn name(&self) -> &str;

    /// Check `config` without producing anything.
    ///
    /// # Errors
    /// The first [`ConfigError`] found.
    fn validate_config(&self, config: &FormatConfig) -> Result<(), ConfigError>;

    /// Validate `config` and translate it into the writer's native keys.
    ///
    /// # Errors
    /// Any [`ConfigError`] reported by [`FileFormat::validate_config`].
    fn build_write_configuration(
        &self,
        config: &FormatConfig,
    ) -> Result<WriteConfiguration, ConfigError>;

    /// Reader-side options. Defaults to no options.
    ///
    /// # Errors
    /// Any [`ConfigError`] for options the reader needs.
    fn build_read_configuration(
        &self,
        config: &FormatConfig,
    ) -> Result<WriteConfiguration, ConfigError> {
        let _ = config;
        Ok(WriteConfiguration::new())
    }

    /// Open a lazy record stream over `split`.
    ///
    /// # Errors
    /// Returns an error if the split cannot be opened.
    fn create_reader(
        &self,
        split: &InputSplit,
        schema: Arc<Schema>,
        conf: &WriteConfiguration,
    ) -> Result<RecordStream> {
        let _ = (split, schema, conf);
        bail!("format '{}' does not provide a record reader", self.name())
    }

    /// Open a writer for one output file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or the configuration is
    /// not usable by this build.
    fn create_writer(
        &self,
        path: &Path,
        schema: Arc<Schema>,
        conf: &WriteConfiguration,
    ) -> Result<Box<dyn RecordWriter>> {
        let _ = (path, schema, conf);
        bail!("format '{}' does not provide a record writer", self.name())
    }
}
