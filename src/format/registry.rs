//! Name → format lookup.
//!
//! Formats are registered explicitly as factory functions and resolved at
//! configuration time. Names are matched case-insensitively.
//!
//! ```
//! use ironbeam_formats::format::registry::FormatRegistry;
//!
//! let registry = FormatRegistry::builtin();
//! let csv = registry.resolve("CSV")?;
//! assert_eq!(csv.name(), "csv");
//! # Ok::<(), ironbeam_formats::error::ConfigError>(())
//! ```

use super::FileFormat;
use super::delimited::DelimitedFormat;
use super::orc::OrcFormat;
use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Produces a format instance.
pub type FormatFactory = fn() -> Arc<dyn FileFormat>;

/// Registered formats, keyed by lowercase name.
#[derive(Clone, Default)]
pub struct FormatRegistry {
    factories: BTreeMap<String, FormatFactory>,
}

impl FormatRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every format compiled into this build.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("csv", || Arc::new(DelimitedFormat::csv()));
        registry.register("tsv", || Arc::new(DelimitedFormat::tsv()));
        registry.register("delimited", || Arc::new(DelimitedFormat::delimited()));
        registry.register("orc", || Arc::new(OrcFormat));
        #[cfg(feature = "io-parquet")]
        registry.register("parquet", || Arc::new(super::parquet::ParquetFormat));
        #[cfg(feature = "io-avro")]
        registry.register("avro", || Arc::new(super::avro::AvroFormat));
        registry
    }

    /// Register `factory` under `name`, replacing any existing entry.
    pub fn register(&mut self, name: &str, factory: FormatFactory) -> &mut Self {
        self.factories.insert(name.to_ascii_lowercase(), factory);
        self
    }

    /// Instantiate the format registered as `name`.
    ///
    /// # Errors
    /// [`ConfigError::UnknownFormat`] if nothing is registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn FileFormat>, ConfigError> {
        let factory = self
            .factories
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| ConfigError::UnknownFormat(name.to_string()))?;
        debug!(format = name, "resolved format");
        Ok(factory())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
