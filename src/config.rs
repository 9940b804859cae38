//! Resolved format configuration.
//!
//! Plugin properties arrive as a flat string map that may contain `${name}`
//! placeholders. [`FormatConfig::resolve`] substitutes every placeholder from
//! the run's arguments and parses the typed knobs once, up front. Codecs only
//! ever receive the resulting immutable [`FormatConfig`].

use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::LazyLock;

static MACRO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^{}]*)\}").expect("macro pattern is valid"));

/// Option keys recognized by the built-in formats.
pub mod keys {
    pub const DELIMITER: &str = "delimiter";
    pub const SCHEMA: &str = "schema";
    pub const COMPRESSION_CODEC: &str = "compressionCodec";
    pub const COMPRESSION_CHUNK_SIZE: &str = "compressionChunkSize";
    pub const STRIPE_SIZE: &str = "stripeSize";
    pub const INDEX_STRIDE: &str = "indexStride";
    pub const CREATE_INDEX: &str = "createIndex";
}

/// Per-format options after macro resolution. Absent options are `None`;
/// defaults are applied by the codec that consumes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatConfig {
    pub delimiter: Option<String>,
    pub schema: Option<String>,
    pub compression_codec: Option<String>,
    pub compression_chunk_size: Option<u64>,
    pub stripe_size: Option<u64>,
    pub index_stride: Option<u64>,
    pub create_index: Option<bool>,
}

impl FormatConfig {
    /// Builder-style setter for the delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Builder-style setter for the schema JSON.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Builder-style setter for the compression codec name.
    #[must_use]
    pub fn with_compression(mut self, codec: impl Into<String>) -> Self {
        self.compression_codec = Some(codec.into());
        self
    }

    /// Build from already-resolved string properties. Unknown keys are ignored.
    ///
    /// # Errors
    /// [`ConfigError::UnresolvedMacro`] if a value still contains a
    /// placeholder, [`ConfigError::InvalidOption`] for unparsable knobs.
    pub fn from_properties(props: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        Self::resolve(props, &BTreeMap::new())
    }

    /// Substitute `${name}` placeholders from `arguments`, then parse.
    ///
    /// # Errors
    /// [`ConfigError::UnresolvedMacro`] names the first option whose
    /// placeholder has no argument; [`ConfigError::InvalidOption`] reports a
    /// knob that is not a valid number or boolean.
    pub fn resolve(
        props: &BTreeMap<String, String>,
        arguments: &BTreeMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let resolved = resolve_properties(props, arguments)?;
        let text = |key: &str| resolved.get(key).cloned();
        Ok(Self {
            delimiter: text(keys::DELIMITER),
            schema: text(keys::SCHEMA),
            compression_codec: text(keys::COMPRESSION_CODEC),
            compression_chunk_size: parse_knob(&resolved, keys::COMPRESSION_CHUNK_SIZE)?,
            stripe_size: parse_knob(&resolved, keys::STRIPE_SIZE)?,
            index_stride: parse_knob(&resolved, keys::INDEX_STRIDE)?,
            create_index: parse_knob(&resolved, keys::CREATE_INDEX)?,
        })
    }
}

/// Substitute `${name}` placeholders in every property value.
///
/// # Errors
/// [`ConfigError::UnresolvedMacro`] if a referenced argument is missing.
pub fn resolve_properties(
    props: &BTreeMap<String, String>,
    arguments: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, ConfigError> {
    props
        .iter()
        .map(|(key, raw)| {
            let mut out = String::with_capacity(raw.len());
            let mut last = 0;
            for caps in MACRO_RE.captures_iter(raw) {
                let whole = caps.get(0).map_or(0..0, |m| m.range());
                let name = &caps[1];
                let value = arguments
                    .get(name)
                    .ok_or_else(|| ConfigError::UnresolvedMacro {
                        option: key.clone(),
                        name: name.to_string(),
                    })?;
                out.push_str(&raw[last..whole.start]);
                out.push_str(value);
                last = whole.end;
            }
            out.push_str(&raw[last..]);
            Ok((key.clone(), out))
        })
        .collect()
}

fn parse_knob<T: FromStr>(
    props: &BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    props
        .get(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidOption {
                option: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn substitutes_embedded_macros() {
        let out = resolve_properties(
            &props(&[("delimiter", "${sep}${sep}")]),
            &props(&[("sep", "|")]),
        )
        .unwrap();
        assert_eq!(out["delimiter"], "||");
    }

    #[test]
    fn knobs_are_parsed() {
        let cfg = FormatConfig::from_properties(&props(&[
            ("stripeSize", "67108864"),
            ("createIndex", "true"),
        ]))
        .unwrap();
        assert_eq!(cfg.stripe_size, Some(67_108_864));
        assert_eq!(cfg.create_index, Some(true));
        assert_eq!(cfg.index_stride, None);
    }
}
