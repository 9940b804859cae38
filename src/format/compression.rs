//! Compression codec negotiation for the binary formats.
//!
//! Users name a codec in configuration (`compressionCodec`). Each format
//! accepts its own whitelist. Matching is ASCII case-insensitive; an absent
//! value or `none` disables compression; anything else is rejected outright
//! rather than silently falling back to no compression.

use crate::error::ConfigError;
use std::fmt;

/// Block compression codecs known across the binary formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockCodec {
    Snappy,
    Gzip,
    Deflate,
    Lzo,
    Zlib,
}

impl BlockCodec {
    /// Configuration name, lowercase.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Snappy => "snappy",
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
            Self::Lzo => "lzo",
            Self::Zlib => "zlib",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        [Self::Snappy, Self::Gzip, Self::Deflate, Self::Lzo, Self::Zlib]
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for BlockCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve the requested codec against a format's whitelist.
///
/// Returns `Ok(None)` when compression is disabled.
///
/// # Errors
/// [`ConfigError::UnsupportedCodec`] naming the requested value when it is
/// neither `none` nor in `supported`.
pub fn negotiate(
    format: &str,
    requested: Option<&str>,
    supported: &[BlockCodec],
) -> Result<Option<BlockCodec>, ConfigError> {
    let Some(requested) = requested else {
        return Ok(None);
    };
    if requested.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    BlockCodec::from_name(requested)
        .filter(|c| supported.contains(c))
        .map(Some)
        .ok_or_else(|| ConfigError::UnsupportedCodec {
            format: format.to_string(),
            codec: requested.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codec_outside_whitelist_is_rejected() {
        let err = negotiate("orc", Some("gzip"), &[BlockCodec::Snappy, BlockCodec::Zlib]);
        assert_eq!(
            err,
            Err(ConfigError::UnsupportedCodec {
                format: "orc".into(),
                codec: "gzip".into()
            })
        );
    }

    #[test]
    fn none_in_any_case_disables() {
        assert_eq!(negotiate("parquet", Some("NoNe"), &[]), Ok(None));
        assert_eq!(negotiate("parquet", None, &[]), Ok(None));
    }
}
