//! Transparent stream compression for text formats.
//!
//! Delimited text files may be stored compressed. Readers detect the codec from
//! the file extension first and fall back to the stream's magic bytes; writers
//! go by extension only. Without a match the stream passes through (buffered).
//!
//! Built-in codecs, each behind its feature flag:
//! - **Gzip** (`.gz`) via `flate2` (`compression-gzip`)
//! - **Zstd** (`.zst`) via `zstd` (`compression-zstd`)
//! - **Bzip2** (`.bz2`) via `bzip2` (`compression-bzip2`)
//! - **Xz** (`.xz`) via `xz2` (`compression-xz`)
//!
//! This is unrelated to the block compression negotiated by the binary formats
//! (see [`crate::format::compression`]); those engines compress internally.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A whole-stream compression codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCodec {
    #[cfg(feature = "compression-gzip")]
    Gzip,
    #[cfg(feature = "compression-zstd")]
    Zstd,
    #[cfg(feature = "compression-bzip2")]
    Bzip2,
    #[cfg(feature = "compression-xz")]
    Xz,
}

impl StreamCodec {
    /// Every codec compiled into this build.
    pub const ALL: &'static [Self] = &[
        #[cfg(feature = "compression-gzip")]
        Self::Gzip,
        #[cfg(feature = "compression-zstd")]
        Self::Zstd,
        #[cfg(feature = "compression-bzip2")]
        Self::Bzip2,
        #[cfg(feature = "compression-xz")]
        Self::Xz,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => "gzip",
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => "zstd",
            #[cfg(feature = "compression-bzip2")]
            Self::Bzip2 => "bzip2",
            #[cfg(feature = "compression-xz")]
            Self::Xz => "xz",
        }
    }

    /// Lowercase extensions, leading dot included.
    #[must_use]
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => &[".gz", ".gzip"],
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => &[".zst", ".zstd"],
            #[cfg(feature = "compression-bzip2")]
            Self::Bzip2 => &[".bz2", ".bzip2"],
            #[cfg(feature = "compression-xz")]
            Self::Xz => &[".xz"],
        }
    }

    #[must_use]
    pub const fn magic_bytes(self) -> &'static [u8] {
        match self {
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => &[0x1f, 0x8b],
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => &[0x28, 0xb5, 0x2f, 0xfd],
            #[cfg(feature = "compression-bzip2")]
            Self::Bzip2 => b"BZh",
            #[cfg(feature = "compression-xz")]
            Self::Xz => &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00],
        }
    }

    /// Codec implied by a file name, if any. Case-insensitive.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let name = path.as_ref().to_string_lossy().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.extensions().iter().any(|ext| name.ends_with(ext)))
    }

    /// Codec whose signature starts `header`, if any.
    #[must_use]
    pub fn from_magic(header: &[u8]) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| header.starts_with(c.magic_bytes()))
    }

    fn decoder<'a>(self, reader: Box<dyn Read + Send + 'a>) -> Result<Box<dyn Read + Send + 'a>> {
        Ok(match self {
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => Box::new(flate2::read::MultiGzDecoder::new(reader)),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
            #[cfg(feature = "compression-bzip2")]
            Self::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(reader)),
            #[cfg(feature = "compression-xz")]
            Self::Xz => Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)),
        })
    }

    fn encoder<'a>(self, writer: Box<dyn Write + Send + 'a>) -> Result<Box<dyn Write + Send + 'a>> {
        Ok(match self {
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => Box::new(flate2::write::GzEncoder::new(
                writer,
                flate2::Compression::default(),
            )),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => Box::new(zstd::stream::write::Encoder::new(writer, 3)?.auto_finish()),
            #[cfg(feature = "compression-bzip2")]
            Self::Bzip2 => Box::new(bzip2::write::BzEncoder::new(
                writer,
                bzip2::Compression::default(),
            )),
            #[cfg(feature = "compression-xz")]
            Self::Xz => Box::new(xz2::write::XzEncoder::new(writer, 6)),
        })
    }
}

/// Wrap `reader` with a decompressor when the path or content calls for one.
///
/// # Errors
/// Returns an error if the decompressor cannot be initialized.
pub fn auto_detect_reader<'a, R: Read + Send + 'a>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn BufRead + Send + 'a>> {
    let mut buffered = BufReader::new(reader);
    let codec = match StreamCodec::from_path(&path_hint) {
        Some(codec) => Some(codec),
        None => {
            let header = buffered.fill_buf().context("peek stream header")?;
            StreamCodec::from_magic(header)
        }
    };
    match codec {
        Some(codec) => {
            let decoded = codec
                .decoder(Box::new(buffered))
                .with_context(|| format!("wrap reader with {} codec", codec.name()))?;
            Ok(Box::new(BufReader::new(decoded)))
        }
        None => Ok(Box::new(buffered)),
    }
}

/// Wrap `writer` with a compressor when the path's extension calls for one.
///
/// # Errors
/// Returns an error if the compressor cannot be initialized.
pub fn auto_detect_writer<'a, W: Write + Send + 'a>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Write + Send + 'a>> {
    let buffered: Box<dyn Write + Send + 'a> = Box::new(BufWriter::new(writer));
    match StreamCodec::from_path(&path_hint) {
        Some(codec) => codec
            .encoder(buffered)
            .with_context(|| format!("wrap writer with {} codec", codec.name())),
        None => Ok(buffered),
    }
}
