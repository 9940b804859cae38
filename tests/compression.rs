#[cfg(any(
    feature = "compression-gzip",
    feature = "compression-zstd",
    feature = "compression-bzip2",
    feature = "compression-xz"
))]
mod compression_tests {
    use ironbeam_formats::io::compression::{StreamCodec, auto_detect_reader, auto_detect_writer};
    use std::io::{BufRead, Write};
    use std::path::Path;
    use tempfile::TempDir;

    const LINES: [&str; 3] = ["1,alice,0.5", "2,bob,", "3,\"carol, jr\",-1"];

    fn write_lines(path: &Path) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = auto_detect_writer(file, path)?;
        for line in LINES {
            writeln!(writer, "{line}")?;
        }
        writer.flush()?;
        Ok(())
    }

    fn read_lines(path: &Path) -> anyhow::Result<Vec<String>> {
        let file = std::fs::File::open(path)?;
        let reader = auto_detect_reader(file, path)?;
        Ok(reader.lines().collect::<std::io::Result<_>>()?)
    }

    fn round_trip(extension: &str) -> anyhow::Result<Vec<u8>> {
        let dir = TempDir::new()?;
        let path = dir.path().join(format!("data.csv{extension}"));
        write_lines(&path)?;
        assert_eq!(read_lines(&path)?, LINES);
        Ok(std::fs::read(&path)?)
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_gzip_roundtrip() -> anyhow::Result<()> {
        let raw = round_trip(".gz")?;
        assert!(raw.starts_with(StreamCodec::Gzip.magic_bytes()));
        Ok(())
    }

    #[cfg(feature = "compression-zstd")]
    #[test]
    fn test_zstd_roundtrip() -> anyhow::Result<()> {
        let raw = round_trip(".zst")?;
        assert!(raw.starts_with(StreamCodec::Zstd.magic_bytes()));
        Ok(())
    }

    #[cfg(feature = "compression-bzip2")]
    #[test]
    fn test_bzip2_roundtrip() -> anyhow::Result<()> {
        let raw = round_trip(".bz2")?;
        assert!(raw.starts_with(StreamCodec::Bzip2.magic_bytes()));
        Ok(())
    }

    #[cfg(feature = "compression-xz")]
    #[test]
    fn test_xz_roundtrip() -> anyhow::Result<()> {
        let raw = round_trip(".xz")?;
        assert!(raw.starts_with(StreamCodec::Xz.magic_bytes()));
        Ok(())
    }

    #[test]
    fn test_uncompressed_passthrough() -> anyhow::Result<()> {
        let raw = round_trip("")?;
        assert_eq!(String::from_utf8(raw)?, LINES.join("\n") + "\n");
        Ok(())
    }

    #[test]
    fn test_codec_from_path_is_case_insensitive() {
        for codec in StreamCodec::ALL {
            for ext in codec.extensions() {
                let upper = format!("DATA.CSV{}", ext.to_ascii_uppercase());
                assert_eq!(StreamCodec::from_path(&upper), Some(*codec));
            }
        }
        assert_eq!(StreamCodec::from_path("data.csv"), None);
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_magic_byte_detection() -> anyhow::Result<()> {
        use flate2::Compression;
        use flate2::write::GzEncoder;

        let dir = TempDir::new()?;
        let path = dir.path().join("data.dat");
        let mut encoder = GzEncoder::new(std::fs::File::create(&path)?, Compression::default());
        for line in LINES {
            writeln!(encoder, "{line}")?;
        }
        encoder.finish()?;

        assert_eq!(read_lines(&path)?, LINES);
        Ok(())
    }

    #[test]
    #[cfg(feature = "compression-gzip")]
    fn test_detect_from_magic_insufficient_bytes() -> anyhow::Result<()> {
        use std::io::Read;

        let data: &[u8] = &[0x1f];
        let mut reader = auto_detect_reader(std::io::Cursor::new(data), "test.dat")?;
        let mut out = Vec::new();
        reader.read_to_end(&mut out)?;
        assert_eq!(out, data);
        Ok(())
    }
}
