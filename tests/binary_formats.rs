use ironbeam_formats::error::ConfigError;
use ironbeam_formats::format::orc::{self, OrcFormat};
use ironbeam_formats::testing::*;
use ironbeam_formats::{FileFormat, FormatConfig, FormatRegistry, InputSplit, StructuredRecord};
use std::path::Path;
use std::sync::Arc;

fn schema_config() -> FormatConfig {
    FormatConfig::default().with_schema(SAMPLE_SCHEMA_JSON)
}

fn round_trip(
    format: &dyn FileFormat,
    config: &FormatConfig,
    path: &Path,
) -> anyhow::Result<Vec<StructuredRecord>> {
    let conf = format.build_write_configuration(config)?;
    let mut writer = format.create_writer(path, sample_schema(), &conf)?;
    for record in sample_records() {
        writer.write(&record)?;
    }
    assert_eq!(writer.close()?, 4);

    let read_conf = format.build_read_configuration(config)?;
    format
        .create_reader(&InputSplit::whole(path), sample_schema(), &read_conf)?
        .collect()
}

#[test]
fn codec_names_are_case_insensitive() -> anyhow::Result<()> {
    let registry = FormatRegistry::builtin();
    for name in registry.names().filter(|n| ["parquet", "orc", "avro"].contains(n)) {
        let format = registry.resolve(name)?;
        let confs = ["Snappy", "SNAPPY", "snappy"]
            .into_iter()
            .map(|codec| format.build_write_configuration(&schema_config().with_compression(codec)))
            .collect::<Result<Vec<_>, _>>()?;
        assert!(confs.windows(2).all(|w| w[0] == w[1]), "{name}");
    }
    Ok(())
}

#[test]
fn unsupported_codecs_are_rejected_with_their_name() {
    let registry = FormatRegistry::builtin();
    for (format, codec) in [
        ("parquet", "bzip2"),
        ("parquet", "zlib"),
        ("orc", "bzip2"),
        ("orc", "gzip"),
        ("avro", "bzip2"),
        ("avro", "lzo"),
    ] {
        let Ok(f) = registry.resolve(format) else { continue };
        let err = f
            .validate_config(&schema_config().with_compression(codec))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnsupportedCodec {
                format: format.into(),
                codec: codec.into(),
            }
        );
    }
}

#[test]
fn schema_is_required_and_must_parse() {
    let registry = FormatRegistry::builtin();
    for name in ["parquet", "orc", "avro"] {
        let Ok(format) = registry.resolve(name) else { continue };
        assert!(matches!(
            format.validate_config(&FormatConfig::default()),
            Err(ConfigError::MissingOption { option: "schema", .. })
        ));
        assert!(matches!(
            format.validate_config(&FormatConfig::default().with_schema("{\"type\":")),
            Err(ConfigError::InvalidSchema(_))
        ));
    }
}

#[test]
fn orc_configuration_keys() -> anyhow::Result<()> {
    let conf = OrcFormat.build_write_configuration(&schema_config().with_compression("zlib"))?;
    assert_eq!(
        conf.get(orc::SCHEMA_KEY),
        Some("struct<id:bigint,user:string,referrer:string,score:double,active:boolean,retries:int>")
    );
    assert_eq!(conf.get(orc::COMPRESS_KEY), Some("ZLIB"));
    assert_eq!(conf.len(), 2);

    let none = OrcFormat.build_write_configuration(&schema_config().with_compression("None"))?;
    assert!(!none.contains_key(orc::COMPRESS_KEY));
    Ok(())
}

#[test]
fn orc_knobs_pass_through_independently() -> anyhow::Result<()> {
    let mut config = schema_config();
    config.stripe_size = Some(64 << 20);
    let conf = OrcFormat.build_write_configuration(&config)?;
    assert_eq!(conf.get(orc::STRIPE_SIZE_KEY), Some("67108864"));
    assert!(!conf.contains_key(orc::COMPRESS_SIZE_KEY));
    assert!(!conf.contains_key(orc::COMPRESS_KEY));

    let mut config = schema_config();
    config.index_stride = Some(5000);
    let conf = OrcFormat.build_write_configuration(&config)?;
    assert_eq!(conf.get(orc::ROW_INDEX_STRIDE_KEY), Some("5000"));
    assert!(!conf.contains_key(orc::CREATE_INDEX_KEY));

    let mut config = schema_config().with_compression("snappy");
    config.compression_chunk_size = Some(262_144);
    config.create_index = Some(false);
    let conf = OrcFormat.build_write_configuration(&config)?;
    assert_eq!(conf.get(orc::COMPRESS_SIZE_KEY), Some("262144"));
    assert_eq!(conf.get(orc::CREATE_INDEX_KEY), Some("false"));
    assert!(!conf.contains_key(orc::ROW_INDEX_STRIDE_KEY));
    Ok(())
}

#[test]
fn orc_has_no_record_codec() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let conf = OrcFormat.build_write_configuration(&schema_config())?;
    assert!(
        OrcFormat
            .create_writer(&dir.file_path("part.orc"), sample_schema(), &conf)
            .is_err()
    );
    Ok(())
}

#[cfg(feature = "io-parquet")]
mod parquet_tests {
    use super::*;
    use ironbeam_formats::format::parquet::{COMPRESSION_KEY, ParquetFormat, SCHEMA_KEY};

    #[test]
    fn round_trip_uncompressed_and_compressed() -> anyhow::Result<()> {
        let dir = TempDirPath::new()?;
        for codec in ["none", "snappy", "GZIP"] {
            let config = schema_config().with_compression(codec);
            let path = dir.file_path(&format!("{codec}.parquet"));
            let back = round_trip(&ParquetFormat, &config, &path)?;
            assert_records_equal(&back, &sample_records());
        }
        Ok(())
    }

    #[test]
    fn write_configuration_keys() -> anyhow::Result<()> {
        let conf = ParquetFormat.build_write_configuration(&schema_config().with_compression("Snappy"))?;
        assert_eq!(conf.get(COMPRESSION_KEY), Some("SNAPPY"));
        assert_eq!(conf.get(SCHEMA_KEY), Some(SAMPLE_SCHEMA_JSON));
        Ok(())
    }

    #[test]
    fn lzo_validates_but_cannot_be_written() -> anyhow::Result<()> {
        let dir = TempDirPath::new()?;
        let conf = ParquetFormat.build_write_configuration(&schema_config().with_compression("lzo"))?;
        assert_eq!(conf.get(COMPRESSION_KEY), Some("LZO"));
        let err = ParquetFormat
            .create_writer(&dir.file_path("x.parquet"), sample_schema(), &conf)
            .err()
            .expect("lzo writer is refused");
        assert!(err.to_string().contains("LZO"));
        Ok(())
    }

    #[test]
    fn reader_coerces_to_requested_schema() -> anyhow::Result<()> {
        let dir = TempDirPath::new()?;
        let path = dir.file_path("narrow.parquet");
        round_trip(&ParquetFormat, &schema_config(), &path)?;

        let wide = Arc::new(ironbeam_formats::Schema::parse_json(
            r#"{"type":"record","name":"wide","fields":[
                {"name":"retries","type":["null","long"]},
                {"name":"id","type":"double"}]}"#,
        )?);
        let records: Vec<_> = ParquetFormat
            .create_reader(&InputSplit::whole(&path), wide, &Default::default())?
            .collect::<anyhow::Result<_>>()?;
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].get("id")?, &ironbeam_formats::Value::Double(1.0));
        assert_eq!(records[2].get("retries")?, &ironbeam_formats::Value::Long(4));
        assert!(records[1].get("retries")?.is_null());
        Ok(())
    }
}

#[cfg(feature = "io-avro")]
mod avro_tests {
    use super::*;
    use ironbeam_formats::format::avro::{AvroFormat, BLOCK_ROWS, CODEC_KEY, COMPRESS_KEY};

    #[test]
    fn round_trip_with_every_codec() -> anyhow::Result<()> {
        let dir = TempDirPath::new()?;
        for codec in ["none", "Snappy", "deflate"] {
            let config = schema_config().with_compression(codec);
            let path = dir.file_path(&format!("{codec}.avro"));
            let back = round_trip(&AvroFormat, &config, &path)?;
            assert_records_equal(&back, &sample_records());
        }
        Ok(())
    }

    #[test]
    fn large_shards_are_written_in_several_blocks() -> anyhow::Result<()> {
        let dir = TempDirPath::new()?;
        let records: Vec<_> = sample_records()
            .into_iter()
            .cycle()
            .take(2 * BLOCK_ROWS + 3)
            .collect();
        for codec in ["none", "snappy"] {
            let config = schema_config().with_compression(codec);
            let path = dir.file_path(&format!("large-{codec}.avro"));
            let conf = AvroFormat.build_write_configuration(&config)?;
            let mut writer = AvroFormat.create_writer(&path, sample_schema(), &conf)?;
            for record in &records {
                writer.write(record)?;
            }
            assert_eq!(writer.close()?, records.len() as u64);

            let back: Vec<_> = AvroFormat
                .create_reader(&InputSplit::whole(&path), sample_schema(), &conf)?
                .collect::<anyhow::Result<_>>()?;
            assert_records_equal(&back, &records);
        }

        let empty = dir.file_path("empty.avro");
        let conf = AvroFormat.build_write_configuration(&schema_config())?;
        let writer = AvroFormat.create_writer(&empty, sample_schema(), &conf)?;
        assert_eq!(writer.close()?, 0);
        let back = AvroFormat
            .create_reader(&InputSplit::whole(&empty), sample_schema(), &conf)?
            .count();
        assert_eq!(back, 0);
        Ok(())
    }

    #[test]
    fn compression_flags() -> anyhow::Result<()> {
        let conf = AvroFormat.build_write_configuration(&schema_config().with_compression("DEFLATE"))?;
        assert_eq!(conf.get(COMPRESS_KEY), Some("true"));
        assert_eq!(conf.get(CODEC_KEY), Some("deflate"));

        let conf = AvroFormat.build_write_configuration(&schema_config())?;
        assert!(!conf.contains_key(COMPRESS_KEY));
        Ok(())
    }
}
