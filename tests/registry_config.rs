use ironbeam_formats::config::resolve_properties;
use ironbeam_formats::error::ConfigError;
use ironbeam_formats::format::delimited::DelimitedFormat;
use ironbeam_formats::{FileFormat, FormatConfig, FormatRegistry, WriteConfiguration};
use std::collections::BTreeMap;
use std::sync::Arc;

fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[test]
fn builtin_formats_resolve_case_insensitively() -> anyhow::Result<()> {
    let registry = FormatRegistry::builtin();
    for name in ["csv", "CSV", "Tsv", "delimited", "ORC"] {
        let format = registry.resolve(name)?;
        assert_eq!(format.name(), name.to_ascii_lowercase());
    }
    #[cfg(feature = "io-parquet")]
    assert_eq!(registry.resolve("Parquet")?.name(), "parquet");
    #[cfg(feature = "io-avro")]
    assert_eq!(registry.resolve("avro")?.name(), "avro");

    let names: Vec<_> = registry.names().collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);
    Ok(())
}

#[test]
fn unknown_format_is_a_config_error() {
    let err = FormatRegistry::builtin().resolve("xml").err();
    assert_eq!(err, Some(ConfigError::UnknownFormat("xml".into())));
    assert!(FormatRegistry::new().resolve("csv").is_err());
}

#[derive(Debug)]
struct PipeFormat;

impl FileFormat for PipeFormat {
    fn name(&self) -> &str {
        "pipe"
    }

    fn validate_config(&self, _config: &FormatConfig) -> Result<(), ConfigError> {
        Ok(())
    }

    fn build_write_configuration(
        &self,
        _config: &FormatConfig,
    ) -> Result<WriteConfiguration, ConfigError> {
        Ok([("delimiter", "|")].into_iter().collect())
    }
}

#[test]
fn custom_formats_can_be_registered_and_replaced() -> anyhow::Result<()> {
    let mut registry = FormatRegistry::builtin();
    registry.register("Pipe", || Arc::new(PipeFormat));
    assert!(registry.contains("pipe"));
    let conf = registry
        .resolve("PIPE")?
        .build_write_configuration(&FormatConfig::default())?;
    assert_eq!(conf.get("delimiter"), Some("|"));

    registry.register("csv", || Arc::new(DelimitedFormat::tsv()));
    assert_eq!(registry.resolve("csv")?.name(), "tsv");
    Ok(())
}

#[test]
fn macros_are_substituted_from_arguments() -> anyhow::Result<()> {
    let config = FormatConfig::resolve(
        &map(&[
            ("schema", "${schema}"),
            ("compressionCodec", "${codec}"),
            ("stripeSize", "${stripe}"),
            ("createIndex", "true"),
            ("unrelated", "kept"),
        ]),
        &map(&[
            ("schema", r#"{"type":"record","fields":[{"name":"a","type":"int"}]}"#),
            ("codec", "SNAPPY"),
            ("stripe", "1024"),
        ]),
    )?;
    assert_eq!(config.compression_codec.as_deref(), Some("SNAPPY"));
    assert_eq!(config.stripe_size, Some(1024));
    assert_eq!(config.create_index, Some(true));
    assert!(config.schema.is_some_and(|s| s.starts_with("{\"type\"")));
    Ok(())
}

#[test]
fn unresolved_macros_name_option_and_argument() {
    let err = FormatConfig::resolve(&map(&[("delimiter", "${sep}")]), &BTreeMap::new()).unwrap_err();
    assert_eq!(
        err,
        ConfigError::UnresolvedMacro {
            option: "delimiter".into(),
            name: "sep".into(),
        }
    );

    let props = map(&[("schema", "prefix-${a}-${b}")]);
    let err = resolve_properties(&props, &map(&[("a", "1")])).unwrap_err();
    assert!(matches!(err, ConfigError::UnresolvedMacro { name, .. } if name == "b"));
}

#[test]
fn bad_knob_values_are_invalid_options() {
    let err = FormatConfig::from_properties(&map(&[("indexStride", "ten")])).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidOption { ref option, ref value, .. }
            if option == "indexStride" && value == "ten"
    ));
    assert!(FormatConfig::from_properties(&map(&[("createIndex", "yes")])).is_err());
}

#[test]
fn format_config_deserializes_camel_case() -> anyhow::Result<()> {
    let config: FormatConfig = serde_json::from_str(
        r#"{"delimiter":";","compressionCodec":"zlib","compressionChunkSize":4096}"#,
    )?;
    assert_eq!(config.delimiter.as_deref(), Some(";"));
    assert_eq!(config.compression_codec.as_deref(), Some("zlib"));
    assert_eq!(config.compression_chunk_size, Some(4096));
    assert_eq!(config.stripe_size, None);
    Ok(())
}
