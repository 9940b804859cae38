use chrono::{TimeDelta, TimeZone, Utc};
use ironbeam_formats::error::ConfigError;
use ironbeam_formats::testing::*;
use ironbeam_formats::{
    FileSetSink, FileSource, FormatConfig, FormatRegistry, LocalPartitionStore, PartitionStore,
    RunOutcome, SinkConfig,
};
use std::collections::BTreeMap;
use std::fs;

fn no_arguments() -> BTreeMap<String, String> {
    BTreeMap::new()
}

#[test]
fn sharded_partition_reads_back() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let store = LocalPartitionStore::new(dir.path());
    let time = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let registry = FormatRegistry::builtin();

    let sink = FileSetSink::prepare(
        &SinkConfig::new("csv").with_property("delimiter", "${sep}"),
        &registry,
        &BTreeMap::from([("sep".to_string(), "|".to_string())]),
        sample_schema(),
    )?;
    assert_eq!(sink.write_configuration().get("delimiter"), Some("|"));

    let partition = sink.write_partition(&store, time, &sample_records(), Some(3))?;
    assert_eq!(partition.time, time);
    let dir_of = store.partition_dir(time);
    assert!(dir_of.join("_SUCCESS").exists());
    for i in 0..3 {
        assert!(dir_of.join(format!("part-{i:05}.csv")).exists());
    }

    let source = FileSource::new(
        registry.resolve("csv")?,
        dir_of.display().to_string(),
        sample_schema(),
        &FormatConfig::default().with_delimiter("|"),
    )?;
    assert_eq!(source.splits()?.len(), 3);
    let records = source.read_all_par()?;
    assert_records_equal(&records, &sample_records());
    Ok(())
}

#[test]
fn failed_shard_leaves_nothing_committed() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let store = LocalPartitionStore::new(dir.path());
    let time = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

    let sink = FileSetSink::prepare(
        &SinkConfig::new("tsv"),
        &FormatRegistry::builtin(),
        &no_arguments(),
        three_field_schema(),
    )?;
    let records = vec![
        record_of(&three_field_schema(), vec!["ok".into(), "x".into(), 1.into()]),
        record_of(&three_field_schema(), vec!["bad\tvalue".into(), "y".into(), 2.into()]),
    ];
    assert!(sink.write_partition(&store, time, &records, Some(2)).is_err());
    assert!(store.committed_partitions()?.is_empty());
    assert!(!store.partition_dir(time).exists());
    Ok(())
}

#[test]
fn empty_partition_is_committed() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let store = LocalPartitionStore::new(dir.path());
    let time = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let sink = FileSetSink::prepare(
        &SinkConfig::new("delimited"),
        &FormatRegistry::builtin(),
        &no_arguments(),
        sample_schema(),
    )?;
    sink.write_partition(&store, time, &[], None)?;
    assert_eq!(store.committed_partitions()?.len(), 1);
    Ok(())
}

#[test]
fn finish_sweeps_after_a_successful_run() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let store = LocalPartitionStore::new(dir.path());
    let now = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap();
    let mut sink = FileSetSink::prepare(
        &SinkConfig::new("csv").with_retention("3d"),
        &FormatRegistry::builtin(),
        &no_arguments(),
        sample_schema(),
    )?;
    for days in [5, 3, 0] {
        sink.write_partition(&store, now - TimeDelta::days(days), &sample_records(), Some(1))?;
    }

    let ctx = FixedRunContext::new(now);
    let report = sink.finish(RunOutcome::Failed, &ctx, &store)?;
    assert!(report.skipped);
    assert_eq!(store.committed_partitions()?.len(), 3);

    let report = sink.finish(RunOutcome::Succeeded, &ctx, &store)?;
    assert_eq!(report.deleted.len(), 1);
    let left: Vec<_> = store
        .committed_partitions()?
        .into_iter()
        .map(|p| p.time)
        .collect();
    assert_eq!(left, vec![now - TimeDelta::days(3), now]);
    Ok(())
}

#[test]
fn pending_schema_without_retention_sweeps_nothing() -> anyhow::Result<()> {
    let config = SinkConfig::new("orc").with_property("schema", "${schema}");
    let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let store = InMemoryPartitionStore::with_times([t - TimeDelta::days(365)]);

    let mut manager = config.retention_manager()?;
    let report = manager.on_run_complete(RunOutcome::Succeeded, &FixedRunContext::new(t), &store)?;
    assert!(report.skipped);
    assert_eq!(store.partitions().len(), 1);

    // Preparing the sink itself needs the schema argument.
    let err = FileSetSink::prepare(
        &config,
        &FormatRegistry::builtin(),
        &no_arguments(),
        sample_schema(),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::UnresolvedMacro { .. }));
    Ok(())
}

#[test]
fn prepare_rejects_bad_configuration_before_writing() {
    let registry = FormatRegistry::builtin();
    let cases = [
        SinkConfig::new("nope"),
        SinkConfig::new("orc")
            .with_property("schema", SAMPLE_SCHEMA_JSON)
            .with_property("compressionCodec", "bzip2"),
        SinkConfig::new("csv").with_retention("7days"),
        SinkConfig::new("csv").with_property("delimiter", ""),
    ];
    for config in cases {
        assert!(
            FileSetSink::prepare(&config, &registry, &no_arguments(), sample_schema()).is_err(),
            "{config:?}"
        );
    }
}

#[test]
fn sink_config_deserializes_from_plugin_properties() -> anyhow::Result<()> {
    let config: SinkConfig = serde_json::from_str(
        r#"{"format":"avro","properties":{"schema":"${s}"},"cleanPartitionsOlderThan":"30d"}"#,
    )?;
    assert_eq!(config.format, "avro");
    assert_eq!(config.clean_partitions_older_than.as_deref(), Some("30d"));
    assert_eq!(config.properties["schema"], "${s}");
    Ok(())
}

#[test]
fn source_reads_glob_and_skips_markers() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    dir.write_lines("a/part-0.txt", &["x,,1", "y,,2"])?;
    dir.write_lines("b/part-0.txt", &["z,,3"])?;
    dir.write_lines("b/_SUCCESS", &[])?;
    fs::write(dir.file_path("b/.hidden"), "junk")?;

    let registry = FormatRegistry::builtin();
    let glob = format!("{}/*/part-*.txt", dir.path().display());
    let source = FileSource::new(
        registry.resolve("delimited")?,
        glob,
        three_field_schema(),
        &FormatConfig::default(),
    )?;
    assert_eq!(source.read_all_par()?.len(), 3);

    let by_dir = FileSource::new(
        registry.resolve("delimited")?,
        dir.file_path("b").display().to_string(),
        three_field_schema(),
        &FormatConfig::default(),
    )?;
    assert_eq!(by_dir.splits()?.len(), 1);

    let missing = FileSource::new(
        registry.resolve("delimited")?,
        dir.file_path("none/*.txt").display().to_string(),
        three_field_schema(),
        &FormatConfig::default(),
    )?;
    assert!(missing.read_all_par().is_err());
    Ok(())
}

#[test]
fn one_bad_split_fails_the_read() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    dir.write_lines("good.txt", &["x,,1"])?;
    dir.write_lines("bad.txt", &["x,1"])?;
    let source = FileSource::new(
        FormatRegistry::builtin().resolve("delimited")?,
        dir.path().display().to_string(),
        three_field_schema(),
        &FormatConfig::default(),
    )?;
    assert!(source.read_all_par().is_err());
    Ok(())
}
