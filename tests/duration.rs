use chrono::TimeDelta;
use ironbeam_formats::error::ConfigError;
use ironbeam_formats::{RetentionSpec, TimeUnit};

#[test]
fn parses_every_unit() -> anyhow::Result<()> {
    let cases = [
        ("30s", TimeDelta::seconds(30), TimeUnit::Seconds),
        ("15m", TimeDelta::minutes(15), TimeUnit::Minutes),
        ("36h", TimeDelta::hours(36), TimeUnit::Hours),
        ("7d", TimeDelta::days(7), TimeUnit::Days),
    ];
    for (input, delta, unit) in cases {
        let spec = RetentionSpec::parse(input)?;
        assert_eq!(spec.as_delta(), delta, "{input}");
        assert_eq!(spec.unit(), unit);
        assert_eq!(spec.to_string(), input);
    }
    assert_eq!("007d".parse::<RetentionSpec>()?.amount(), 7);
    Ok(())
}

#[test]
fn rejects_malformed_windows() {
    for input in [
        "", "d", "7", "7D", "7 d", " 7d", "-7d", "+7d", "1.5h", "1d2h", "7w", "0d", "0s",
        "seven days",
    ] {
        assert_eq!(
            RetentionSpec::parse(input),
            Err(ConfigError::InvalidDurationFormat {
                input: input.to_string()
            }),
            "{input:?} should be rejected"
        );
    }
}

#[test]
fn rejects_spans_that_overflow() {
    assert!(RetentionSpec::parse("99999999999999999999d").is_err());
    assert!(RetentionSpec::parse("9223372036854775807s").is_err());
    assert!(RetentionSpec::parse("106751991167d").is_ok());
}
