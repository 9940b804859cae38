//! Retention window parsing.
//!
//! A retention window is a positive whole number followed by a single unit
//! letter: `s` (seconds), `m` (minutes), `h` (hours) or `d` (days), e.g. `7d`.
//! Signs, decimals, whitespace and compound forms such as `1d2h` are rejected.

use crate::error::ConfigError;
use chrono::TimeDelta;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)([smhd])$").expect("duration pattern is valid"));

/// Unit of a [`RetentionSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    const fn seconds(self) -> i64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 60 * 60,
            Self::Days => 24 * 60 * 60,
        }
    }

    const fn suffix(self) -> char {
        match self {
            Self::Seconds => 's',
            Self::Minutes => 'm',
            Self::Hours => 'h',
            Self::Days => 'd',
        }
    }
}

/// A parsed retention window, e.g. `7d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetentionSpec {
    amount: u64,
    unit: TimeUnit,
}

impl RetentionSpec {
    /// Parse a retention window.
    ///
    /// # Errors
    /// [`ConfigError::InvalidDurationFormat`] naming the input if it does not
    /// match `<digits><unit>`, if the amount is zero, or if the span does not
    /// fit in a [`TimeDelta`].
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidDurationFormat {
            input: input.to_string(),
        };
        let caps = DURATION_RE.captures(input).ok_or_else(invalid)?;
        let amount: u64 = caps[1].parse().map_err(|_| invalid())?;
        let unit = match &caps[2] {
            "s" => TimeUnit::Seconds,
            "m" => TimeUnit::Minutes,
            "h" => TimeUnit::Hours,
            "d" => TimeUnit::Days,
            _ => return Err(invalid()),
        };
        if amount == 0 {
            return Err(invalid());
        }
        let spec = Self { amount, unit };
        spec.checked_delta().ok_or_else(invalid)?;
        Ok(spec)
    }

    #[must_use]
    pub const fn amount(&self) -> u64 {
        self.amount
    }

    #[must_use]
    pub const fn unit(&self) -> TimeUnit {
        self.unit
    }

    fn checked_delta(&self) -> Option<TimeDelta> {
        let amount = i64::try_from(self.amount).ok()?;
        let secs = amount.checked_mul(self.unit.seconds())?;
        TimeDelta::try_seconds(secs)
    }

    /// The window as a [`TimeDelta`].
    #[must_use]
    pub fn as_delta(&self) -> TimeDelta {
        // `parse` is the only constructor and rejects spans that overflow.
        self.checked_delta().unwrap_or(TimeDelta::MAX)
    }
}

impl FromStr for RetentionSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RetentionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}
