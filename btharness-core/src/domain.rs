//! Value types shared by the invocation builder and the scenario matrix.
//!
//! - `Timerange`: opaque start/end tokens in the backtesting tool's format
//! - `Exchange`: an exchange name plus the thresholds its runs must meet
//! - `StakeAmount`: the `--stake-amount` value (`unlimited` or a number)

use std::fmt;
use std::str::FromStr;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Date format the backtesting tool expects in `--timerange`.
pub const TIMERANGE_DATE_FORMAT: &str = "%Y%m%d";

/// Historical window for a single backtest.
///
/// Both endpoints are kept as the raw tokens handed to the tool; only
/// non-emptiness is enforced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimerange")]
pub struct Timerange {
    start: String,
    end: String,
}

#[derive(Deserialize)]
struct RawTimerange {
    start: String,
    end: String,
}

impl TryFrom<RawTimerange> for Timerange {
    type Error = ConfigError;

    fn try_from(raw: RawTimerange) -> Result<Self, Self::Error> {
        Timerange::new(raw.start, raw.end)
    }
}

impl Timerange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Result<Self, ConfigError> {
        let start = start.into().trim().to_string();
        let end = end.into().trim().to_string();
        if start.is_empty() {
            return Err(ConfigError::EmptyTimerangeToken { which: "start" });
        }
        if end.is_empty() {
            return Err(ConfigError::EmptyTimerangeToken { which: "end" });
        }
        Ok(Self { start, end })
    }

    /// Parse the `<start>-<end>` form used on the command line.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let (start, end) = value
            .split_once('-')
            .ok_or_else(|| ConfigError::InvalidTimerange(value.to_string()))?;
        Self::new(start, end).map_err(|_| ConfigError::InvalidTimerange(value.to_string()))
    }

    /// Consecutive calendar-month windows beginning at `start` (`YYYYMMDD`).
    ///
    /// `monthly("20210101", 3)` yields 20210101-20210201, 20210201-20210301
    /// and 20210301-20210401.
    pub fn monthly(start: &str, count: u32) -> Result<Vec<Self>, ConfigError> {
        let mut from = NaiveDate::parse_from_str(start, TIMERANGE_DATE_FORMAT)
            .map_err(|e| ConfigError::InvalidDate { value: start.to_string(), reason: e.to_string() })?;
        let mut ranges = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let to = from
                .checked_add_months(Months::new(1))
                .ok_or_else(|| ConfigError::InvalidDate {
                    value: from.format(TIMERANGE_DATE_FORMAT).to_string(),
                    reason: "month arithmetic overflowed".into(),
                })?;
            ranges.push(Self {
                start: from.format(TIMERANGE_DATE_FORMAT).to_string(),
                end: to.format(TIMERANGE_DATE_FORMAT).to_string(),
            });
            from = to;
        }
        Ok(ranges)
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }
}

impl fmt::Display for Timerange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// An exchange under test and the thresholds every run on it must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub name: String,
    /// Minimum acceptable win-rate, in percent.
    pub winrate: f64,
    /// Maximum acceptable drawdown, in percent.
    pub max_drawdown: f64,
}

impl Exchange {
    pub fn new(name: impl Into<String>, winrate: f64, max_drawdown: f64) -> Self {
        Self {
            name: name.into(),
            winrate,
            max_drawdown,
        }
    }
}

/// Value passed as `--stake-amount`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StakeAmount {
    #[default]
    Unlimited,
    Fixed(f64),
}

impl fmt::Display for StakeAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeAmount::Unlimited => f.write_str("unlimited"),
            StakeAmount::Fixed(amount) => write!(f, "{amount}"),
        }
    }
}

impl FromStr for StakeAmount {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unlimited") {
            return Ok(StakeAmount::Unlimited);
        }
        match s.parse::<f64>() {
            Ok(amount) if amount.is_finite() && amount > 0.0 => Ok(StakeAmount::Fixed(amount)),
            _ => Err(ConfigError::InvalidStakeAmount(s.to_string())),
        }
    }
}

impl TryFrom<String> for StakeAmount {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StakeAmount> for String {
    fn from(value: StakeAmount) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timerange_renders_as_tool_argument() {
        let tr = Timerange::new("20210101", "20210201").unwrap();
        assert_eq!(tr.to_string(), "20210101-20210201");
        assert_eq!(tr.start(), "20210101");
        assert_eq!(tr.end(), "20210201");
    }

    #[test]
    fn timerange_rejects_empty_tokens() {
        assert!(matches!(
            Timerange::new("", "20210201"),
            Err(ConfigError::EmptyTimerangeToken { which: "start" })
        ));
        assert!(matches!(
            Timerange::new("20210101", "  "),
            Err(ConfigError::EmptyTimerangeToken { which: "end" })
        ));
    }

    #[test]
    fn timerange_parse_splits_on_dash() {
        let tr = Timerange::parse("20210301-20210401").unwrap();
        assert_eq!(tr, Timerange::new("20210301", "20210401").unwrap());
        assert!(Timerange::parse("20210301").is_err());
        assert!(Timerange::parse("-20210401").is_err());
    }

    #[test]
    fn monthly_windows_are_contiguous() {
        let ranges = Timerange::monthly("20210101", 6).unwrap();
        assert_eq!(ranges.len(), 6);
        assert_eq!(ranges[0].to_string(), "20210101-20210201");
        assert_eq!(ranges[5].to_string(), "20210601-20210701");
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
        }
    }

    #[test]
    fn monthly_rejects_bad_start() {
        assert!(matches!(
            Timerange::monthly("2021-01-01", 1),
            Err(ConfigError::InvalidDate { .. })
        ));
    }

    #[test]
    fn stake_amount_parses_and_renders() {
        assert_eq!("unlimited".parse::<StakeAmount>().unwrap(), StakeAmount::Unlimited);
        assert_eq!("UNLIMITED".parse::<StakeAmount>().unwrap(), StakeAmount::Unlimited);
        assert_eq!("100".parse::<StakeAmount>().unwrap(), StakeAmount::Fixed(100.0));
        assert_eq!(StakeAmount::Fixed(100.0).to_string(), "100");
        assert_eq!(StakeAmount::Fixed(12.5).to_string(), "12.5");
        assert!("0".parse::<StakeAmount>().is_err());
        assert!("lots".parse::<StakeAmount>().is_err());
    }
}
