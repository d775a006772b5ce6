//! Sampling frequency of a dataset.

use crate::error::DataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    /// Intraday bars every `n` minutes.
    Intraday(u32),
}

impl Frequency {
    /// Value of Yahoo's chart `interval` parameter.
    pub fn yahoo_interval(self) -> String {
        match self {
            Frequency::Daily => "1d".into(),
            Frequency::Weekly => "1wk".into(),
            Frequency::Monthly => "1mo".into(),
            Frequency::Intraday(m) => format!("{m}m"),
        }
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::Daily
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily => f.write_str("daily"),
            Frequency::Weekly => f.write_str("weekly"),
            Frequency::Monthly => f.write_str("monthly"),
            Frequency::Intraday(m) => write!(f, "{m}m"),
        }
    }
}

impl FromStr for Frequency {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let freq = match lower.as_str() {
            "daily" | "1d" | "d" => Frequency::Daily,
            "weekly" | "1wk" | "w" => Frequency::Weekly,
            "monthly" | "1mo" | "m" => Frequency::Monthly,
            "1h" | "hourly" => Frequency::Intraday(60),
            other => {
                let digits = other
                    .strip_suffix("min")
                    .or_else(|| other.strip_suffix('m'))
                    .ok_or_else(|| DataError::Config(format!("unknown frequency '{s}'")))?;
                let minutes: u32 = digits
                    .parse()
                    .map_err(|_| DataError::Config(format!("unknown frequency '{s}'")))?;
                if minutes == 0 {
                    return Err(DataError::Config(format!("unknown frequency '{s}'")));
                }
                Frequency::Intraday(minutes)
            }
        };
        Ok(freq)
    }
}

impl TryFrom<String> for Frequency {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Frequency> for String {
    fn from(f: Frequency) -> Self {
        f.to_string()
    }
}
