//! Column names of the bar schema.

use crate::error::DataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SYMBOL: &str = "symbol";
pub const TIMESTAMP: &str = "timestamp";

/// Numeric column of a bar. `symbol` and `timestamp` are not fields: they
/// key the row and are never filled or rescaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
    Adjusted,
}

impl Field {
    /// Every numeric column, in schema order.
    pub const ALL: [Field; 6] = [
        Field::Open,
        Field::High,
        Field::Low,
        Field::Close,
        Field::Volume,
        Field::Adjusted,
    ];

    pub const OHLC: [Field; 4] = [Field::Open, Field::High, Field::Low, Field::Close];

    /// Columns rescaled by price (divided by the split ratio).
    pub const PRICES: [Field; 5] = [
        Field::Open,
        Field::High,
        Field::Low,
        Field::Close,
        Field::Adjusted,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Open => "open",
            Field::High => "high",
            Field::Low => "low",
            Field::Close => "close",
            Field::Volume => "volume",
            Field::Adjusted => "adjusted",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Field::ALL
            .into_iter()
            .find(|f| f.name() == lower)
            .or_else(|| match lower.as_str() {
                "adj_close" | "adj close" | "adjclose" => Some(Field::Adjusted),
                _ => None,
            })
            .ok_or_else(|| DataError::UnknownColumn(s.to_string()))
    }
}
