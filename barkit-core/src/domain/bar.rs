//! Bar: one OHLCV row of a dataset.

use super::field::Field;
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

/// OHLCV bar for a single symbol at a single instant.
///
/// Numeric fields use `f64::NAN` for missing values. `timestamp` is always
/// expressed in the owning dataset's timezone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Tz>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub adjusted: f64,
}

impl Bar {
    /// Bar with `adjusted` taken from `close`.
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Tz>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            adjusted: close,
        }
    }

    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::Open => self.open,
            Field::High => self.high,
            Field::Low => self.low,
            Field::Close => self.close,
            Field::Volume => self.volume,
            Field::Adjusted => self.adjusted,
        }
    }

    pub fn get_mut(&mut self, field: Field) -> &mut f64 {
        match field {
            Field::Open => &mut self.open,
            Field::High => &mut self.high,
            Field::Low => &mut self.low,
            Field::Close => &mut self.close,
            Field::Volume => &mut self.volume,
            Field::Adjusted => &mut self.adjusted,
        }
    }

    pub fn violates_high(&self) -> bool {
        high_violated(self.open, self.high, self.low, self.close)
    }

    pub fn violates_low(&self) -> bool {
        low_violated(self.open, self.high, self.low, self.close)
    }
}

/// High sits below open, close or low. Equality is not a violation and any
/// NaN operand compares false.
pub(crate) fn high_violated(open: f64, high: f64, low: f64, close: f64) -> bool {
    high < open || high < close || high < low
}

/// Low sits above open, close or high. Equality is not a violation.
pub(crate) fn low_violated(open: f64, high: f64, low: f64, close: f64) -> bool {
    low > open || low > close || low > high
}
