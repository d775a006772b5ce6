//! Data provider trait and the raw row type providers share.
//!
//! The DataProvider trait abstracts over data sources (Yahoo Finance, Alpha
//! Vantage, CSV import, Parquet import) so the validation and transform
//! pipeline never depends on network behavior and can be driven from memory
//! in tests.

use super::frame;
use crate::domain::Frequency;
use crate::error::DataError;
use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::DataFrame;

/// One row as decoded from a remote provider, before validation.
///
/// `None` marks a value the provider did not report.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub adjusted: Option<f64>,
}

impl RawBar {
    /// True when the provider reported nothing for this row (holidays).
    pub fn is_empty(&self) -> bool {
        self.open.is_none()
            && self.high.is_none()
            && self.low.is_none()
            && self.close.is_none()
            && self.volume.is_none()
    }
}

/// Source of raw bar tables.
///
/// Implementations return a table with at least the columns `symbol`,
/// `timestamp`, `open`, `high`, `low`, `close`, `volume` and optionally
/// `adjusted`. The table is not validated here; callers run it through the
/// [`Validator`](crate::validate::Validator).
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider, stamped into dataset metadata.
    fn name(&self) -> &str;

    /// Fetch bars for a symbol over an inclusive date range.
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        frequency: Frequency,
    ) -> Result<DataFrame, DataError>;
}

/// Adapts a plain function into a provider.
pub struct FnProvider<F> {
    name: String,
    fetch: F,
}

impl<F> FnProvider<F>
where
    F: Fn(&str, NaiveDate, NaiveDate) -> Result<DataFrame, DataError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, fetch: F) -> Self {
        Self {
            name: name.into(),
            fetch,
        }
    }
}

impl<F> DataProvider for FnProvider<F>
where
    F: Fn(&str, NaiveDate, NaiveDate) -> Result<DataFrame, DataError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        _frequency: Frequency,
    ) -> Result<DataFrame, DataError> {
        (self.fetch)(symbol, start, end)
    }
}

/// Provider over bars already in memory; filters by symbol and date range.
pub struct StaticProvider {
    name: String,
    bars: Vec<RawBar>,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>, bars: Vec<RawBar>) -> Self {
        Self {
            name: name.into(),
            bars,
        }
    }
}

impl DataProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        _frequency: Frequency,
    ) -> Result<DataFrame, DataError> {
        let rows: Vec<RawBar> = self
            .bars
            .iter()
            .filter(|b| {
                let day = b.timestamp.date_naive();
                b.symbol == symbol && day >= start && day <= end
            })
            .cloned()
            .collect();
        if rows.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        frame::raw_table(&rows)
    }
}
