//! Dataset: ordered bars plus table-level metadata.

use super::bar::Bar;
use super::frequency::Frequency;
use crate::error::DataError;
use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Table-level attributes that travel with a dataset through every transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub frequency: Frequency,
    /// IANA zone all timestamps are expressed in.
    pub timezone: Tz,
    pub asset_class: String,
    /// Provenance, e.g. `yahoo_finance` or `csv:prices.csv`.
    pub source: String,
}

impl Metadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    #[must_use]
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    #[must_use]
    pub fn with_asset_class(mut self, asset_class: impl Into<String>) -> Self {
        self.asset_class = asset_class.into();
        self
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            frequency: Frequency::Daily,
            timezone: Tz::UTC,
            asset_class: "equity".into(),
            source: "unknown".into(),
        }
    }
}

/// Parse an IANA zone name.
pub fn parse_timezone(name: &str) -> Result<Tz, DataError> {
    name.parse::<Tz>()
        .map_err(|_| DataError::InvalidTimezone(name.to_string()))
}

/// An ordered table of bars.
///
/// Row order is significant: gap filling treats gaps positionally, so the
/// dataset never reorders rows on its own. Slicing operations return a new
/// `Dataset` with the metadata copied verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    bars: Vec<Bar>,
    meta: Metadata,
}

impl Dataset {
    /// Build a dataset; timestamps are re-expressed in `meta.timezone`.
    pub fn new(bars: Vec<Bar>, meta: Metadata) -> Self {
        let tz = meta.timezone;
        let bars = bars
            .into_iter()
            .map(|mut b| {
                b.timestamp = b.timestamp.with_timezone(&tz);
                b
            })
            .collect();
        Self { bars, meta }
    }

    pub fn empty(meta: Metadata) -> Self {
        Self {
            bars: Vec::new(),
            meta,
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bar> {
        self.bars.iter()
    }

    pub fn into_parts(self) -> (Vec<Bar>, Metadata) {
        (self.bars, self.meta)
    }

    /// Distinct symbols in first-seen order.
    pub fn symbols(&self) -> Vec<&str> {
        self.partition_by_symbol()
            .into_keys()
            .collect()
    }

    /// Row indices grouped by symbol.
    ///
    /// Keys appear in first-seen order; each index list is ascending, so
    /// every row appears in exactly one partition.
    pub fn partition_by_symbol(&self) -> IndexMap<&str, Vec<usize>> {
        partition_rows(&self.bars)
    }

    /// Rows in `range`, clamped to the table length.
    pub fn slice(&self, range: Range<usize>) -> Dataset {
        let end = range.end.min(self.bars.len());
        let start = range.start.min(end);
        Dataset {
            bars: self.bars[start..end].to_vec(),
            meta: self.meta.clone(),
        }
    }

    pub fn filter_symbol(&self, symbol: &str) -> Dataset {
        self.filter(|b| b.symbol == symbol)
    }

    /// Rows with `start <= timestamp <= end`.
    pub fn between<Z: TimeZone>(&self, start: &DateTime<Z>, end: &DateTime<Z>) -> Dataset {
        self.filter(|b| b.timestamp >= *start && b.timestamp <= *end)
    }

    fn filter(&self, keep: impl Fn(&Bar) -> bool) -> Dataset {
        Dataset {
            bars: self.bars.iter().filter(|b| keep(b)).cloned().collect(),
            meta: self.meta.clone(),
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Bar;
    type IntoIter = std::slice::Iter<'a, Bar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}

pub(crate) fn partition_rows(bars: &[Bar]) -> IndexMap<&str, Vec<usize>> {
    let mut groups: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for (i, bar) in bars.iter().enumerate() {
        groups.entry(bar.symbol.as_str()).or_default().push(i);
    }
    groups
}
