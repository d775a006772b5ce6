//! Fetch orchestrator: provider → raw table → validator → dataset.

use super::frame;
use super::provider::DataProvider;
use crate::domain::{Dataset, Frequency, Metadata};
use crate::error::DataError;
use crate::validate::Validator;
use chrono::NaiveDate;

/// What to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub symbols: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub frequency: Frequency,
}

impl FetchRequest {
    pub fn new(symbols: Vec<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbols,
            start,
            end,
            frequency: Frequency::Daily,
        }
    }

    #[must_use]
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }
}

/// Fetch every symbol in order, validate the stacked table and convert it.
///
/// Symbols are fetched one after another; the first provider error aborts
/// the whole fetch. `meta` supplies the timezone and asset class; its
/// `source` and `frequency` are overwritten from the provider and request.
pub fn fetch_dataset(
    provider: &dyn DataProvider,
    request: &FetchRequest,
    meta: Metadata,
    strict: bool,
) -> Result<Dataset, DataError> {
    if request.start > request.end {
        return Err(DataError::Config(format!(
            "start {} is after end {}",
            request.start, request.end
        )));
    }

    let total = request.symbols.len();
    let mut frames = Vec::with_capacity(total);
    for (i, symbol) in request.symbols.iter().enumerate() {
        tracing::debug!(%symbol, index = i + 1, total, provider = provider.name(), "fetching");
        let df = provider.fetch(symbol, request.start, request.end, request.frequency)?;
        tracing::info!(%symbol, rows = df.height(), "fetched");
        frames.push(df);
    }

    let raw = frame::stack(frames)?;
    let raw = Validator::validate_frame(raw, strict)?;

    let meta = Metadata {
        source: provider.name().to_string(),
        frequency: request.frequency,
        ..meta
    };
    Dataset::from_frame(&raw, meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::{FnProvider, RawBar, StaticProvider};
    use chrono::{TimeZone, Utc};

    fn raw(symbol: &str, day: u32, high: f64) -> RawBar {
        RawBar {
            symbol: symbol.into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            open: Some(10.0),
            high: Some(high),
            low: Some(9.0),
            close: Some(10.5),
            volume: Some(100.0),
            adjusted: None,
        }
    }

    fn request(symbols: &[&str]) -> FetchRequest {
        FetchRequest::new(
            symbols.iter().map(|s| s.to_string()).collect(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    #[test]
    fn stacks_symbols_in_request_order() {
        let provider = StaticProvider::new(
            "memory",
            vec![raw("SPY", 2, 11.0), raw("QQQ", 2, 11.0), raw("SPY", 3, 11.0)],
        );
        let meta = Metadata::default().with_asset_class("etf");
        let ds = fetch_dataset(&provider, &request(&["QQQ", "SPY"]), meta, true).unwrap();

        assert_eq!(ds.symbols(), vec!["QQQ", "SPY"]);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.meta().source, "memory");
        assert_eq!(ds.meta().asset_class, "etf");
    }

    #[test]
    fn strict_fetch_rejects_bad_rows() {
        let provider = StaticProvider::new("memory", vec![raw("SPY", 2, 8.0)]);
        let err = fetch_dataset(&provider, &request(&["SPY"]), Metadata::default(), true)
            .unwrap_err();
        assert!(err.to_string().contains("High price violations in 1 rows"), "{err}");

        let ds = fetch_dataset(&provider, &request(&["SPY"]), Metadata::default(), false).unwrap();
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn provider_error_aborts() {
        let provider = FnProvider::new("failing", |symbol: &str, _, _| {
            if symbol == "BAD" {
                Err(DataError::NetworkUnreachable("offline".into()))
            } else {
                frame::raw_table(&[raw(symbol, 2, 11.0)])
            }
        });
        let err = fetch_dataset(&provider, &request(&["SPY", "BAD"]), Metadata::default(), true)
            .unwrap_err();
        assert!(matches!(err, DataError::NetworkUnreachable(_)));
    }

    #[test]
    fn inverted_range_is_a_config_error() {
        let provider = StaticProvider::new("memory", vec![]);
        let mut req = request(&["SPY"]);
        std::mem::swap(&mut req.start, &mut req.end);
        assert!(matches!(
            fetch_dataset(&provider, &req, Metadata::default(), true),
            Err(DataError::Config(_))
        ));
    }
}
