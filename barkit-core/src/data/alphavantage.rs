//! Alpha Vantage data provider.
//!
//! Uses the `TIME_SERIES_*` endpoints. Values arrive as strings keyed by
//! numbered labels (`"1. open"`), and timestamps are local to the zone named
//! in the response's meta block.

use super::frame;
use super::provider::{DataProvider, RawBar};
use crate::domain::{parse_timezone, Frequency};
use crate::error::DataError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use polars::prelude::DataFrame;
use serde_json::{Map, Value};
use std::time::Duration;

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Environment variable read by [`AlphaVantageProvider::from_env`] by default.
pub const DEFAULT_KEY_ENV: &str = "ALPHAVANTAGE_API_KEY";

const INTRADAY_MINUTES: [u32; 5] = [1, 5, 15, 30, 60];

pub struct AlphaVantageProvider {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: BASE_URL.into(),
        })
    }

    /// Read the API key from `var`.
    pub fn from_env(var: &str) -> Result<Self, DataError> {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Self::new(key),
            _ => Err(DataError::AuthenticationRequired(format!(
                "Alpha Vantage needs an API key; set {var}"
            ))),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Query parameters for a symbol at `frequency` (API key excluded).
    fn query(symbol: &str, frequency: Frequency) -> Result<Vec<(&'static str, String)>, DataError> {
        let mut params = vec![("symbol", symbol.to_string()), ("outputsize", "full".to_string())];
        let function = match frequency {
            Frequency::Daily => "TIME_SERIES_DAILY",
            Frequency::Weekly => "TIME_SERIES_WEEKLY",
            Frequency::Monthly => "TIME_SERIES_MONTHLY",
            Frequency::Intraday(m) if INTRADAY_MINUTES.contains(&m) => {
                params.push(("interval", format!("{m}min")));
                "TIME_SERIES_INTRADAY"
            }
            Frequency::Intraday(m) => {
                return Err(DataError::Config(format!(
                    "Alpha Vantage has no {m} minute interval (supported: 1, 5, 15, 30, 60)"
                )))
            }
        };
        params.insert(0, ("function", function.to_string()));
        Ok(params)
    }

    /// Decode a response body into raw rows within `[start, end]`, oldest first.
    pub(crate) fn parse_response(
        symbol: &str,
        body: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        let root: Map<String, Value> = serde_json::from_str(body).map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        if let Some(message) = root.get("Error Message").and_then(Value::as_str) {
            tracing::debug!(%symbol, %message, "alpha vantage error payload");
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        for key in ["Note", "Information"] {
            if let Some(message) = root.get(key).and_then(Value::as_str) {
                return Err(DataError::RateLimited(message.to_string()));
            }
        }

        let tz = root
            .get("Meta Data")
            .and_then(Value::as_object)
            .and_then(|meta| find_suffix(meta, "Time Zone"))
            .and_then(Value::as_str)
            .map(parse_timezone)
            .transpose()?
            .unwrap_or(Tz::US__Eastern);

        let series = root
            .iter()
            .find(|(k, _)| k.contains("Time Series"))
            .and_then(|(_, v)| v.as_object())
            .ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("no time series in response for {symbol}"))
            })?;

        let mut bars = Vec::with_capacity(series.len());
        for (stamp, values) in series {
            let local = parse_stamp(stamp)?;
            if local.date() < start || local.date() > end {
                continue;
            }
            let timestamp = tz
                .from_local_datetime(&local)
                .earliest()
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("nonexistent local time {stamp} in {tz}"))
                })?
                .with_timezone(&Utc);

            let values = values.as_object().ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("bar {stamp} is not an object"))
            })?;
            let field = |name: &str| find_suffix(values, name).and_then(number);

            bars.push(RawBar {
                symbol: symbol.to_string(),
                timestamp,
                open: field("open"),
                high: field("high"),
                low: field("low"),
                close: field("close"),
                volume: field("volume"),
                adjusted: field("adjusted close"),
            });
        }
        bars.sort_by_key(|b| b.timestamp);

        if bars.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }
}

/// Value under a numbered label such as `"5. Time Zone"` or `"4. close"`.
fn find_suffix<'a>(map: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| {
            let label = k.split_once(". ").map_or(k.as_str(), |(_, rest)| rest);
            label.eq_ignore_ascii_case(name)
        })
        .map(|(_, v)| v)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn parse_stamp(stamp: &str) -> Result<NaiveDateTime, DataError> {
    NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDate::parse_from_str(stamp, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|_| DataError::ResponseFormatChanged(format!("unrecognized timestamp '{stamp}'")))
}

impl DataProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        "alpha_vantage"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        frequency: Frequency,
    ) -> Result<DataFrame, DataError> {
        let params = Self::query(symbol, frequency)?;
        tracing::debug!(%symbol, %frequency, "requesting alpha vantage series");

        let resp = self
            .client
            .get(&self.base_url)
            .query(&params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited(format!("HTTP {status} for {symbol}")));
        }
        if !status.is_success() {
            return Err(DataError::ResponseFormatChanged(format!(
                "HTTP {status} for {symbol}"
            )));
        }
        let body = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let bars = Self::parse_response(symbol, &body, start, end)?;
        tracing::info!(%symbol, rows = bars.len(), "fetched from alpha vantage");
        frame::raw_table(&bars)
    }
}
