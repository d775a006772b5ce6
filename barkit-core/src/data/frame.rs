//! Conversion between raw polars tables and typed datasets.

use super::provider::RawBar;
use super::schema::BarSchema;
use crate::domain::field::{SYMBOL, TIMESTAMP};
use crate::domain::{Bar, Dataset, Field, Metadata};
use crate::error::DataError;
use chrono::{DateTime, Utc};
use polars::prelude::*;

/// Build a raw table from provider rows.
///
/// The `adjusted` column is omitted when no row carries an adjusted value,
/// so consumers fall back to `close`.
pub fn raw_table(bars: &[RawBar]) -> Result<DataFrame, DataError> {
    let symbols: Vec<String> = bars.iter().map(|b| b.symbol.clone()).collect();
    let millis: Vec<i64> = bars.iter().map(|b| b.timestamp.timestamp_millis()).collect();
    let numeric = |f: fn(&RawBar) -> Option<f64>| -> Vec<Option<f64>> { bars.iter().map(f).collect() };

    let mut columns = vec![
        Column::new(SYMBOL.into(), symbols),
        Column::new(TIMESTAMP.into(), millis)
            .cast(&BarSchema::timestamp_dtype())
            .map_err(|e| DataError::Frame(format!("timestamp cast: {e}")))?,
        Column::new("open".into(), numeric(|b| b.open)),
        Column::new("high".into(), numeric(|b| b.high)),
        Column::new("low".into(), numeric(|b| b.low)),
        Column::new("close".into(), numeric(|b| b.close)),
        Column::new("volume".into(), numeric(|b| b.volume)),
    ];
    if bars.iter().any(|b| b.adjusted.is_some()) {
        columns.push(Column::new("adjusted".into(), numeric(|b| b.adjusted)));
    }

    DataFrame::new(columns).map_err(|e| DataError::Shape(e.to_string()))
}

/// Stack several raw tables into one, preserving row order.
pub fn stack(frames: Vec<DataFrame>) -> Result<DataFrame, DataError> {
    let mut iter = frames.into_iter();
    let Some(mut acc) = iter.next() else {
        return raw_table(&[]);
    };
    for df in iter {
        let df = align_adjusted(&acc, df)?;
        acc = align_adjusted(&df, acc)?;
        acc.vstack_mut(&df)
            .map_err(|e| DataError::Shape(format!("cannot stack tables: {e}")))?;
    }
    Ok(acc)
}

/// Give `df` an `adjusted` column copied from `close` when `like` has one
/// and `df` does not, so both tables share a schema.
fn align_adjusted(like: &DataFrame, mut df: DataFrame) -> Result<DataFrame, DataError> {
    if like.column("adjusted").is_ok() && df.column("adjusted").is_err() {
        let close = df
            .column("close")
            .map_err(|e| DataError::Frame(e.to_string()))?
            .as_materialized_series()
            .clone()
            .with_name("adjusted".into());
        df.with_column(close)
            .map_err(|e| DataError::Frame(e.to_string()))?;
    }
    Ok(df)
}

impl Dataset {
    /// Convert a raw table into a dataset.
    ///
    /// Null or NaN numeric cells become `NaN`; a null symbol becomes the
    /// empty string. A missing `adjusted` column is synthesized from `close`.
    /// Timestamps may use any datetime unit and are read as UTC instants.
    pub fn from_frame(df: &DataFrame, meta: Metadata) -> Result<Dataset, DataError> {
        let missing = BarSchema::missing_columns(df);
        if !missing.is_empty() {
            return Err(DataError::Shape(format!(
                "table lacks required columns: {}",
                missing.join(", ")
            )));
        }

        let symbols = read_symbols(df)?;
        let timestamps = read_timestamps(df)?;
        let mut values: Vec<Vec<f64>> = Vec::with_capacity(Field::ALL.len());
        for field in Field::ALL {
            let source = match field {
                Field::Adjusted if df.column("adjusted").is_err() => "close",
                other => other.name(),
            };
            values.push(read_f64(df, source)?);
        }

        let tz = meta.timezone;
        let bars = (0..df.height())
            .map(|i| Bar {
                symbol: symbols[i].clone(),
                timestamp: timestamps[i].with_timezone(&tz),
                open: values[0][i],
                high: values[1][i],
                low: values[2][i],
                close: values[3][i],
                volume: values[4][i],
                adjusted: values[5][i],
            })
            .collect();

        Ok(Dataset::new(bars, meta))
    }

    /// Convert the dataset to a polars table with UTC millisecond timestamps.
    /// `NaN` values become nulls.
    pub fn to_frame(&self) -> Result<DataFrame, DataError> {
        let rows: Vec<RawBar> = self
            .iter()
            .map(|b| {
                let present = |v: f64| if v.is_nan() { None } else { Some(v) };
                RawBar {
                    symbol: b.symbol.clone(),
                    timestamp: b.timestamp.with_timezone(&Utc),
                    open: present(b.open),
                    high: present(b.high),
                    low: present(b.low),
                    close: present(b.close),
                    volume: present(b.volume),
                    adjusted: present(b.adjusted),
                }
            })
            .collect();
        let mut df = raw_table(&rows)?;
        if df.column("adjusted").is_err() {
            let empty: Vec<Option<f64>> = vec![None; rows.len()];
            df.with_column(Column::new("adjusted".into(), empty))
                .map_err(|e| DataError::Frame(e.to_string()))?;
        }
        Ok(df)
    }
}

fn read_symbols(df: &DataFrame) -> Result<Vec<String>, DataError> {
    let column = df
        .column(SYMBOL)
        .map_err(|e| DataError::Frame(e.to_string()))?;
    let ca = column.str().map_err(|_| DataError::ColumnType {
        column: SYMBOL.into(),
        expected: "str".into(),
        found: column.dtype().to_string(),
    })?;
    Ok(ca
        .into_iter()
        .map(|s| s.unwrap_or_default().to_string())
        .collect())
}

fn read_timestamps(df: &DataFrame) -> Result<Vec<DateTime<Utc>>, DataError> {
    instants(df)?
        .into_iter()
        .enumerate()
        .map(|(row, ts)| {
            ts.ok_or_else(|| DataError::ColumnType {
                column: TIMESTAMP.into(),
                expected: "non-null datetime".into(),
                found: format!("null at row {row}"),
            })
        })
        .collect()
}

/// The timestamp column as UTC instants, whatever its datetime unit.
pub(crate) fn instants(df: &DataFrame) -> Result<Vec<Option<DateTime<Utc>>>, DataError> {
    let column = df
        .column(TIMESTAMP)
        .map_err(|e| DataError::Frame(e.to_string()))?;
    let unit = match column.dtype() {
        DataType::Datetime(unit, _) => *unit,
        other => {
            return Err(DataError::ColumnType {
                column: TIMESTAMP.into(),
                expected: "datetime".into(),
                found: other.to_string(),
            })
        }
    };
    let physical = column
        .cast(&DataType::Int64)
        .map_err(|e| DataError::Frame(format!("timestamp cast: {e}")))?;
    let ca = physical
        .i64()
        .map_err(|e| DataError::Frame(format!("timestamp column: {e}")))?;

    ca.into_iter()
        .enumerate()
        .map(|(row, v)| {
            let Some(raw) = v else {
                return Ok(None);
            };
            let ts = match unit {
                TimeUnit::Milliseconds => DateTime::from_timestamp_millis(raw),
                TimeUnit::Microseconds => DateTime::from_timestamp_micros(raw),
                TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(raw)),
            };
            ts.map(Some)
                .ok_or_else(|| DataError::Frame(format!("timestamp out of range at row {row}")))
        })
        .collect()
}

fn read_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>, DataError> {
    let column = df
        .column(name)
        .map_err(|e| DataError::Frame(e.to_string()))?;
    if !BarSchema::is_numeric(column.dtype()) {
        return Err(DataError::ColumnType {
            column: name.into(),
            expected: "numeric".into(),
            found: column.dtype().to_string(),
        });
    }
    let floats = column
        .cast(&DataType::Float64)
        .map_err(|e| DataError::Frame(format!("{name} cast: {e}")))?;
    let ca = floats
        .f64()
        .map_err(|e| DataError::Frame(format!("{name} column: {e}")))?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}
