//! Parquet import and export.

use super::frame;
use super::provider::DataProvider;
use crate::domain::field::SYMBOL;
use crate::domain::{Dataset, Frequency};
use crate::error::DataError;
use chrono::NaiveDate;
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Load a Parquet file as a raw table.
pub fn read_parquet(path: &Path) -> Result<DataFrame, DataError> {
    let file = fs::File::open(path)?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::Parquet(format!("read {}: {e}", path.display())))
}

/// Write a dataset to a Parquet file with UTC millisecond timestamps.
pub fn write_parquet(dataset: &Dataset, path: &Path) -> Result<(), DataError> {
    let mut df = dataset.to_frame()?;
    let file = fs::File::create(path)?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .map_err(|e| DataError::Parquet(format!("write {}: {e}", path.display())))?;
    Ok(())
}

/// Provider over a Parquet file holding one or many symbols.
pub struct ParquetProvider {
    path: PathBuf,
}

impl ParquetProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DataProvider for ParquetProvider {
    fn name(&self) -> &str {
        "parquet"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        _frequency: Frequency,
    ) -> Result<DataFrame, DataError> {
        let df = read_parquet(&self.path)?;
        let mask = row_mask(&df, symbol, start, end);
        let df = df
            .filter(&BooleanChunked::from_slice("mask".into(), &mask))
            .map_err(|e| DataError::Frame(e.to_string()))?;
        if df.height() == 0 {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        tracing::info!(%symbol, rows = df.height(), path = %self.path.display(), "read parquet");
        Ok(df)
    }
}

/// Rows belonging to `symbol` within `[start, end]`.
///
/// Rows whose symbol or timestamp cannot be read are kept so the validator
/// sees them.
fn row_mask(df: &DataFrame, symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<bool> {
    let mut mask = vec![true; df.height()];

    if let Ok(ca) = df.column(SYMBOL).and_then(|c| c.str()) {
        for (keep, value) in mask.iter_mut().zip(ca.into_iter()) {
            *keep &= value.map_or(true, |s| s == symbol);
        }
    }

    if let Ok(stamps) = frame::instants(df) {
        for (keep, ts) in mask.iter_mut().zip(stamps) {
            if let Some(ts) = ts {
                let day = ts.date_naive();
                *keep &= day >= start && day <= end;
            }
        }
    }

    mask
}
