//! CSV import and export.
//!
//! ## Column contract (case-insensitive, order-independent)
//!
//! | Column | Notes |
//! |---|---|
//! | symbol | name configurable; a fixed symbol may be given instead |
//! | date | name configurable; RFC 3339, `%Y-%m-%d %H:%M:%S` or `%Y-%m-%d` unless a format is set |
//! | open, high, low, close, volume | floats; an empty cell is a missing value |
//! | adjusted | optional (`adj_close`, `adj close` accepted); synthesized from close when absent |
//!
//! Naive timestamps are read as UTC. A column whose cells do not all parse
//! is kept as text, so the [`Validator`](crate::validate::Validator) reports
//! it instead of the reader dropping data.

use super::provider::DataProvider;
use super::schema::BarSchema;
use crate::domain::field::{SYMBOL, TIMESTAMP};
use crate::domain::{Dataset, Field, Frequency};
use crate::error::DataError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use polars::prelude::{Column, DataFrame};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub symbol_column: String,
    /// Symbol for every row when the file has no symbol column.
    pub symbol: Option<String>,
    pub date_column: String,
    /// chrono format string for the date column.
    pub date_format: Option<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            symbol_column: SYMBOL.into(),
            symbol: None,
            date_column: "date".into(),
            date_format: None,
        }
    }
}

/// Reads CSV files into raw tables.
#[derive(Debug, Clone, Default)]
pub struct CsvReader {
    options: CsvOptions,
}

/// Rows to keep when reading on behalf of a fetch.
struct RowFilter<'a> {
    symbol: &'a str,
    start: NaiveDate,
    end: NaiveDate,
}

impl CsvReader {
    pub fn new(options: CsvOptions) -> Self {
        Self { options }
    }

    pub fn read_path(&self, path: &Path) -> Result<DataFrame, DataError> {
        let file = std::fs::File::open(path)?;
        self.read(file)
    }

    /// Read every row of `reader`.
    pub fn read<R: Read>(&self, reader: R) -> Result<DataFrame, DataError> {
        self.read_rows(reader, None)
    }

    fn read_rows<R: Read>(
        &self,
        reader: R,
        filter: Option<RowFilter<'_>>,
    ) -> Result<DataFrame, DataError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = rdr.headers()?.clone();
        let records = rdr.records().collect::<Result<Vec<_>, _>>()?;

        let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let symbol_idx = find(&self.options.symbol_column);
        let date_idx = find(&self.options.date_column).or_else(|| find(TIMESTAMP));

        let mut field_idx: Vec<(Field, usize)> = Vec::new();
        for (i, header) in headers.iter().enumerate() {
            if let Ok(field) = header.parse::<Field>() {
                if !field_idx.iter().any(|(f, _)| *f == field) {
                    field_idx.push((field, i));
                }
            }
        }

        let fixed_symbol = self
            .options
            .symbol
            .as_deref()
            .or(filter.as_ref().map(|f| f.symbol));

        let cell = |rec: &csv::StringRecord, i: usize| rec.get(i).unwrap_or("").to_string();
        let symbol_of = |rec: &csv::StringRecord| -> Option<String> {
            match symbol_idx {
                Some(i) => Some(cell(rec, i)),
                None => fixed_symbol.map(str::to_string),
            }
        };
        let stamp_of = |rec: &csv::StringRecord| -> Option<DateTime<Utc>> {
            date_idx.and_then(|i| parse_timestamp(&cell(rec, i), self.options.date_format.as_deref()))
        };

        let rows: Vec<&csv::StringRecord> = records
            .iter()
            .filter(|&rec| match &filter {
                None => true,
                Some(f) => {
                    let symbol_ok = symbol_of(rec).map_or(true, |s| s == f.symbol);
                    // Unparseable dates are kept for the validator to see.
                    let date_ok = stamp_of(rec).map_or(true, |ts| {
                        let day = ts.date_naive();
                        day >= f.start && day <= f.end
                    });
                    symbol_ok && date_ok
                }
            })
            .collect();

        let mut columns = Vec::new();
        if symbol_idx.is_some() || fixed_symbol.is_some() {
            let symbols: Vec<String> = rows
                .iter()
                .map(|&rec| symbol_of(rec).unwrap_or_default())
                .collect();
            columns.push(Column::new(SYMBOL.into(), symbols));
        }

        if let Some(i) = date_idx {
            let raw: Vec<String> = rows.iter().map(|&rec| cell(rec, i)).collect();
            let parsed: Option<Vec<i64>> = raw
                .iter()
                .map(|s| parse_timestamp(s, self.options.date_format.as_deref()).map(|ts| ts.timestamp_millis()))
                .collect();
            let column = match parsed {
                Some(millis) => Column::new(TIMESTAMP.into(), millis)
                    .cast(&BarSchema::timestamp_dtype())
                    .map_err(|e| DataError::Frame(format!("timestamp cast: {e}")))?,
                None => {
                    tracing::debug!(column = %self.options.date_column, "dates did not parse; keeping text");
                    Column::new(TIMESTAMP.into(), raw)
                }
            };
            columns.push(column);
        }

        for (field, i) in &field_idx {
            let raw: Vec<String> = rows.iter().map(|&rec| cell(rec, *i)).collect();
            columns.push(numeric_column(field.name(), raw));
        }

        let has_adjusted = field_idx.iter().any(|(f, _)| *f == Field::Adjusted);
        if !has_adjusted {
            if let Some((_, i)) = field_idx.iter().find(|(f, _)| *f == Field::Close) {
                let raw: Vec<String> = rows.iter().map(|&rec| cell(rec, *i)).collect();
                columns.push(numeric_column(Field::Adjusted.name(), raw));
            }
        }

        DataFrame::new(columns).map_err(|e| DataError::Shape(e.to_string()))
    }
}

/// A float column, or a text column when any non-empty cell fails to parse.
fn numeric_column(name: &str, raw: Vec<String>) -> Column {
    let parsed: Option<Vec<Option<f64>>> = raw
        .iter()
        .map(|s| {
            if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
                Some(None)
            } else {
                s.parse::<f64>().ok().map(Some)
            }
        })
        .collect();
    match parsed {
        Some(values) => Column::new(name.into(), values),
        None => Column::new(name.into(), raw),
    }
}

fn parse_timestamp(s: &str, format: Option<&str>) -> Option<DateTime<Utc>> {
    if let Some(fmt) = format {
        return NaiveDateTime::parse_from_str(s, fmt)
            .or_else(|_| NaiveDate::parse_from_str(s, fmt).map(|d| d.and_time(NaiveTime::MIN)))
            .map(|naive| naive.and_utc())
            .or_else(|_| DateTime::parse_from_str(s, fmt).map(|dt| dt.with_timezone(&Utc)))
            .ok();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .map(|naive| naive.and_utc())
}

/// Provider over a CSV file on disk.
pub struct CsvProvider {
    path: PathBuf,
    reader: CsvReader,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>, options: CsvOptions) -> Self {
        Self {
            path: path.into(),
            reader: CsvReader::new(options),
        }
    }
}

impl DataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        _frequency: Frequency,
    ) -> Result<DataFrame, DataError> {
        let file = std::fs::File::open(&self.path)?;
        let df = self.reader.read_rows(file, Some(RowFilter { symbol, start, end }))?;
        if df.height() == 0 {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        tracing::info!(%symbol, rows = df.height(), path = %self.path.display(), "read csv");
        Ok(df)
    }
}

/// Write a dataset as CSV.
///
/// Timestamps are RFC 3339 with the dataset zone's offset; `NaN` is an
/// empty cell.
pub fn write_csv<W: Write>(dataset: &Dataset, writer: W) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec![SYMBOL, TIMESTAMP];
    header.extend(Field::ALL.iter().map(|f| f.name()));
    wtr.write_record(&header)?;

    for bar in dataset {
        let mut record = vec![
            bar.symbol.clone(),
            bar.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        ];
        record.extend(Field::ALL.iter().map(|&f| {
            let v = bar.get(f);
            if v.is_nan() {
                String::new()
            } else {
                v.to_string()
            }
        }));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv_path(dataset: &Dataset, path: &Path) -> Result<(), DataError> {
    let file = std::fs::File::create(path)?;
    write_csv(dataset, std::io::BufWriter::new(file))
}
