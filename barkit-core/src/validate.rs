//! Dataset validation.
//!
//! Every check runs and every problem is collected; nothing stops at the
//! first issue. Strict validation turns a non-empty issue list into a
//! [`ValidationError`]; lenient validation logs a [`ValidationWarning`] and
//! hands the input back unchanged. Rows are never corrected or dropped here.
//!
//! Checks, in report order:
//! 1. the input is table-shaped (fails immediately with [`DataError::Shape`])
//! 2. required columns are present
//! 3. `timestamp` is a datetime column
//! 4. price and volume columns are numeric
//! 5. the table has rows
//! 6. OHLC consistency (`high` not below, `low` not above the other prices)
//! 7. no missing values in required columns

use crate::data::schema::BarSchema;
use crate::domain::bar::{high_violated, low_violated};
use crate::domain::field::{SYMBOL, TIMESTAMP};
use crate::domain::{Dataset, Field};
use crate::error::DataError;
use polars::prelude::*;
use std::fmt;
use thiserror::Error;

/// A single problem found by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingColumns(Vec<String>),
    TimestampType { found: String },
    NonNumeric { column: String, found: String },
    ZeroRows,
    HighViolations(usize),
    LowViolations(usize),
    MissingValues { column: String, count: usize },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumns(cols) => {
                write!(f, "Missing required columns: {}", cols.join(", "))
            }
            Self::TimestampType { found } => {
                write!(f, "Column 'timestamp' must be a datetime type, found {found}")
            }
            Self::NonNumeric { column, found } => {
                write!(f, "Column '{column}' must be numeric, found {found}")
            }
            Self::ZeroRows => write!(f, "Dataset has zero rows"),
            Self::HighViolations(n) => write!(f, "High price violations in {n} rows"),
            Self::LowViolations(n) => write!(f, "Low price violations in {n} rows"),
            Self::MissingValues { column, count } => {
                write!(f, "Column '{column}' has {count} missing values")
            }
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Everything the validator found, in check order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn message(&self) -> String {
        join_issues(&self.issues)
    }

    fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }
}

/// Strict-mode failure: the dataset must not be used.
#[derive(Debug, Clone, Error)]
#[error("validation failed: {}", join_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

/// Lenient-mode finding: the dataset is still returned and usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation warnings: {}", join_issues(&self.issues))
    }
}

/// Validator for raw tables and typed datasets.
pub struct Validator;

impl Validator {
    /// Run every check against a raw table.
    ///
    /// Fails only when the input is not table-shaped (it has no columns).
    pub fn inspect_frame(df: &DataFrame) -> Result<ValidationReport, DataError> {
        if df.width() == 0 {
            return Err(DataError::Shape("table has no columns".into()));
        }

        let mut report = ValidationReport::default();

        let missing = BarSchema::missing_columns(df);
        if !missing.is_empty() {
            report.push(ValidationIssue::MissingColumns(
                missing.iter().map(|s| s.to_string()).collect(),
            ));
        }

        if let Ok(ts) = df.column(TIMESTAMP) {
            if !BarSchema::is_datetime(ts.dtype()) {
                report.push(ValidationIssue::TimestampType {
                    found: ts.dtype().to_string(),
                });
            }
        }

        for name in BarSchema::NUMERIC {
            if let Ok(column) = df.column(name) {
                if !BarSchema::is_numeric(column.dtype()) {
                    report.push(ValidationIssue::NonNumeric {
                        column: name.into(),
                        found: column.dtype().to_string(),
                    });
                }
            }
        }

        if df.height() == 0 {
            report.push(ValidationIssue::ZeroRows);
        }

        let ohlc: Option<Vec<Vec<f64>>> = Field::OHLC
            .iter()
            .map(|f| numeric_values(df, f.name()))
            .collect::<Result<_, _>>()?;
        if let Some(cols) = ohlc {
            let (high, low) = count_violations((0..df.height()).map(|i| {
                (cols[0][i], cols[1][i], cols[2][i], cols[3][i])
            }));
            push_violations(&mut report, high, low);
        }

        for name in BarSchema::REQUIRED {
            if let Ok(column) = df.column(name) {
                let count = missing_in_column(column)?;
                push_missing(&mut report, name, count);
            }
        }

        Ok(report)
    }

    /// Run the checks that apply to a typed dataset.
    ///
    /// Column presence and types are guaranteed by [`Dataset`]; a missing
    /// value is an empty symbol or a `NaN` in a numeric column.
    pub fn inspect(dataset: &Dataset) -> ValidationReport {
        let mut report = ValidationReport::default();

        if dataset.is_empty() {
            report.push(ValidationIssue::ZeroRows);
        }

        let (high, low) = count_violations(
            dataset
                .iter()
                .map(|b| (b.open, b.high, b.low, b.close)),
        );
        push_violations(&mut report, high, low);

        let empty_symbols = dataset.iter().filter(|b| b.symbol.is_empty()).count();
        push_missing(&mut report, SYMBOL, empty_symbols);
        for field in [Field::Open, Field::High, Field::Low, Field::Close, Field::Volume] {
            let count = dataset.iter().filter(|b| b.get(field).is_nan()).count();
            push_missing(&mut report, field.name(), count);
        }

        report
    }

    /// Validate a raw table, returning it unchanged unless strict validation fails.
    pub fn validate_frame(df: DataFrame, strict: bool) -> Result<DataFrame, DataError> {
        Self::validate_frame_with_warning(df, strict).map(|(df, _)| df)
    }

    /// Like [`validate_frame`](Self::validate_frame), but also hands back the
    /// lenient-mode warning.
    pub fn validate_frame_with_warning(
        df: DataFrame,
        strict: bool,
    ) -> Result<(DataFrame, Option<ValidationWarning>), DataError> {
        let report = Self::inspect_frame(&df)?;
        Ok((df, finish(report, strict)?))
    }

    /// Validate a dataset, returning it unchanged unless strict validation fails.
    pub fn validate(dataset: Dataset, strict: bool) -> Result<Dataset, DataError> {
        Self::validate_with_warning(dataset, strict).map(|(ds, _)| ds)
    }

    pub fn validate_with_warning(
        dataset: Dataset,
        strict: bool,
    ) -> Result<(Dataset, Option<ValidationWarning>), DataError> {
        let report = Self::inspect(&dataset);
        Ok((dataset, finish(report, strict)?))
    }
}

/// Strict: any issue is an error. Lenient: issues become a logged warning.
fn finish(report: ValidationReport, strict: bool) -> Result<Option<ValidationWarning>, DataError> {
    if report.is_clean() {
        return Ok(None);
    }
    if strict {
        return Err(ValidationError {
            issues: report.issues,
        }
        .into());
    }
    let warning = ValidationWarning {
        issues: report.issues,
    };
    tracing::warn!(issues = warning.issues.len(), "{warning}");
    Ok(Some(warning))
}

fn count_violations(rows: impl Iterator<Item = (f64, f64, f64, f64)>) -> (usize, usize) {
    rows.fold((0, 0), |(high, low), (o, h, l, c)| {
        (
            high + usize::from(high_violated(o, h, l, c)),
            low + usize::from(low_violated(o, h, l, c)),
        )
    })
}

fn push_violations(report: &mut ValidationReport, high: usize, low: usize) {
    if high > 0 {
        report.push(ValidationIssue::HighViolations(high));
    }
    if low > 0 {
        report.push(ValidationIssue::LowViolations(low));
    }
}

fn push_missing(report: &mut ValidationReport, column: &str, count: usize) {
    if count > 0 {
        report.push(ValidationIssue::MissingValues {
            column: column.into(),
            count,
        });
    }
}

/// Column values as `f64` with nulls as `NaN`; `None` if the column is
/// absent or not numeric.
fn numeric_values(df: &DataFrame, name: &str) -> Result<Option<Vec<f64>>, DataError> {
    let Ok(column) = df.column(name) else {
        return Ok(None);
    };
    if !BarSchema::is_numeric(column.dtype()) {
        return Ok(None);
    }
    let floats = column
        .cast(&DataType::Float64)
        .map_err(|e| DataError::Frame(format!("{name} cast: {e}")))?;
    let ca = floats
        .f64()
        .map_err(|e| DataError::Frame(format!("{name} column: {e}")))?;
    Ok(Some(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()))
}

/// Nulls, plus `NaN`s in float columns.
fn missing_in_column(column: &Column) -> Result<usize, DataError> {
    if !column.dtype().is_float() {
        return Ok(column.null_count());
    }
    let floats = column
        .cast(&DataType::Float64)
        .map_err(|e| DataError::Frame(e.to_string()))?;
    let ca = floats
        .f64()
        .map_err(|e| DataError::Frame(e.to_string()))?;
    Ok(ca
        .into_iter()
        .filter(|v| v.map_or(true, f64::is_nan))
        .count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, Metadata};
    use chrono::TimeZone;
    use chrono_tz::Tz;

    fn timestamps(n: usize) -> Column {
        let ms: Vec<i64> = (0..n as i64).map(|i| 1_704_153_600_000 + i * 86_400_000).collect();
        Column::new("timestamp".into(), ms)
            .cast(&BarSchema::timestamp_dtype())
            .unwrap()
    }

    fn valid_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("symbol".into(), &["SPY", "SPY"]),
            timestamps(2),
            Column::new("open".into(), &[100.0, 101.0]),
            Column::new("high".into(), &[105.0, 106.0]),
            Column::new("low".into(), &[99.0, 100.0]),
            Column::new("close".into(), &[103.0, 104.0]),
            Column::new("volume".into(), &[1000.0, 1100.0]),
        ])
        .unwrap()
    }

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(
            "TEST",
            Tz::UTC.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            open,
            high,
            low,
            close,
            1000.0,
        )
    }

    #[test]
    fn clean_frame_passes_strict() {
        let df = valid_frame();
        let out = Validator::validate_frame(df.clone(), true).unwrap();
        assert!(out.equals(&df));
    }

    #[test]
    fn table_without_columns_is_a_shape_error() {
        let err = Validator::inspect_frame(&DataFrame::empty()).unwrap_err();
        assert!(matches!(err, DataError::Shape(_)));
    }

    #[test]
    fn missing_columns_are_named_exactly() {
        let df = valid_frame().drop_many(["high", "volume"]);
        let report = Validator::inspect_frame(&df).unwrap();
        assert_eq!(
            report.issues[0],
            ValidationIssue::MissingColumns(vec!["high".into(), "volume".into()])
        );
        // OHLC rule is skipped without `high`.
        assert!(!report
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::HighViolations(_))));
    }

    #[test]
    fn wrong_types_are_reported_per_column() {
        let mut df = valid_frame();
        df.with_column(Column::new("timestamp".into(), &["2024-01-02", "2024-01-03"]))
            .unwrap();
        df.with_column(Column::new("open".into(), &["a", "b"])).unwrap();
        let report = Validator::inspect_frame(&df).unwrap();

        assert!(matches!(
            report.issues[0],
            ValidationIssue::TimestampType { .. }
        ));
        assert_eq!(
            report.issues[1],
            ValidationIssue::NonNumeric {
                column: "open".into(),
                found: DataType::String.to_string(),
            }
        );
    }

    #[test]
    fn zero_rows_reported_alongside_column_checks() {
        let df = valid_frame().head(Some(0));
        let report = Validator::inspect_frame(&df).unwrap();
        assert_eq!(report.issues, vec![ValidationIssue::ZeroRows]);

        let df = valid_frame().head(Some(0)).drop_many(["close"]);
        let report = Validator::inspect_frame(&df).unwrap();
        assert!(report.issues.contains(&ValidationIssue::ZeroRows));
        assert_eq!(report.issues.len(), 2);
    }

    #[test]
    fn missing_values_count_nulls_and_nans() {
        let mut df = valid_frame();
        df.with_column(Column::new("close".into(), &[Some(f64::NAN), None]))
            .unwrap();
        let report = Validator::inspect_frame(&df).unwrap();
        assert_eq!(
            report.issues,
            vec![ValidationIssue::MissingValues {
                column: "close".into(),
                count: 2
            }]
        );
    }

    #[test]
    fn strict_dataset_failure_mentions_high_price_violations() {
        let ds = Dataset::new(vec![bar(100.0, 95.0, 99.0, 102.0)], Metadata::default());
        let err = Validator::validate(ds, true).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("High price violations"), "{msg}");
        assert!(msg.contains("Low price violations"), "{msg}");
    }

    #[test]
    fn lenient_returns_dataset_unchanged() {
        let ds = Dataset::new(
            vec![bar(100.0, 95.0, 99.0, 102.0), bar(f64::NAN, 1.0, 1.0, 1.0)],
            Metadata::default(),
        );
        let out = Validator::validate(ds.clone(), false).unwrap();
        assert_eq!(out.len(), ds.len());
        assert_eq!(out.bars()[0], ds.bars()[0]);
        assert_eq!(out.meta(), ds.meta());
    }

    #[test]
    fn lenient_hands_back_the_warning() {
        let ds = Dataset::new(vec![bar(100.0, 95.0, 99.0, 102.0)], Metadata::default());

        let (out, warning) = Validator::validate_with_warning(ds.clone(), false).unwrap();
        assert_eq!(out, ds);
        let warning = warning.unwrap();
        assert_eq!(
            warning.issues,
            vec![
                ValidationIssue::HighViolations(1),
                ValidationIssue::LowViolations(1)
            ]
        );
        assert!(warning.to_string().starts_with("validation warnings: High price violations"));

        let clean = Dataset::new(vec![bar(100.0, 110.0, 90.0, 105.0)], Metadata::default());
        let (_, warning) = Validator::validate_with_warning(clean, false).unwrap();
        assert!(warning.is_none());
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn lenient_frame_validation_logs_a_warning() {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .finish();

        let mut df = valid_frame();
        df.with_column(Column::new("close".into(), &[103.0, f64::NAN]))
            .unwrap();
        let (_, warning) = tracing::subscriber::with_default(subscriber, || {
            Validator::validate_frame_with_warning(df, false).unwrap()
        });
        assert!(warning.is_some());

        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("WARN"), "{logged}");
        assert!(logged.contains("Column 'close' has 1 missing values"), "{logged}");
        assert!(logged.contains("issues=1"), "{logged}");
    }

    #[test]
    fn inverted_bar_counts_on_both_sides() {
        let ds = Dataset::new(
            vec![bar(100.0, 90.0, 110.0, 100.0), bar(100.0, 105.0, 95.0, 100.0)],
            Metadata::default(),
        );
        let report = Validator::inspect(&ds);
        assert_eq!(
            report.issues,
            vec![
                ValidationIssue::HighViolations(1),
                ValidationIssue::LowViolations(1)
            ]
        );
    }

    #[test]
    fn ties_pass() {
        let ds = Dataset::new(vec![bar(100.0, 100.0, 100.0, 100.0)], Metadata::default());
        assert!(Validator::inspect(&ds).is_clean());
    }

    #[test]
    fn empty_dataset_reports_zero_rows() {
        let report = Validator::inspect(&Dataset::empty(Metadata::default()));
        assert_eq!(report.issues, vec![ValidationIssue::ZeroRows]);
        assert_eq!(report.message(), "Dataset has zero rows");
    }

    #[test]
    fn issues_are_joined_in_order() {
        let err = ValidationError {
            issues: vec![
                ValidationIssue::ZeroRows,
                ValidationIssue::MissingColumns(vec!["low".into()]),
            ],
        };
        assert_eq!(
            err.to_string(),
            "validation failed: Dataset has zero rows; Missing required columns: low"
        );
    }
}
