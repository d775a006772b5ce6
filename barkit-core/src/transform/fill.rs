//! Gap filling, computed independently per symbol.
//!
//! Rows are partitioned by symbol; within a partition each column is a
//! sequence indexed by row position (gaps are positional, timestamps are not
//! consulted). Output rows keep the original table order.

use super::interpolate::{Interpolator, NaturalSpline};
use crate::domain::dataset::partition_rows;
use crate::domain::{Dataset, Field};
use crate::error::DataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMethod {
    /// Carry the last known value forward; leading gaps stay missing.
    Forward,
    /// Carry the next known value backward; trailing gaps stay missing.
    Backward,
    /// Straight line between the surrounding known values.
    Linear,
    /// Natural cubic spline through the known values.
    Spline,
}

impl FillMethod {
    pub fn needs_interpolator(self) -> bool {
        matches!(self, FillMethod::Linear | FillMethod::Spline)
    }
}

impl fmt::Display for FillMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FillMethod::Forward => "forward",
            FillMethod::Backward => "backward",
            FillMethod::Linear => "linear",
            FillMethod::Spline => "spline",
        })
    }
}

impl FromStr for FillMethod {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" | "ffill" | "pad" => Ok(FillMethod::Forward),
            "backward" | "bfill" | "backfill" => Ok(FillMethod::Backward),
            "linear" => Ok(FillMethod::Linear),
            "spline" => Ok(FillMethod::Spline),
            _ => Err(DataError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// Fills missing (`NaN`) values in a dataset.
pub struct GapFiller {
    interpolator: Option<Box<dyn Interpolator>>,
}

impl Default for GapFiller {
    fn default() -> Self {
        Self::with_interpolator(NaturalSpline)
    }
}

impl GapFiller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interpolator(interpolator: impl Interpolator + 'static) -> Self {
        Self {
            interpolator: Some(Box::new(interpolator)),
        }
    }

    /// A filler with no interpolation backend: only `forward` and `backward` work.
    pub fn without_interpolator() -> Self {
        Self { interpolator: None }
    }

    /// Fill `columns` (all numeric columns when `None`) of every symbol partition.
    ///
    /// Fails before touching any row when `method` needs an interpolation
    /// capability the backend does not provide.
    pub fn fill(
        &self,
        dataset: Dataset,
        method: FillMethod,
        columns: Option<&[Field]>,
    ) -> Result<Dataset, DataError> {
        let interpolator = if method.needs_interpolator() {
            match &self.interpolator {
                Some(backend) if backend.supports(method) => Some(backend.as_ref()),
                Some(backend) => {
                    return Err(DataError::MissingDependency {
                        method: method.to_string(),
                        backend: format!("backend '{}' does not provide it", backend.name()),
                    })
                }
                None => {
                    return Err(DataError::MissingDependency {
                        method: method.to_string(),
                        backend: "no backend configured".into(),
                    })
                }
            }
        } else {
            None
        };

        let columns = columns.unwrap_or(&Field::ALL);
        let (mut bars, meta) = dataset.into_parts();
        let partitions: Vec<Vec<usize>> = partition_rows(&bars).into_values().collect();

        let mut filled = 0usize;
        for rows in &partitions {
            for &field in columns {
                let mut series: Vec<f64> = rows.iter().map(|&i| bars[i].get(field)).collect();
                let gaps: Vec<bool> = series.iter().map(|v| v.is_nan()).collect();

                match (method, interpolator) {
                    (FillMethod::Forward, _) => forward_fill(&mut series),
                    (FillMethod::Backward, _) => backward_fill(&mut series),
                    (_, Some(backend)) => backend.fill_interior(method, &mut series),
                    (_, None) => {}
                }

                filled += gaps
                    .iter()
                    .zip(&series)
                    .filter(|&(&gap, v)| gap && !v.is_nan())
                    .count();
                for (&row, value) in rows.iter().zip(series) {
                    *bars[row].get_mut(field) = value;
                }
            }
        }

        tracing::debug!(
            %method,
            partitions = partitions.len(),
            filled,
            "filled missing values"
        );
        Ok(Dataset::new(bars, meta))
    }
}

/// Fill with the default backend.
pub fn fill(
    dataset: Dataset,
    method: FillMethod,
    columns: Option<&[Field]>,
) -> Result<Dataset, DataError> {
    GapFiller::default().fill(dataset, method, columns)
}

fn forward_fill(values: &mut [f64]) {
    let mut last = f64::NAN;
    for v in values.iter_mut() {
        if v.is_nan() {
            *v = last;
        } else {
            last = *v;
        }
    }
}

fn backward_fill(values: &mut [f64]) {
    let mut next = f64::NAN;
    for v in values.iter_mut().rev() {
        if v.is_nan() {
            *v = next;
        } else {
            next = *v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, Metadata};
    use chrono::TimeZone;
    use chrono_tz::Tz;

    const NAN: f64 = f64::NAN;

    fn bar(symbol: &str, day: u32, open: f64) -> Bar {
        Bar::new(
            symbol,
            Tz::UTC.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            open,
            200.0,
            50.0,
            100.0,
            1000.0,
        )
    }

    fn opens(ds: &Dataset) -> Vec<f64> {
        ds.iter().map(|b| b.open).collect()
    }

    fn same(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len()
            && a
                .iter()
                .zip(b)
                .all(|(x, y)| (x.is_nan() && y.is_nan()) || (x - y).abs() < 1e-9)
    }

    fn series(symbol: &str, values: &[f64]) -> Dataset {
        let bars = values
            .iter()
            .enumerate()
            .map(|(i, &v)| bar(symbol, i as u32 + 1, v))
            .collect();
        Dataset::new(bars, Metadata::default())
    }

    #[test]
    fn forward_fill_three_rows() {
        let ds = series("SPY", &[100.0, NAN, 102.0]);
        let out = fill(ds, FillMethod::Forward, None).unwrap();
        assert_eq!(opens(&out), vec![100.0, 100.0, 102.0]);
    }

    #[test]
    fn forward_leaves_leading_gap() {
        let ds = series("SPY", &[NAN, 1.0, NAN]);
        let out = fill(ds, FillMethod::Forward, None).unwrap();
        assert!(same(&opens(&out), &[NAN, 1.0, 1.0]));
    }

    #[test]
    fn backward_leaves_trailing_gap() {
        let ds = series("SPY", &[NAN, 1.0, NAN]);
        let out = fill(ds, FillMethod::Backward, None).unwrap();
        assert!(same(&opens(&out), &[1.0, 1.0, NAN]));
    }

    #[test]
    fn linear_leaves_edges() {
        let ds = series("SPY", &[NAN, 10.0, NAN, 30.0, NAN]);
        let out = fill(ds, FillMethod::Linear, None).unwrap();
        assert!(same(&opens(&out), &[NAN, 10.0, 20.0, 30.0, NAN]));
    }

    #[test]
    fn partitions_do_not_leak_across_symbols() {
        let ds = Dataset::new(
            vec![
                bar("AAA", 1, 1.0),
                bar("BBB", 1, NAN),
                bar("AAA", 2, NAN),
                bar("BBB", 2, 5.0),
            ],
            Metadata::default(),
        );
        let out = fill(ds, FillMethod::Forward, None).unwrap();
        // BBB's leading gap must not pick up AAA's value.
        assert!(same(&opens(&out), &[1.0, NAN, 1.0, 5.0]));
        let symbols: Vec<_> = out.iter().map(|b| b.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAA", "BBB", "AAA", "BBB"]);
    }

    #[test]
    fn only_requested_columns_are_filled() {
        let mut ds_bars = vec![bar("SPY", 1, 1.0), bar("SPY", 2, NAN)];
        ds_bars[1].volume = NAN;
        let ds = Dataset::new(ds_bars, Metadata::default());

        let out = fill(ds, FillMethod::Forward, Some(&[Field::Volume])).unwrap();
        assert!(out.bars()[1].open.is_nan());
        assert_eq!(out.bars()[1].volume, 1000.0);
    }

    #[test]
    fn fully_missing_column_is_left_alone() {
        let ds = series("SPY", &[NAN, NAN, NAN]);
        for method in [
            FillMethod::Forward,
            FillMethod::Backward,
            FillMethod::Linear,
            FillMethod::Spline,
        ] {
            let out = fill(ds.clone(), method, None).unwrap();
            assert!(out.iter().all(|b| b.open.is_nan()), "{method}");
        }
    }

    #[test]
    fn unknown_method_name_is_rejected() {
        assert!(matches!(
            "nearest".parse::<FillMethod>(),
            Err(DataError::UnsupportedMethod(m)) if m == "nearest"
        ));
        assert_eq!("ffill".parse::<FillMethod>().unwrap(), FillMethod::Forward);
    }

    #[test]
    fn interpolating_methods_need_a_backend() {
        let ds = series("SPY", &[1.0, NAN, 3.0]);
        let filler = GapFiller::without_interpolator();

        let err = filler.fill(ds.clone(), FillMethod::Spline, None).unwrap_err();
        assert!(matches!(err, DataError::MissingDependency { .. }));

        let out = filler.fill(ds, FillMethod::Forward, None).unwrap();
        assert_eq!(opens(&out), vec![1.0, 1.0, 3.0]);
    }

    struct LinearOnly;

    impl Interpolator for LinearOnly {
        fn name(&self) -> &str {
            "linear_only"
        }

        fn supports(&self, method: FillMethod) -> bool {
            method == FillMethod::Linear
        }

        fn fill_interior(&self, method: FillMethod, values: &mut [f64]) {
            NaturalSpline.fill_interior(method, values);
        }
    }

    #[test]
    fn backend_without_spline_fails_before_filling() {
        let filler = GapFiller::with_interpolator(LinearOnly);
        let ds = series("SPY", &[1.0, NAN, 3.0]);

        let err = filler.fill(ds.clone(), FillMethod::Spline, None).unwrap_err();
        assert!(err.to_string().contains("linear_only"), "{err}");

        let out = filler.fill(ds, FillMethod::Linear, None).unwrap();
        assert_eq!(opens(&out), vec![1.0, 2.0, 3.0]);
    }

    /// Writes NaN over every value, known or not.
    struct Eraser;

    impl Interpolator for Eraser {
        fn name(&self) -> &str {
            "eraser"
        }

        fn supports(&self, _method: FillMethod) -> bool {
            true
        }

        fn fill_interior(&self, _method: FillMethod, values: &mut [f64]) {
            values.fill(f64::NAN);
        }
    }

    #[test]
    fn backend_that_erases_known_values_is_passed_through() {
        let filler = GapFiller::with_interpolator(Eraser);
        let ds = series("SPY", &[1.0, NAN, 3.0]);

        let out = filler.fill(ds, FillMethod::Linear, Some(&[Field::Open])).unwrap();
        assert!(opens(&out).iter().all(|v| v.is_nan()));
        assert_eq!(out.bars()[0].close, 100.0);
    }
}
