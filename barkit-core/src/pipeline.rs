//! Pipeline: fetch → validate → fill → split adjustments → timezone.

use crate::data::{fetch_dataset, DataProvider, FetchRequest};
use crate::domain::{parse_timezone, Dataset, Field, Metadata};
use crate::error::DataError;
use crate::transform::{adjust_for_split, convert_timezone, FillMethod, GapFiller};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A split event: bars before `date` are divided by `ratio`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub date: NaiveDate,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct FillStep {
    method: FillMethod,
    columns: Option<Vec<Field>>,
}

/// Post-fetch processing applied in a fixed order.
pub struct Pipeline {
    metadata: Metadata,
    strict: bool,
    fill: Option<FillStep>,
    filler: GapFiller,
    splits: Vec<Split>,
    output_timezone: Option<String>,
}

impl Pipeline {
    /// `metadata` supplies the timezone and asset class of fetched data.
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            strict: true,
            fill: None,
            filler: GapFiller::default(),
            splits: Vec::new(),
            output_timezone: None,
        }
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn with_fill(mut self, method: FillMethod, columns: Option<Vec<Field>>) -> Self {
        self.fill = Some(FillStep { method, columns });
        self
    }

    #[must_use]
    pub fn with_filler(mut self, filler: GapFiller) -> Self {
        self.filler = filler;
        self
    }

    pub fn with_split(mut self, split: Split) -> Result<Self, DataError> {
        if !split.ratio.is_finite() || split.ratio <= 0.0 {
            return Err(DataError::InvalidSplitRatio(split.ratio));
        }
        self.splits.push(split);
        Ok(self)
    }

    pub fn with_output_timezone(mut self, zone: &str) -> Result<Self, DataError> {
        parse_timezone(zone)?;
        self.output_timezone = Some(zone.to_string());
        Ok(self)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Fetch through `provider` and process the result.
    pub fn run(
        &self,
        provider: &dyn DataProvider,
        request: &FetchRequest,
    ) -> Result<Dataset, DataError> {
        let dataset = fetch_dataset(provider, request, self.metadata.clone(), self.strict)?;
        tracing::info!(
            rows = dataset.len(),
            symbols = dataset.symbols().len(),
            source = %dataset.meta().source,
            "fetched dataset"
        );
        self.process(dataset)
    }

    /// Apply fill, split adjustments and timezone conversion in that order.
    pub fn process(&self, mut dataset: Dataset) -> Result<Dataset, DataError> {
        if let Some(step) = &self.fill {
            dataset = self
                .filler
                .fill(dataset, step.method, step.columns.as_deref())?;
            tracing::info!(method = %step.method, "filled gaps");
        }
        for split in &self.splits {
            dataset = adjust_for_split(dataset, split.ratio, split.date)?;
            tracing::info!(date = %split.date, ratio = split.ratio, "adjusted for split");
        }
        if let Some(zone) = &self.output_timezone {
            dataset = convert_timezone(dataset, zone)?;
            tracing::info!(timezone = %zone, "converted timezone");
        }
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    fn dataset() -> Dataset {
        let bar = |day, close| {
            Bar::new(
                "ACME",
                Tz::UTC.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
                close,
                close,
                close,
                close,
                10.0,
            )
        };
        Dataset::new(
            vec![bar(2, 100.0), bar(3, f64::NAN), bar(4, 300.0)],
            Metadata::default(),
        )
    }

    #[test]
    fn steps_run_in_order() {
        let pipeline = Pipeline::new(Metadata::default())
            .with_fill(FillMethod::Linear, None)
            .with_split(Split {
                date: NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
                ratio: 2.0,
            })
            .unwrap()
            .with_output_timezone("Asia/Tokyo")
            .unwrap();

        let out = pipeline.process(dataset()).unwrap();
        let closes: Vec<f64> = out.iter().map(|b| b.close).collect();
        // Filled before the split, so the interpolated value is halved too.
        assert_eq!(closes, vec![50.0, 100.0, 300.0]);
        assert_eq!(out.meta().timezone.name(), "Asia/Tokyo");
    }

    #[test]
    fn bad_settings_fail_at_build_time() {
        assert!(matches!(
            Pipeline::new(Metadata::default()).with_output_timezone("Nowhere/Land"),
            Err(DataError::InvalidTimezone(_))
        ));
        let split = Split {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ratio: 0.0,
        };
        assert!(matches!(
            Pipeline::new(Metadata::default()).with_split(split),
            Err(DataError::InvalidSplitRatio(_))
        ));
    }

    #[test]
    fn custom_filler_is_used_for_the_fill_step() {
        let pipeline = Pipeline::new(Metadata::default())
            .with_fill(FillMethod::Spline, None)
            .with_filler(GapFiller::without_interpolator());
        let err = pipeline.process(dataset()).unwrap_err();
        assert!(matches!(err, DataError::MissingDependency { .. }));

        let pipeline = Pipeline::new(Metadata::default())
            .with_fill(FillMethod::Forward, None)
            .with_filler(GapFiller::without_interpolator());
        let out = pipeline.process(dataset()).unwrap();
        assert_eq!(out.bars()[1].close, 100.0);
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let ds = dataset();
        let out = Pipeline::new(Metadata::default()).process(ds.clone()).unwrap();
        assert_eq!(out.len(), ds.len());
        assert!(out.bars()[1].close.is_nan());
    }
}
