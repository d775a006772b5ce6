//! Retroactive split adjustment.

use crate::domain::{Dataset, Field};
use crate::error::DataError;
use chrono::NaiveDate;

/// Rescale every bar dated before `split_date` by `ratio`.
///
/// Prices (`open`, `high`, `low`, `close`, `adjusted`) are divided by the
/// ratio and `volume` is multiplied by it. The comparison uses the bar's
/// calendar date in the dataset's timezone, so a bar at or after local
/// midnight of `split_date` is left alone.
pub fn adjust_for_split(
    dataset: Dataset,
    ratio: f64,
    split_date: NaiveDate,
) -> Result<Dataset, DataError> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(DataError::InvalidSplitRatio(ratio));
    }

    let (mut bars, meta) = dataset.into_parts();
    let mut adjusted = 0usize;
    for bar in bars
        .iter_mut()
        .filter(|b| b.timestamp.date_naive() < split_date)
    {
        for field in Field::PRICES {
            *bar.get_mut(field) /= ratio;
        }
        bar.volume *= ratio;
        adjusted += 1;
    }

    tracing::debug!(ratio, %split_date, adjusted, "applied split adjustment");
    Ok(Dataset::new(bars, meta))
}
