//! Timezone conversion.

use crate::domain::{parse_timezone, Dataset};
use crate::error::DataError;

/// Re-express every timestamp in `target` and record it in the metadata.
///
/// Instants are unchanged; only the offset they are displayed with moves.
pub fn convert_timezone(dataset: Dataset, target: &str) -> Result<Dataset, DataError> {
    let tz = parse_timezone(target)?;
    let (bars, meta) = dataset.into_parts();
    tracing::debug!(from = %meta.timezone, to = %tz, rows = bars.len(), "converting timezone");
    Ok(Dataset::new(bars, meta.with_timezone(tz)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, Metadata};
    use chrono::{TimeZone, Timelike};
    use chrono_tz::Tz;

    fn sample() -> Dataset {
        let ts = Tz::UTC.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap();
        Dataset::new(
            vec![Bar::new("SPY", ts, 1.0, 2.0, 0.5, 1.5, 10.0)],
            Metadata::new("test"),
        )
    }

    #[test]
    fn instant_is_preserved() {
        let before = sample();
        let after = convert_timezone(before.clone(), "America/New_York").unwrap();

        let (a, b) = (before.bars()[0].timestamp, after.bars()[0].timestamp);
        assert_eq!(a, b);
        assert_eq!(b.hour(), 10); // EDT, UTC-4
        assert_eq!(after.meta().timezone.name(), "America/New_York");
        assert_eq!(after.meta().source, "test");
    }

    #[test]
    fn unknown_zone_fails() {
        let err = convert_timezone(sample(), "Mars/Olympus_Mons").unwrap_err();
        assert!(matches!(err, DataError::InvalidTimezone(z) if z == "Mars/Olympus_Mons"));
    }
}
