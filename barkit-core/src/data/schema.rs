use crate::domain::field::{SYMBOL, TIMESTAMP};
use polars::prelude::*;

/// Column layout of a raw bar table.
pub struct BarSchema;

impl BarSchema {
    /// Columns every raw table must carry, in check order.
    pub const REQUIRED: [&'static str; 7] =
        [SYMBOL, TIMESTAMP, "open", "high", "low", "close", "volume"];

    /// Columns that must hold numbers.
    pub const NUMERIC: [&'static str; 5] = ["open", "high", "low", "close", "volume"];

    /// Canonical dtype of the timestamp column produced by providers.
    pub fn timestamp_dtype() -> DataType {
        DataType::Datetime(TimeUnit::Milliseconds, None)
    }

    /// Required columns absent from `df`, in schema order.
    pub fn missing_columns(df: &DataFrame) -> Vec<&'static str> {
        Self::REQUIRED
            .into_iter()
            .filter(|name| df.column(name).is_err())
            .collect()
    }

    pub fn is_datetime(dtype: &DataType) -> bool {
        matches!(dtype, DataType::Datetime(_, _))
    }

    pub fn is_numeric(dtype: &DataType) -> bool {
        dtype.is_float() || dtype.is_integer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_are_reported_in_schema_order() {
        let df = df!(
            "symbol" => &["SPY"],
            "close" => &[403.0],
            "open" => &[400.0],
        )
        .unwrap();

        assert_eq!(
            BarSchema::missing_columns(&df),
            vec!["timestamp", "high", "low", "volume"]
        );
    }

    #[test]
    fn numeric_dtypes() {
        assert!(BarSchema::is_numeric(&DataType::Float64));
        assert!(BarSchema::is_numeric(&DataType::Int64));
        assert!(BarSchema::is_numeric(&DataType::UInt64));
        assert!(!BarSchema::is_numeric(&DataType::String));
        assert!(BarSchema::is_datetime(&BarSchema::timestamp_dtype()));
        assert!(!BarSchema::is_datetime(&DataType::Date));
    }
}
