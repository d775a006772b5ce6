//! TOML pipeline configuration.
//!
//! ```toml
//! symbols = ["SPY", "QQQ"]
//! start = "2024-01-01"
//! end = "2024-06-30"
//! frequency = "daily"
//!
//! [source]
//! type = "YAHOO"
//!
//! [metadata]
//! timezone = "America/New_York"
//!
//! [fill]
//! method = "forward"
//!
//! [[splits]]
//! date = "2024-06-10"
//! ratio = 10.0
//! ```

use crate::data::alphavantage::DEFAULT_KEY_ENV;
use crate::data::{
    AlphaVantageProvider, CsvOptions, CsvProvider, DataProvider, FetchRequest, ParquetProvider,
    YahooProvider,
};
use crate::domain::{parse_timezone, Field, Frequency, Metadata};
use crate::error::DataError;
use crate::pipeline::{Pipeline, Split};
use crate::transform::FillMethod;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub symbols: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub fill: Option<FillConfig>,
    #[serde(default)]
    pub splits: Vec<Split>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where bars come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceConfig {
    Yahoo,
    AlphaVantage {
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_key_env")]
        api_key_env: String,
    },
    Csv {
        path: PathBuf,
        #[serde(default = "default_symbol_column")]
        symbol_column: String,
        #[serde(default)]
        symbol: Option<String>,
        #[serde(default = "default_date_column")]
        date_column: String,
        #[serde(default)]
        date_format: Option<String>,
    },
    Parquet {
        path: PathBuf,
    },
}

fn default_key_env() -> String {
    DEFAULT_KEY_ENV.into()
}

fn default_symbol_column() -> String {
    CsvOptions::default().symbol_column
}

fn default_date_column() -> String {
    CsvOptions::default().date_column
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetadataConfig {
    pub timezone: String,
    pub asset_class: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".into(),
            asset_class: "equity".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    pub strict: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Method and column names stay strings until [`PipelineConfig::pipeline`]
/// so an unknown name is reported as the matching [`DataError`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FillConfig {
    pub method: String,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub timezone: Option<String>,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, DataError> {
        toml::from_str(content).map_err(|e| DataError::Config(format!("parse pipeline TOML: {e}")))
    }

    pub fn to_toml(&self) -> Result<String, DataError> {
        toml::to_string_pretty(self)
            .map_err(|e| DataError::Config(format!("serialize pipeline: {e}")))
    }

    pub fn request(&self) -> FetchRequest {
        FetchRequest::new(self.symbols.clone(), self.start, self.end)
            .with_frequency(self.frequency)
    }

    /// Build the configured provider. Network providers are only constructed,
    /// never contacted.
    pub fn provider(&self) -> Result<Box<dyn DataProvider>, DataError> {
        let provider: Box<dyn DataProvider> = match &self.source {
            SourceConfig::Yahoo => Box::new(YahooProvider::new()?),
            SourceConfig::AlphaVantage {
                api_key: Some(key),
                ..
            } => Box::new(AlphaVantageProvider::new(key.clone())?),
            SourceConfig::AlphaVantage { api_key_env, .. } => {
                Box::new(AlphaVantageProvider::from_env(api_key_env)?)
            }
            SourceConfig::Csv {
                path,
                symbol_column,
                symbol,
                date_column,
                date_format,
            } => Box::new(CsvProvider::new(
                path.clone(),
                CsvOptions {
                    symbol_column: symbol_column.clone(),
                    symbol: symbol.clone(),
                    date_column: date_column.clone(),
                    date_format: date_format.clone(),
                },
            )),
            SourceConfig::Parquet { path } => Box::new(ParquetProvider::new(path.clone())),
        };
        Ok(provider)
    }

    /// Resolve names into a [`Pipeline`], failing on the first bad one.
    pub fn pipeline(&self) -> Result<Pipeline, DataError> {
        if self.symbols.is_empty() {
            return Err(DataError::Config("no symbols configured".into()));
        }

        let metadata = Metadata::default()
            .with_timezone(parse_timezone(&self.metadata.timezone)?)
            .with_asset_class(self.metadata.asset_class.clone())
            .with_frequency(self.frequency);
        let mut pipeline = Pipeline::new(metadata).strict(self.validation.strict);

        if let Some(fill) = &self.fill {
            let method: FillMethod = fill.method.parse()?;
            let columns = fill
                .columns
                .as_ref()
                .map(|names| {
                    names
                        .iter()
                        .map(|n| n.parse::<Field>())
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?;
            pipeline = pipeline.with_fill(method, columns);
        }
        for split in &self.splits {
            pipeline = pipeline.with_split(*split)?;
        }
        if let Some(zone) = &self.output.timezone {
            pipeline = pipeline.with_output_timezone(zone)?;
        }
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        symbols = ["SPY", "QQQ"]
        start = "2024-01-01"
        end = "2024-06-30"
        frequency = "1wk"

        [source]
        type = "CSV"
        path = "prices.csv"
        date_column = "Date"

        [metadata]
        timezone = "America/New_York"
        asset_class = "etf"

        [validation]
        strict = false

        [fill]
        method = "linear"
        columns = ["close", "adj_close"]

        [[splits]]
        date = "2024-06-10"
        ratio = 10.0

        [output]
        timezone = "Europe/London"
    "#;

    #[test]
    fn parses_full_config() {
        let config = PipelineConfig::from_toml(FULL).unwrap();
        assert_eq!(config.frequency, Frequency::Weekly);
        assert_eq!(config.splits.len(), 1);
        assert!(!config.validation.strict);
        match &config.source {
            SourceConfig::Csv {
                date_column,
                symbol_column,
                ..
            } => {
                assert_eq!(date_column, "Date");
                assert_eq!(symbol_column, "symbol");
            }
            other => panic!("unexpected source {other:?}"),
        }

        let pipeline = config.pipeline().unwrap();
        assert!(!pipeline.is_strict());
        assert_eq!(pipeline.metadata().asset_class, "etf");
        assert_eq!(pipeline.metadata().timezone.name(), "America/New_York");

        let request = config.request();
        assert_eq!(request.symbols, vec!["SPY", "QQQ"]);
        assert_eq!(request.frequency, Frequency::Weekly);
    }

    #[test]
    fn defaults_apply() {
        let config = PipelineConfig::from_toml(
            r#"
            symbols = ["SPY"]
            start = "2024-01-01"
            end = "2024-01-31"
            [source]
            type = "YAHOO"
            "#,
        )
        .unwrap();
        assert_eq!(config.frequency, Frequency::Daily);
        assert_eq!(config.metadata, MetadataConfig::default());
        assert!(config.validation.strict);
        assert!(config.fill.is_none());
        assert!(config.output.timezone.is_none());
    }

    #[test]
    fn alpha_vantage_key_env_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            symbols = ["IBM"]
            start = "2024-01-01"
            end = "2024-01-31"
            [source]
            type = "ALPHA_VANTAGE"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.source,
            SourceConfig::AlphaVantage {
                api_key: None,
                api_key_env: "ALPHAVANTAGE_API_KEY".into()
            }
        );
    }

    #[test]
    fn unknown_names_fail_when_building() {
        let mut config = PipelineConfig::from_toml(FULL).unwrap();
        config.fill = Some(FillConfig {
            method: "nearest".into(),
            columns: None,
        });
        assert!(matches!(config.pipeline(), Err(DataError::UnsupportedMethod(_))));

        let mut config = PipelineConfig::from_toml(FULL).unwrap();
        config.metadata.timezone = "Moon/Base".into();
        assert!(matches!(config.pipeline(), Err(DataError::InvalidTimezone(_))));

        let mut config = PipelineConfig::from_toml(FULL).unwrap();
        config.fill = Some(FillConfig {
            method: "forward".into(),
            columns: Some(vec!["symbol".into()]),
        });
        assert!(matches!(config.pipeline(), Err(DataError::UnknownColumn(_))));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = PipelineConfig::from_toml("symbols = [").unwrap_err();
        assert!(matches!(err, DataError::Config(_)));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = PipelineConfig::from_toml(FULL).unwrap();
        let text = config.to_toml().unwrap();
        assert_eq!(PipelineConfig::from_toml(&text).unwrap(), config);
    }
}
