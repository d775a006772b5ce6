//! Data acquisition: providers, raw tables and file I/O.

pub mod alphavantage;
pub mod csv_file;
pub mod download;
pub mod frame;
pub mod parquet;
pub mod provider;
pub mod schema;
pub mod yahoo;

pub use alphavantage::AlphaVantageProvider;
pub use csv_file::{write_csv, write_csv_path, CsvOptions, CsvProvider, CsvReader};
pub use download::{fetch_dataset, FetchRequest};
pub use parquet::{read_parquet, write_parquet, ParquetProvider};
pub use provider::{DataProvider, FnProvider, RawBar, StaticProvider};
pub use schema::BarSchema;
pub use yahoo::YahooProvider;
