//! barkit core: OHLCV datasets, validation and transforms.
//!
//! This crate contains:
//! - Domain types (bars, datasets, metadata, frequency)
//! - Validator for raw tables and typed datasets
//! - Gap filler, split adjuster and timezone converter
//! - Providers (Yahoo Finance, Alpha Vantage, CSV, Parquet) behind one trait
//! - A TOML-configured pipeline tying them together

pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod transform;
pub mod validate;

pub use error::DataError;
