//! Domain types: bars, datasets and their metadata.

pub mod bar;
pub mod dataset;
pub mod field;
pub mod frequency;

pub use bar::Bar;
pub use dataset::{parse_timezone, Dataset, Metadata};
pub use field::Field;
pub use frequency::Frequency;
