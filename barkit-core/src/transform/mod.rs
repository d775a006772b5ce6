//! Dataset transforms.
//!
//! Each transform takes a [`Dataset`](crate::domain::Dataset) by value and
//! returns a new one; metadata travels with the rows.

pub mod fill;
pub mod interpolate;
pub mod split;
pub mod timezone;

pub use fill::{fill, FillMethod, GapFiller};
pub use interpolate::{Interpolator, NaturalSpline};
pub use split::adjust_for_split;
pub use timezone::convert_timezone;
