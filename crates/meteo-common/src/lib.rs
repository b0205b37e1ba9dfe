//! Common types and helpers shared across the forecast ingestion pipeline.

pub mod filename;
pub mod numeric;

pub use filename::{FileName, MalformedNameError};
pub use numeric::{substitute_missing, to_fixed_point, DEFAULT_MULTIPLIER, NO_DATA};
