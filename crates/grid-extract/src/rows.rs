//! Narrow row contract decoupling extraction from the decoding backend.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

/// Name of the accumulated total-precipitation field decoders must expose.
pub const ACCUMULATED_FIELD: &str = "tp";

/// A single decoded grid sample.
///
/// Position 1 of the coordinate tuple is latitude and position 2 longitude by
/// upstream convention; the 48 h forecast step shifts both left by one (see
/// [`crate::geometry::coordinate_positions`]).
pub trait GridRow {
    /// Positional coordinate-tuple component, if present.
    fn coord(&self, index: usize) -> Option<f64>;

    /// Named numeric field, if present.
    fn field(&self, name: &str) -> Option<f64>;

    /// Valid time rendered in the fixed `%Y-%m-%d %H:%M:%S` form.
    ///
    /// Lexical order of this rendering equals chronological order.
    fn valid_time(&self) -> &str;
}

impl<R: GridRow + ?Sized> GridRow for &R {
    fn coord(&self, index: usize) -> Option<f64> {
        (**self).coord(index)
    }

    fn field(&self, name: &str) -> Option<f64> {
        (**self).field(name)
    }

    fn valid_time(&self) -> &str {
        (**self).valid_time()
    }
}

/// Owned row produced by decoding backends.
#[derive(Debug, Clone)]
pub struct TabularRow {
    pub coords: Vec<f64>,
    pub fields: HashMap<String, f64>,
    pub valid_time: String,
}

impl GridRow for TabularRow {
    fn coord(&self, index: usize) -> Option<f64> {
        self.coords.get(index).copied()
    }

    fn field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }

    fn valid_time(&self) -> &str {
        &self.valid_time
    }
}

/// Decoding backend contract: a decompressed forecast file in, ordered rows
/// out. Row order is load-bearing; implementations must not reorder samples.
#[async_trait]
pub trait ForecastDecoder: Send + Sync {
    async fn decode(&self, path: &Path) -> anyhow::Result<Vec<TabularRow>>;
}
