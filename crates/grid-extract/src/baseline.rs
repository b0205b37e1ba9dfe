//! Last-seen accumulated fields, keyed per model stream.

use std::collections::HashMap;
use std::sync::Mutex;

/// Keyed store of the most recent accumulated field per logical stream.
///
/// The upstream precipitation total accumulates monotonically from forecast
/// start; per-interval values are obtained by differencing consecutive
/// frames. Keeping one entry per stream key avoids cross-talk between models
/// parsed concurrently, and the mutex serializes differencing while file I/O
/// overlaps.
#[derive(Debug, Default)]
pub struct BaselineStore {
    previous: Mutex<HashMap<String, Vec<f32>>>,
}

impl BaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Difference `current` against the stored baseline for `key`.
    ///
    /// The first frame of a stream, or a frame whose length no longer matches
    /// the stored baseline, is returned unchanged. The stored baseline is
    /// always replaced with the pre-difference field.
    pub fn difference(&self, key: &str, current: Vec<f32>) -> Vec<f32> {
        let mut previous = self.previous.lock().expect("baseline lock poisoned");

        let output = match previous.get(key) {
            Some(prev) if prev.len() == current.len() => current
                .iter()
                .zip(prev.iter())
                .map(|(cur, prev)| cur - prev)
                .collect(),
            _ => current.clone(),
        };

        previous.insert(key.to_string(), current);
        output
    }
}
