//! Grid extraction: turning decoded forecast rows into wgf4 frames.
//!
//! The decoding backend hands over an ordered row table; this crate infers
//! the regular lat/lon geometry from row order, filters out samples past the
//! file's valid time, and differences the accumulated precipitation total
//! against the stream's previous frame.

pub mod baseline;
pub mod error;
pub mod geometry;
pub mod rows;

pub use baseline::BaselineStore;
pub use error::ExtractError;
pub use geometry::{coordinate_positions, infer_geometry, GeometryError, GridGeometry};
pub use rows::{ForecastDecoder, GridRow, TabularRow, ACCUMULATED_FIELD};

use meteo_common::FileName;
use tracing::debug;
use wgf4::GridHeader;

/// A fully extracted per-file payload ready for serialization.
#[derive(Debug, Clone)]
pub struct GridFrame {
    pub header: GridHeader,
    pub values: Vec<f32>,
}

/// Extract a wgf4 frame from one file's decoded rows.
///
/// Rows whose valid time lies past the file's own valid time are dropped
/// before geometry or value extraction. Values are differenced against the
/// model stream's previous accumulated field; a cold stream emits the raw
/// field.
pub fn extract_frame<R: GridRow>(
    name: &FileName,
    rows: &[R],
    baselines: &BaselineStore,
) -> Result<GridFrame, ExtractError> {
    let file = name.full_name();
    let frame_time = name.frame_time();

    let rows: Vec<&R> = rows
        .iter()
        .filter(|row| row.valid_time() <= frame_time.as_str())
        .collect();
    debug!(file = %file, rows = rows.len(), "rows within valid-time window");

    let geometry = infer_geometry(&rows, name.offset).map_err(|e| match e {
        GeometryError::Exhausted => ExtractError::Geometry {
            file: file.clone(),
            reason: e.to_string(),
        },
        GeometryError::MissingCoordinate { .. } => ExtractError::Parse {
            file: file.clone(),
            reason: e.to_string(),
        },
    })?;

    let mut accumulated = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let value = row
            .field(ACCUMULATED_FIELD)
            .ok_or_else(|| ExtractError::Parse {
                file: file.clone(),
                reason: format!("row {index}: missing field {ACCUMULATED_FIELD:?}"),
            })?;
        accumulated.push(value as f32);
    }

    let values = baselines.difference(&name.model_name, accumulated);

    Ok(GridFrame {
        header: geometry.to_header(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const NAME_H00: &str =
        "icon-d2_germany_regular-lat-lon_single-level_2023070612_000_2d_tot_prec.grib2";
    const NAME_H01: &str =
        "icon-d2_germany_regular-lat-lon_single-level_2023070612_001_2d_tot_prec.grib2";

    fn row(coords: &[f64], total: f64, valid_time: &str) -> TabularRow {
        TabularRow {
            coords: coords.to_vec(),
            fields: HashMap::from([(ACCUMULATED_FIELD.to_string(), total)]),
            valid_time: valid_time.to_string(),
        }
    }

    /// 2x2 grid with each sample's accumulated total.
    fn frame_rows(totals: [f64; 4], valid_time: &str) -> Vec<TabularRow> {
        let mut rows = Vec::new();
        for (i, lat) in [50.0, 49.75].iter().enumerate() {
            for (j, lon) in [6.0, 6.25].iter().enumerate() {
                rows.push(row(&[0.0, *lat, *lon], totals[i * 2 + j], valid_time));
            }
        }
        rows
    }

    #[test]
    fn test_first_frame_emits_raw_totals() {
        let name = FileName::parse(NAME_H00).unwrap();
        let baselines = BaselineStore::new();

        let frame = extract_frame(
            &name,
            &frame_rows([0.0, 0.5, 1.0, 1.5], "2023-07-06 12:00:00"),
            &baselines,
        )
        .unwrap();

        assert_eq!(frame.values, vec![0.0, 0.5, 1.0, 1.5]);
        assert_eq!(frame.header.south_lat, 50_000_000.0);
        assert_eq!(frame.header.east_lon, 6_250_000.0);
    }

    #[test]
    fn test_second_frame_is_interval_difference() {
        let h00 = FileName::parse(NAME_H00).unwrap();
        let h01 = FileName::parse(NAME_H01).unwrap();
        let baselines = BaselineStore::new();

        extract_frame(
            &h00,
            &frame_rows([1.0, 2.0, 0.0, 0.0], "2023-07-06 12:00:00"),
            &baselines,
        )
        .unwrap();

        let frame = extract_frame(
            &h01,
            &frame_rows([1.5, 5.0, 0.25, 0.0], "2023-07-06 13:00:00"),
            &baselines,
        )
        .unwrap();

        assert_eq!(frame.values, vec![0.5, 3.0, 0.25, 0.0]);
    }

    #[test]
    fn test_late_rows_are_dropped() {
        let name = FileName::parse(NAME_H00).unwrap();
        let baselines = BaselineStore::new();

        let mut rows = frame_rows([0.0, 0.5, 1.0, 1.5], "2023-07-06 12:00:00");
        // Sample from past the file's valid window; must not be emitted.
        rows.push(row(&[0.0, 49.5, 6.5], 9.0, "2023-07-06 14:00:00"));

        let frame = extract_frame(&name, &rows, &baselines).unwrap();
        assert_eq!(frame.values.len(), 4);
        // The dropped row is also invisible to geometry's tail scan.
        assert_eq!(frame.header.north_lat, 49_750_000.0);
    }

    #[test]
    fn test_missing_field_is_a_parse_error() {
        let name = FileName::parse(NAME_H00).unwrap();
        let baselines = BaselineStore::new();

        let mut rows = frame_rows([0.0, 0.5, 1.0, 1.5], "2023-07-06 12:00:00");
        rows[2].fields.clear();

        let err = extract_frame(&name, &rows, &baselines).unwrap_err();
        assert!(matches!(err, ExtractError::Parse { .. }));
    }

    #[test]
    fn test_unestablished_geometry_is_a_geometry_error() {
        let name = FileName::parse(NAME_H00).unwrap();
        let baselines = BaselineStore::new();

        // Single point: no step can ever be observed.
        let rows = vec![row(&[0.0, 50.0, 6.0], 1.0, "2023-07-06 12:00:00")];
        let err = extract_frame(&name, &rows, &baselines).unwrap_err();
        assert!(matches!(err, ExtractError::Geometry { .. }));
    }
}
