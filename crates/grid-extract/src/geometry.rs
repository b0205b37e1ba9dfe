//! Regular lat/lon grid geometry inferred from decoded rows.

use meteo_common::{to_fixed_point, DEFAULT_MULTIPLIER, NO_DATA};
use thiserror::Error;
use wgf4::GridHeader;

use crate::rows::GridRow;

/// Forecast offset at which the upstream decoder drops its leading
/// valid-time column, shifting the coordinate tuple left by one.
pub const SHIFTED_OFFSET_HOURS: u32 = 48;

/// Tail window consulted for the closing grid corner.
const TAIL_WINDOW: usize = 10;

/// Errors raised while establishing grid geometry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("rows exhausted before grid origin and steps were established")]
    Exhausted,

    #[error("row {row}: missing coordinate at position {position}")]
    MissingCoordinate { row: usize, position: usize },
}

/// Coordinate-tuple positions of (latitude, longitude) for a forecast offset.
///
/// Position 1 is latitude and position 2 longitude, except at the 48 h step
/// where the column layout shifts both left by one. The shift is a fixed
/// exception observed against the real decoder; it is not applied to any
/// other offset.
pub fn coordinate_positions(offset_hours: u32) -> (usize, usize) {
    if offset_hours == SHIFTED_OFFSET_HOURS {
        (0, 1)
    } else {
        (1, 2)
    }
}

/// Inferred bounding box and step sizes, in unscaled degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub start_lat: f64,
    pub end_lat: f64,
    pub start_lon: f64,
    pub end_lon: f64,
    pub lat_step: f64,
    pub lon_step: f64,
}

impl GridGeometry {
    /// Build the wgf4 header, fixed-point-encoding the geometry fields.
    pub fn to_header(&self) -> GridHeader {
        GridHeader {
            south_lat: to_fixed_point(self.start_lat, DEFAULT_MULTIPLIER) as f32,
            north_lat: to_fixed_point(self.end_lat, DEFAULT_MULTIPLIER) as f32,
            west_lon: to_fixed_point(self.start_lon, DEFAULT_MULTIPLIER) as f32,
            east_lon: to_fixed_point(self.end_lon, DEFAULT_MULTIPLIER) as f32,
            lat_step: to_fixed_point(self.lat_step, DEFAULT_MULTIPLIER) as f32,
            lon_step: to_fixed_point(self.lon_step, DEFAULT_MULTIPLIER) as f32,
            multiplier: DEFAULT_MULTIPLIER as f32,
            no_data: NO_DATA,
        }
    }
}

/// Infer the grid's origin, closing corner, and step sizes from row order.
///
/// Scans from the start until the first value and a non-zero step have been
/// observed along both axes (`step = first - second distinct value`), then
/// takes the closing corner from the last row of the final ten rows.
pub fn infer_geometry<R: GridRow>(
    rows: &[R],
    offset_hours: u32,
) -> Result<GridGeometry, GeometryError> {
    let (lat_pos, lon_pos) = coordinate_positions(offset_hours);

    let mut start_lat = None;
    let mut start_lon = None;
    let mut lat_step = None;
    let mut lon_step = None;

    for (index, row) in rows.iter().enumerate() {
        let lat = coord_at(row, index, lat_pos)?;
        let lon = coord_at(row, index, lon_pos)?;

        observe_axis(&mut start_lat, &mut lat_step, lat);
        observe_axis(&mut start_lon, &mut lon_step, lon);

        if lat_step.is_some() && lon_step.is_some() {
            break;
        }
    }

    let (Some(start_lat), Some(start_lon), Some(lat_step), Some(lon_step)) =
        (start_lat, start_lon, lat_step, lon_step)
    else {
        return Err(GeometryError::Exhausted);
    };

    let tail_start = rows.len().saturating_sub(TAIL_WINDOW);
    let mut end_lat = None;
    let mut end_lon = None;
    for (index, row) in rows.iter().enumerate().skip(tail_start) {
        end_lat = Some(coord_at(row, index, lat_pos)?);
        end_lon = Some(coord_at(row, index, lon_pos)?);
    }

    let (Some(end_lat), Some(end_lon)) = (end_lat, end_lon) else {
        return Err(GeometryError::Exhausted);
    };

    Ok(GridGeometry {
        start_lat,
        end_lat,
        start_lon,
        end_lon,
        lat_step,
        lon_step,
    })
}

fn coord_at<R: GridRow>(row: &R, index: usize, position: usize) -> Result<f64, GeometryError> {
    row.coord(position).ok_or(GeometryError::MissingCoordinate {
        row: index,
        position,
    })
}

/// Record the first value seen on an axis, then the step once a distinct
/// second value shows up.
fn observe_axis(start: &mut Option<f64>, step: &mut Option<f64>, value: f64) {
    match *start {
        None => *start = Some(value),
        Some(first) if step.is_none() && value != first => *step = Some(first - value),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::TabularRow;
    use std::collections::HashMap;

    fn row(coords: &[f64]) -> TabularRow {
        TabularRow {
            coords: coords.to_vec(),
            fields: HashMap::new(),
            valid_time: "2023-07-06 12:00:00".to_string(),
        }
    }

    /// 2x3 grid scanning north to south, west to east, with a leading time
    /// column.
    fn regular_rows() -> Vec<TabularRow> {
        let mut rows = Vec::new();
        for lat in [50.0, 49.75] {
            for lon in [6.0, 6.25, 6.5] {
                rows.push(row(&[0.0, lat, lon]));
            }
        }
        rows
    }

    #[test]
    fn test_infer_regular_grid() {
        let geometry = infer_geometry(&regular_rows(), 0).unwrap();

        assert_eq!(geometry.start_lat, 50.0);
        assert_eq!(geometry.start_lon, 6.0);
        assert_eq!(geometry.lat_step, 0.25);
        assert_eq!(geometry.lon_step, -0.25);
        assert_eq!(geometry.end_lat, 49.75);
        assert_eq!(geometry.end_lon, 6.5);
    }

    #[test]
    fn test_offset_48_shifts_positions() {
        assert_eq!(coordinate_positions(48), (0, 1));
        assert_eq!(coordinate_positions(0), (1, 2));
        assert_eq!(coordinate_positions(47), (1, 2));
        assert_eq!(coordinate_positions(49), (1, 2));
    }

    #[test]
    fn test_infer_with_shifted_columns() {
        // Same grid, but the 48 h layout has no leading time column.
        let mut rows = Vec::new();
        for lat in [50.0, 49.75] {
            for lon in [6.0, 6.25, 6.5] {
                rows.push(row(&[lat, lon]));
            }
        }

        let geometry = infer_geometry(&rows, 48).unwrap();
        assert_eq!(geometry.start_lat, 50.0);
        assert_eq!(geometry.end_lon, 6.5);
    }

    #[test]
    fn test_constant_axis_exhausts() {
        // Longitude never changes, so no lon step can be established.
        let rows: Vec<TabularRow> = (0..5).map(|i| row(&[0.0, 50.0 - i as f64, 6.0])).collect();
        assert_eq!(infer_geometry(&rows, 0), Err(GeometryError::Exhausted));
    }

    #[test]
    fn test_empty_rows_exhaust() {
        let rows: Vec<TabularRow> = Vec::new();
        assert_eq!(infer_geometry(&rows, 0), Err(GeometryError::Exhausted));
    }

    #[test]
    fn test_short_coordinate_tuple_reported() {
        let rows = vec![row(&[0.0, 50.0])];
        assert_eq!(
            infer_geometry(&rows, 0),
            Err(GeometryError::MissingCoordinate {
                row: 0,
                position: 2
            })
        );
    }

    #[test]
    fn test_closing_corner_is_last_row_of_tail() {
        let mut rows = regular_rows();
        rows.push(row(&[0.0, 49.5, 6.75]));

        let geometry = infer_geometry(&rows, 0).unwrap();
        assert_eq!(geometry.end_lat, 49.5);
        assert_eq!(geometry.end_lon, 6.75);
    }

    #[test]
    fn test_header_encoding_scales_geometry() {
        let geometry = infer_geometry(&regular_rows(), 0).unwrap();
        let header = geometry.to_header();

        assert_eq!(header.south_lat, 50_000_000.0);
        assert_eq!(header.north_lat, 49_750_000.0);
        assert_eq!(header.west_lon, 6_000_000.0);
        assert_eq!(header.east_lon, 6_500_000.0);
        assert_eq!(header.lat_step, 250_000.0);
        assert_eq!(header.lon_step, -250_000.0);
        assert_eq!(header.multiplier, 1_000_000.0);
        assert_eq!(header.no_data, NO_DATA);
    }
}
