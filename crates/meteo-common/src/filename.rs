//! Parsing of the open-data mirror's filename convention.
//!
//! Forecast files on the mirror are named with seven underscore-delimited
//! fields, e.g. `icon-d2_germany_regular-lat-lon_single-level_2023070612_048_2d_tot_prec.grib2.bz2`.
//! The seventh field keeps any remaining underscores.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rendering of a valid time used as an output path segment
/// (`day.month.year_hour:minute_unix-timestamp`).
pub const OUTPUT_DATE_FORMAT: &str = "%d.%m.%Y_%H:%M_%s";

/// Rendering of a valid time comparable against decoded row timestamps.
pub const FRAME_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:01";

/// Grid-type field value marking files that carry a regular lat/lon grid.
pub const REGULAR_GRID_TYPE: &str = "regular-lat-lon";

/// Errors produced when a file name does not fit the mirror convention.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedNameError {
    #[error("expected 7 underscore-delimited fields, got {0}")]
    FieldCount(usize),

    #[error("forecast offset is not a non-negative integer: {0}")]
    InvalidOffset(String),

    #[error("date-hour field is not a valid YYYYMMDDHH timestamp: {0}")]
    InvalidDateHour(String),
}

/// Structured metadata parsed from a forecast file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileName {
    pub model_name: String,
    pub country_name: String,
    /// Grid representation; drives the regular-grid filter.
    pub grid_type: String,
    pub level: String,
    /// Model run date and hour, `YYYYMMDDHH`.
    pub date_hour: String,
    /// Forecast offset in hours from the run time.
    pub offset: u32,
    /// Remainder of the name (parameter, extension); format specific.
    pub info: String,
    // Offset as written (may be zero-padded); keeps full_name() exact.
    offset_field: String,
    reference_time: DateTime<Utc>,
}

impl FileName {
    /// Parse a file name into its seven fields.
    pub fn parse(name: &str) -> Result<Self, MalformedNameError> {
        let fields: Vec<&str> = name.splitn(7, '_').collect();
        if fields.len() != 7 {
            return Err(MalformedNameError::FieldCount(fields.len()));
        }

        let offset: u32 = fields[5]
            .parse()
            .map_err(|_| MalformedNameError::InvalidOffset(fields[5].to_string()))?;

        let reference_time = parse_date_hour(fields[4])
            .ok_or_else(|| MalformedNameError::InvalidDateHour(fields[4].to_string()))?;

        Ok(Self {
            model_name: fields[0].to_string(),
            country_name: fields[1].to_string(),
            grid_type: fields[2].to_string(),
            level: fields[3].to_string(),
            date_hour: fields[4].to_string(),
            offset,
            info: fields[6].to_string(),
            offset_field: fields[5].to_string(),
            reference_time: Utc.from_utc_datetime(&reference_time),
        })
    }

    /// Model run time parsed from the `date_hour` field.
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.reference_time
    }

    /// Time the file's data is valid for: run time plus the forecast offset.
    pub fn valid_time(&self) -> DateTime<Utc> {
        self.reference_time + Duration::hours(i64::from(self.offset))
    }

    /// Valid time rendered as an output path segment.
    pub fn output_date(&self) -> String {
        self.valid_time().format(OUTPUT_DATE_FORMAT).to_string()
    }

    /// Upper valid-time bound decoded rows are filtered against.
    pub fn frame_time(&self) -> String {
        self.valid_time().format(FRAME_TIME_FORMAT).to_string()
    }

    /// The original file name, re-joined from the seven fields.
    pub fn full_name(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}_{}",
            self.model_name,
            self.country_name,
            self.grid_type,
            self.level,
            self.date_hour,
            self.offset_field,
            self.info
        )
    }

    /// Whether the file carries a regular lat/lon coordinate grid.
    pub fn is_regular_grid(&self) -> bool {
        self.grid_type == REGULAR_GRID_TYPE
    }
}

/// Parse a `YYYYMMDDHH` run timestamp.
fn parse_date_hour(s: &str) -> Option<NaiveDateTime> {
    if s.len() != 10 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year: i32 = s[0..4].parse().ok()?;
    let month: u32 = s[4..6].parse().ok()?;
    let day: u32 = s[6..8].parse().ok()?;
    let hour: u32 = s[8..10].parse().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const REGULAR: &str =
        "icon-d2_germany_regular-lat-lon_single-level_2023070612_048_2d_tot_prec.grib2";

    #[test]
    fn test_parse_regular_name() {
        let name = FileName::parse(REGULAR).unwrap();

        assert_eq!(name.model_name, "icon-d2");
        assert_eq!(name.country_name, "germany");
        assert_eq!(name.grid_type, "regular-lat-lon");
        assert_eq!(name.level, "single-level");
        assert_eq!(name.date_hour, "2023070612");
        assert_eq!(name.offset, 48);
        assert_eq!(name.info, "2d_tot_prec.grib2");
        assert!(name.is_regular_grid());
    }

    #[test]
    fn test_full_name_roundtrip() {
        let name = FileName::parse(REGULAR).unwrap();
        assert_eq!(name.full_name(), REGULAR);
    }

    #[test]
    fn test_too_few_fields() {
        assert_eq!(
            FileName::parse("icon-d2_germany_regular-lat-lon"),
            Err(MalformedNameError::FieldCount(3))
        );
    }

    #[test]
    fn test_non_numeric_offset() {
        let err = FileName::parse(
            "icon-d2_germany_regular-lat-lon_single-level_2023070612_abc_tot_prec.grib2",
        )
        .unwrap_err();
        assert_eq!(err, MalformedNameError::InvalidOffset("abc".to_string()));
    }

    #[test]
    fn test_bad_date_hour() {
        let err = FileName::parse(
            "icon-d2_germany_regular-lat-lon_single-level_2023079912_000_tot_prec.grib2",
        )
        .unwrap_err();
        assert_eq!(
            err,
            MalformedNameError::InvalidDateHour("2023079912".to_string())
        );
    }

    #[test]
    fn test_valid_time_adds_offset() {
        let name = FileName::parse(REGULAR).unwrap();
        let valid = name.valid_time();

        // 2023-07-06 12:00 + 48h
        assert_eq!(valid.format("%Y-%m-%d").to_string(), "2023-07-08");
        assert_eq!(valid.hour(), 12);
    }

    #[test]
    fn test_output_date_rendering() {
        let name = FileName::parse(REGULAR).unwrap();
        let rendered = name.output_date();

        assert!(rendered.starts_with("08.07.2023_12:00_"));
        assert_eq!(
            rendered,
            format!("08.07.2023_12:00_{}", name.valid_time().timestamp())
        );
    }

    #[test]
    fn test_frame_time_rendering() {
        let name = FileName::parse(REGULAR).unwrap();
        assert_eq!(name.frame_time(), "2023-07-08 12:00:01");
    }

    #[test]
    fn test_is_regular_grid_exact_match() {
        let other =
            "icon-d2_germany_icosahedral_single-level_2023070612_000_2d_tot_prec.grib2";
        assert!(!FileName::parse(other).unwrap().is_regular_grid());

        let empty = "icon-d2_germany__single-level_2023070612_000_2d_tot_prec.grib2";
        assert!(!FileName::parse(empty).unwrap().is_regular_grid());
    }
}
