//! The wgf4 binary grid format.
//!
//! A wgf4 file is exactly eight little-endian `f32` header fields followed by
//! `N` little-endian `f32` grid values in decoder row order. There is no magic
//! number and no element count; consumers derive `N` from the file size minus
//! the fixed 32-byte header.

use meteo_common::substitute_missing;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of the fixed wgf4 header in bytes.
pub const HEADER_SIZE: usize = 32;

/// Errors produced when reading a wgf4 payload back.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Wgf4Error {
    #[error("payload too short: expected at least {HEADER_SIZE} bytes, got {0}")]
    TooShort(usize),

    #[error("value section length {0} is not a multiple of 4")]
    Misaligned(usize),
}

/// The eight-field wgf4 header.
///
/// Geometry fields carry fixed-point-scaled degrees (rounded to 6 decimal
/// digits, multiplied by `multiplier`); `multiplier` and `no_data` are stored
/// raw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridHeader {
    /// Bottom latitude.
    pub south_lat: f32,
    /// Top latitude.
    pub north_lat: f32,
    /// Left longitude.
    pub west_lon: f32,
    /// Right longitude.
    pub east_lon: f32,
    pub lat_step: f32,
    pub lon_step: f32,
    /// Fixed-point scale applied to the geometry fields.
    pub multiplier: f32,
    /// Sentinel marking missing samples in the value section.
    pub no_data: f32,
}

impl GridHeader {
    /// Header fields in wire order.
    fn fields(&self) -> [f32; 8] {
        [
            self.south_lat,
            self.north_lat,
            self.west_lon,
            self.east_lon,
            self.lat_step,
            self.lon_step,
            self.multiplier,
            self.no_data,
        ]
    }

    /// Encode the header as 32 little-endian bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        for (chunk, field) in bytes.chunks_exact_mut(4).zip(self.fields()) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        bytes
    }

    /// Decode a header from the first 32 bytes of a payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Wgf4Error> {
        if bytes.len() < HEADER_SIZE {
            return Err(Wgf4Error::TooShort(bytes.len()));
        }

        let mut fields = [0f32; 8];
        for (field, chunk) in fields.iter_mut().zip(bytes.chunks_exact(4)) {
            *field = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }

        Ok(Self {
            south_lat: fields[0],
            north_lat: fields[1],
            west_lon: fields[2],
            east_lon: fields[3],
            lat_step: fields[4],
            lon_step: fields[5],
            multiplier: fields[6],
            no_data: fields[7],
        })
    }
}

/// Encode a header plus grid values into a wgf4 byte payload.
///
/// Every value passes through [`substitute_missing`] so NaN samples land on
/// the wire as the header's sentinel. Output is deterministic: identical
/// input always yields identical bytes.
pub fn serialize_frame(header: &GridHeader, values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_SIZE + values.len() * 4);
    bytes.extend_from_slice(&header.to_bytes());
    for &value in values {
        bytes.extend_from_slice(&substitute_missing(value).to_le_bytes());
    }
    bytes
}

/// Decode a wgf4 payload back into its header and value sequence.
pub fn deserialize_frame(bytes: &[u8]) -> Result<(GridHeader, Vec<f32>), Wgf4Error> {
    let header = GridHeader::from_bytes(bytes)?;

    let value_bytes = &bytes[HEADER_SIZE..];
    if value_bytes.len() % 4 != 0 {
        return Err(Wgf4Error::Misaligned(value_bytes.len()));
    }

    let values = value_bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok((header, values))
}
