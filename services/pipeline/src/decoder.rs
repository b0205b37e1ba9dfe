//! GRIB decoding backend over the `grib` crate.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;

use grid_extract::geometry::SHIFTED_OFFSET_HOURS;
use grid_extract::{ForecastDecoder, TabularRow, ACCUMULATED_FIELD};
use meteo_common::FileName;

/// Decodes forecast files with the `grib` crate.
///
/// Rows reproduce the upstream tabular column convention: the coordinate
/// tuple leads with a valid-time key, then latitude, then longitude. The
/// final 48 h forecast step omits the leading time column.
pub struct GribFileDecoder;

#[async_trait]
impl ForecastDecoder for GribFileDecoder {
    async fn decode(&self, path: &Path) -> Result<Vec<TabularRow>> {
        let path = path.to_path_buf();
        // GRIB unpacking is CPU-bound; keep it off the async I/O path.
        tokio::task::spawn_blocking(move || decode_blocking(&path))
            .await
            .context("decode task panicked")?
    }
}

fn decode_blocking(path: &Path) -> Result<Vec<TabularRow>> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("forecast path has no UTF-8 file name"))?;
    let meta =
        FileName::parse(file_name).context("forecast file name does not fit the convention")?;

    let valid_time = meta.valid_time().format("%Y-%m-%d %H:%M:%S").to_string();
    let time_key = meta.valid_time().timestamp() as f64;
    let shifted = meta.offset == SHIFTED_OFFSET_HOURS;

    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let grib2 = grib::from_reader(BufReader::new(file))
        .map_err(|e| anyhow!("GRIB parse failed: {e:?}"))?;

    let mut rows = Vec::new();
    for (_index, submessage) in grib2.iter() {
        let latlons = submessage
            .latlons()
            .map_err(|e| anyhow!("lat/lon grid unavailable: {e:?}"))?;
        let decoder = grib::Grib2SubmessageDecoder::from(submessage)
            .map_err(|e| anyhow!("decoder setup failed: {e:?}"))?;
        let values = decoder
            .dispatch()
            .map_err(|e| anyhow!("value decode failed: {e:?}"))?;

        for ((lat, lon), value) in latlons.zip(values) {
            let coords = if shifted {
                vec![f64::from(lat), f64::from(lon)]
            } else {
                vec![time_key, f64::from(lat), f64::from(lon)]
            };

            rows.push(TabularRow {
                coords,
                fields: HashMap::from([(ACCUMULATED_FIELD.to_string(), f64::from(value))]),
                valid_time: valid_time.clone(),
            });
        }
    }

    Ok(rows)
}
