//! Series derived from more than one stored variable.
//!
//! Cumulative snowfall is built from accumulated precipitation (`apcp`) and
//! categorical snow (`csnow`). A negative step in `apcp` is read as an
//! upstream accumulation counter reset, so the new value itself is the
//! increment. That reading is a policy choice for bucket resets, not a
//! physical rule; revisit it if a model publishes genuinely decreasing
//! accumulations.

use serde::Serialize;

use crate::error::StorageResult;
use crate::layout::TileKey;
use crate::tile_store::TileRepository;
use tile_engine::Stat;

/// Default snow-to-liquid ratio.
pub const DEFAULT_SNOW_RATIO: f32 = 10.0;

/// `csnow` value at or above which a step counts as snow.
pub const SNOW_CATEGORY_THRESHOLD: f32 = 0.5;

pub const PRECIP_VARIABLE: &str = "apcp";
pub const SNOW_CATEGORY_VARIABLE: &str = "csnow";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnowfallSeries {
    pub hours: Vec<u32>,
    /// Snow depth added at each hour.
    pub increments: Vec<f32>,
    pub cumulative: Vec<f32>,
    pub ratio: f32,
}

/// Per-step snowfall and running total from aligned `apcp`/`csnow` series.
///
/// Steps where either input is non-finite add nothing and do not move the
/// accumulation baseline.
pub fn accumulate_snowfall(apcp: &[f32], csnow: &[f32], ratio: f32) -> (Vec<f32>, Vec<f32>) {
    let mut increments = Vec::with_capacity(apcp.len());
    let mut cumulative = Vec::with_capacity(apcp.len());
    let mut previous = 0.0f32;
    let mut total = 0.0f32;

    for (&precip, &snow) in apcp.iter().zip(csnow.iter()) {
        let mut increment = 0.0;
        if precip.is_finite() && snow.is_finite() {
            let diff = precip - previous;
            let liquid = if diff < 0.0 { precip } else { diff };
            if snow >= SNOW_CATEGORY_THRESHOLD {
                increment = liquid * ratio;
            }
            previous = precip;
        }
        total += increment;
        increments.push(increment);
        cumulative.push(total);
    }

    (increments, cumulative)
}

/// Snowfall at a point for the run identified by `run_key` (its variable is
/// ignored). Only hours present in both inputs are used. `ratio` defaults to
/// [`DEFAULT_SNOW_RATIO`].
pub fn snowfall_for_point<R: TileRepository + ?Sized>(
    repo: &R,
    run_key: &TileKey,
    lat: f64,
    lon: f64,
    ratio: Option<f32>,
) -> StorageResult<SnowfallSeries> {
    let ratio = ratio.unwrap_or(DEFAULT_SNOW_RATIO);
    let apcp = repo.load_timeseries_for_point(&run_key.with_variable(PRECIP_VARIABLE), lat, lon, Stat::Mean)?;
    let csnow = repo.load_timeseries_for_point(&run_key.with_variable(SNOW_CATEGORY_VARIABLE), lat, lon, Stat::Mean)?;

    let mut hours = Vec::new();
    let mut precip = Vec::new();
    let mut snow = Vec::new();
    for (i, hour) in apcp.hours.iter().enumerate() {
        if let Some(j) = csnow.hours.iter().position(|h| h == hour) {
            hours.push(*hour);
            precip.push(apcp.values[i]);
            snow.push(csnow.values[j]);
        }
    }

    let (increments, cumulative) = accumulate_snowfall(&precip, &snow, ratio);
    Ok(SnowfallSeries {
        hours,
        increments,
        cumulative,
        ratio,
    })
}
