// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Irradia.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Weather frame construction
//!
//! Aligns the parsed station series into one named-column table indexed
//! by instant, applies unit conversions and the site calibration offset,
//! and fills the decomposition columns. The index is validated to be
//! strictly increasing at exactly one hour spacing before anything else
//! happens; a file that violates that aborts the cycle instead of
//! silently misaligning rows.

use crate::error::{ForecastError, Result};
use crate::kml::StationSeries;
use crate::pvmodel::PvOutput;
use crate::solar;
use chrono::{DateTime, Datelike, Duration, Utc};
use irradia_types::SiteConfig;

/// kJ/m² per hour to Wh/m².
const KJ_TO_WH: f64 = 0.277778;

/// One poll cycle's aligned output table. Column i across every vector
/// refers to `index[i]`; `epoch_seconds` is the sink join key.
#[derive(Debug, Clone)]
pub struct WeatherFrame {
    pub index: Vec<DateTime<Utc>>,
    pub epoch_seconds: Vec<i64>,
    /// Raw Rad1h as parsed, kJ/m².
    pub irradiance_kj: Vec<f64>,
    pub irradiance_wh: Vec<f64>,
    pub temperature_c: Vec<f64>,
    pub pressure_pa: Vec<f64>,
    pub wind_speed_ms: Vec<f64>,
    /// First-order yield estimate, irradiance_wh times the configured
    /// multiplier. A cheap fallback, not a replacement for the simulator.
    pub simple_yield_wh: Vec<f64>,
    pub dni: Vec<f64>,
    pub dhi: Vec<f64>,
    // Filled by the PV simulator; absent when the simulation failed.
    pub ac_power_w: Option<Vec<f64>>,
    pub dc_power_w: Option<Vec<f64>>,
    pub cell_temperature_c: Option<Vec<f64>>,
}

impl WeatherFrame {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn attach_pv(&mut self, output: PvOutput) {
        self.ac_power_w = Some(output.ac_power_w);
        self.dc_power_w = Some(output.dc_power_w);
        self.cell_temperature_c = Some(output.cell_temperature_c);
    }
}

/// Build the aligned frame. Length and spacing violations are
/// [`ForecastError::IrregularSeries`], never silent truncation.
pub fn build(series: &StationSeries, site: &SiteConfig) -> Result<WeatherFrame> {
    let irregular = |reason: String| ForecastError::IrregularSeries { reason };

    let n = series.timestamps.len();
    if n == 0 {
        return Err(irregular("empty timestep sequence".to_owned()));
    }
    for (name, len) in [
        ("FF", series.wind_speed_ms.len()),
        ("Rad1h", series.irradiance_kj_m2.len()),
        ("TTT", series.temperature_c.len()),
        ("PPPP", series.pressure_pa.len()),
    ] {
        if len != n {
            return Err(irregular(format!(
                "{name} has {len} samples but {n} timesteps"
            )));
        }
    }
    for pair in series.timestamps.windows(2) {
        if pair[1] - pair[0] != Duration::hours(1) {
            return Err(irregular(format!(
                "non-hourly step between {} and {}",
                pair[0], pair[1]
            )));
        }
    }

    let index = series.timestamps.clone();
    let epoch_seconds: Vec<i64> = index.iter().map(|t| t.timestamp()).collect();
    let irradiance_wh: Vec<f64> = series
        .irradiance_kj_m2
        .iter()
        .map(|kj| kj * KJ_TO_WH)
        .collect();
    let temperature_c: Vec<f64> = series
        .temperature_c
        .iter()
        .map(|t| t + site.temperature_offset_c)
        .collect();
    let simple_yield_wh: Vec<f64> = irradiance_wh
        .iter()
        .map(|wh| wh * site.simple_multiplier)
        .collect();

    let site_pressure = solar::pressure_from_altitude(site.altitude_m);
    let mut dni = Vec::with_capacity(n);
    let mut dhi = Vec::with_capacity(n);
    for (i, instant) in index.iter().enumerate() {
        let position = solar::solar_position(*instant, site.latitude, site.longitude);
        let doy = instant.ordinal();
        // Missing PPPP sample: fall back to the site's barometric
        // pressure for the air-mass correction.
        let pressure = if series.pressure_pa[i].is_finite() {
            series.pressure_pa[i]
        } else {
            site_pressure
        };
        dni.push(solar::disc_dni(
            irradiance_wh[i],
            position.zenith_deg,
            doy,
            pressure,
        ));
        dhi.push(solar::erbs_dhi(irradiance_wh[i], position.zenith_deg, doy));
    }

    Ok(WeatherFrame {
        index,
        epoch_seconds,
        irradiance_kj: series.irradiance_kj_m2.clone(),
        irradiance_wh,
        temperature_c,
        pressure_pa: series.pressure_pa.clone(),
        wind_speed_ms: series.wind_speed_ms.clone(),
        simple_yield_wh,
        dni,
        dhi,
        ac_power_w: None,
        dc_power_w: None,
        cell_temperature_c: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn site() -> SiteConfig {
        SiteConfig {
            latitude: 48.1,
            longitude: 11.6,
            altitude_m: 519.0,
            temperature_offset_c: 1.5,
            simple_multiplier: 2.0,
        }
    }

    fn hourly_series(n: usize) -> StationSeries {
        let start = Utc.with_ymd_and_hms(2020, 6, 21, 10, 0, 0).unwrap();
        StationSeries {
            timestamps: (0..n).map(|i| start + Duration::hours(i as i64)).collect(),
            wind_speed_ms: vec![3.0; n],
            irradiance_kj_m2: vec![100.0; n],
            temperature_c: vec![20.0; n],
            pressure_pa: vec![101_300.0; n],
        }
    }

    #[test]
    fn converts_kj_to_wh() {
        let mut series = hourly_series(3);
        series.irradiance_kj_m2 = vec![100.0, 200.0, 0.0];
        let frame = build(&series, &site()).unwrap();
        assert!((frame.irradiance_wh[0] - 27.7778).abs() < 1e-4);
        assert!((frame.irradiance_wh[1] - 55.5556).abs() < 1e-4);
        assert_eq!(frame.irradiance_wh[2], 0.0);
    }

    #[test]
    fn applies_temperature_offset_and_multiplier() {
        let frame = build(&hourly_series(2), &site()).unwrap();
        assert!((frame.temperature_c[0] - 21.5).abs() < 1e-9);
        assert!((frame.simple_yield_wh[0] - 2.0 * frame.irradiance_wh[0]).abs() < 1e-9);
    }

    #[test]
    fn index_spans_first_to_last_hourly() {
        let frame = build(&hourly_series(5), &site()).unwrap();
        let span_hours = (*frame.index.last().unwrap() - frame.index[0]).num_hours();
        assert_eq!(frame.len() as i64, span_hours + 1);
        assert!(frame.index.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(frame.epoch_seconds[1] - frame.epoch_seconds[0], 3600);
    }

    #[test]
    fn length_mismatch_is_irregular() {
        let mut series = hourly_series(3);
        series.pressure_pa.pop();
        let err = build(&series, &site()).unwrap_err();
        assert!(matches!(err, ForecastError::IrregularSeries { .. }));
    }

    #[test]
    fn non_hourly_spacing_is_irregular() {
        let mut series = hourly_series(3);
        series.timestamps[2] = series.timestamps[2] + Duration::minutes(30);
        let err = build(&series, &site()).unwrap_err();
        assert!(matches!(err, ForecastError::IrregularSeries { .. }));
    }

    #[test]
    fn non_monotonic_is_irregular() {
        let mut series = hourly_series(3);
        series.timestamps.swap(1, 2);
        let err = build(&series, &site()).unwrap_err();
        assert!(matches!(err, ForecastError::IrregularSeries { .. }));
    }

    #[test]
    fn night_samples_decompose_to_zero() {
        let start = Utc.with_ymd_and_hms(2020, 6, 21, 0, 0, 0).unwrap();
        let mut series = hourly_series(2);
        series.timestamps = vec![start, start + Duration::hours(1)];
        series.irradiance_kj_m2 = vec![0.0, 0.0];
        let frame = build(&series, &site()).unwrap();
        assert_eq!(frame.dni, vec![0.0, 0.0]);
        assert_eq!(frame.dhi, vec![0.0, 0.0]);
    }
}
