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

//! PV array simulation
//!
//! The pipeline only depends on the [`PvSimulator`] contract: given the
//! aligned weather frame and the site geometry, produce AC power, DC
//! power and cell temperature series on the same index. The shipped
//! [`ArraySimulator`] is a first-principles chain: isotropic
//! plane-of-array transposition, SAPM-style cell temperature from POA
//! irradiance, air temperature and wind, DC derated by the module
//! temperature coefficient, AC through a flat inverter efficiency with
//! clipping at rated power.

use crate::error::{ForecastError, Result};
use crate::series::WeatherFrame;
use crate::solar;
use irradia_types::{ArrayConfig, SiteConfig};

// SAPM open-rack glass/glass thermal parameters.
const SAPM_A: f64 = -3.47;
const SAPM_B: f64 = -0.0594;
const SAPM_DELTA_T: f64 = 3.0;

/// Per-timestep simulation output, aligned to the frame index.
#[derive(Debug, Clone)]
pub struct PvOutput {
    pub ac_power_w: Vec<f64>,
    pub dc_power_w: Vec<f64>,
    pub cell_temperature_c: Vec<f64>,
}

/// The electrical/thermal model seam. The poll loop treats a failure
/// here as "no PV columns this cycle", never as a cycle abort.
pub trait PvSimulator {
    fn simulate(&self, frame: &WeatherFrame, site: &SiteConfig) -> Result<PvOutput>;
}

#[derive(Debug, Clone)]
pub struct ArraySimulator {
    array: ArrayConfig,
}

impl ArraySimulator {
    pub fn new(array: ArrayConfig) -> Self {
        Self { array }
    }

    /// Plane-of-array irradiance from the decomposed components,
    /// isotropic sky model.
    fn poa_irradiance(&self, ghi: f64, dni: f64, dhi: f64, zenith_deg: f64, azimuth_deg: f64) -> f64 {
        let tilt = self.array.surface_tilt_deg.to_radians();
        let zenith = zenith_deg.to_radians();
        let azimuth_delta = (azimuth_deg - self.array.surface_azimuth_deg).to_radians();

        let cos_aoi = zenith.cos() * tilt.cos() + zenith.sin() * tilt.sin() * azimuth_delta.cos();
        let beam = dni * cos_aoi.max(0.0);
        let sky = dhi * (1.0 + tilt.cos()) / 2.0;
        let ground = ghi * self.array.albedo * (1.0 - tilt.cos()) / 2.0;
        (beam + sky + ground).max(0.0)
    }
}

impl PvSimulator for ArraySimulator {
    fn simulate(&self, frame: &WeatherFrame, site: &SiteConfig) -> Result<PvOutput> {
        if frame.is_empty() {
            return Err(ForecastError::Simulation {
                reason: "empty weather frame".to_owned(),
            });
        }

        let n = frame.len();
        let p_dc0 =
            self.array.module_power_w * f64::from(self.array.panels_per_string * self.array.strings);

        let mut ac_power_w = Vec::with_capacity(n);
        let mut dc_power_w = Vec::with_capacity(n);
        let mut cell_temperature_c = Vec::with_capacity(n);

        for i in 0..n {
            let air_temp = frame.temperature_c[i];
            let wind = frame.wind_speed_ms[i];
            let position = solar::solar_position(frame.index[i], site.latitude, site.longitude);

            let poa = self.poa_irradiance(
                frame.irradiance_wh[i],
                frame.dni[i],
                frame.dhi[i],
                position.zenith_deg,
                position.azimuth_deg,
            );

            // Non-finite forecast samples zero out rather than poisoning
            // the whole cycle.
            if !poa.is_finite() || !air_temp.is_finite() || !wind.is_finite() {
                cell_temperature_c.push(if air_temp.is_finite() { air_temp } else { 0.0 });
                dc_power_w.push(0.0);
                ac_power_w.push(0.0);
                continue;
            }

            let module_temp = poa * (SAPM_A + SAPM_B * wind).exp() + air_temp;
            let cell_temp = module_temp + poa / 1000.0 * SAPM_DELTA_T;

            let dc = (p_dc0
                * (poa / 1000.0)
                * (1.0 + self.array.temperature_coefficient_per_c * (cell_temp - 25.0)))
                .max(0.0);
            let ac = (dc * self.array.inverter_efficiency).min(self.array.inverter_ac_rated_w);

            cell_temperature_c.push(cell_temp);
            dc_power_w.push(dc);
            ac_power_w.push(ac);
        }

        Ok(PvOutput {
            ac_power_w,
            dc_power_w,
            cell_temperature_c,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kml::StationSeries;
    use crate::series;
    use chrono::{Duration, TimeZone, Utc};

    fn site() -> SiteConfig {
        SiteConfig {
            latitude: 48.1,
            longitude: 11.6,
            altitude_m: 519.0,
            temperature_offset_c: 0.0,
            simple_multiplier: 1.0,
        }
    }

    fn array() -> ArrayConfig {
        ArrayConfig {
            surface_tilt_deg: 30.0,
            surface_azimuth_deg: 180.0,
            module_name: String::new(),
            inverter_name: String::new(),
            module_power_w: 335.0,
            temperature_coefficient_per_c: -0.0037,
            panels_per_string: 15,
            strings: 2,
            albedo: 0.2,
            inverter_ac_rated_w: 10_000.0,
            inverter_efficiency: 0.96,
        }
    }

    fn daylight_frame() -> crate::series::WeatherFrame {
        // Midsummer 10:00-13:00 UTC, strong irradiance.
        let start = Utc.with_ymd_and_hms(2020, 6, 21, 10, 0, 0).unwrap();
        let n = 4;
        let series = StationSeries {
            timestamps: (0..n).map(|i| start + Duration::hours(i)).collect(),
            wind_speed_ms: vec![2.0; n as usize],
            irradiance_kj_m2: vec![2800.0; n as usize],
            temperature_c: vec![24.0; n as usize],
            pressure_pa: vec![101_300.0; n as usize],
        };
        series::build(&series, &site()).unwrap()
    }

    #[test]
    fn daylight_produces_power_and_warm_cells() {
        let frame = daylight_frame();
        let output = ArraySimulator::new(array()).simulate(&frame, &site()).unwrap();
        assert_eq!(output.ac_power_w.len(), frame.len());
        for i in 0..frame.len() {
            assert!(output.dc_power_w[i] > 0.0, "no dc power at index {i}");
            assert!(output.ac_power_w[i] <= output.dc_power_w[i]);
            assert!(output.cell_temperature_c[i] > frame.temperature_c[i]);
        }
    }

    #[test]
    fn night_produces_zero_power() {
        let start = Utc.with_ymd_and_hms(2020, 6, 21, 0, 0, 0).unwrap();
        let series = StationSeries {
            timestamps: vec![start, start + Duration::hours(1)],
            wind_speed_ms: vec![2.0, 2.0],
            irradiance_kj_m2: vec![0.0, 0.0],
            temperature_c: vec![12.0, 12.0],
            pressure_pa: vec![101_300.0, 101_300.0],
        };
        let frame = series::build(&series, &site()).unwrap();
        let output = ArraySimulator::new(array()).simulate(&frame, &site()).unwrap();
        assert_eq!(output.ac_power_w, vec![0.0, 0.0]);
        assert_eq!(output.dc_power_w, vec![0.0, 0.0]);
        assert_eq!(output.cell_temperature_c, vec![12.0, 12.0]);
    }

    #[test]
    fn inverter_clips_at_rated_power() {
        let mut oversized = array();
        oversized.inverter_ac_rated_w = 100.0;
        let frame = daylight_frame();
        let output = ArraySimulator::new(oversized).simulate(&frame, &site()).unwrap();
        assert!(output.ac_power_w.iter().all(|ac| *ac <= 100.0));
        assert!(output.ac_power_w.iter().any(|ac| *ac == 100.0));
    }

    #[test]
    fn nan_sample_zeroes_that_row_only() {
        let mut frame = daylight_frame();
        frame.wind_speed_ms[1] = f64::NAN;
        let output = ArraySimulator::new(array()).simulate(&frame, &site()).unwrap();
        assert_eq!(output.ac_power_w[1], 0.0);
        assert!(output.ac_power_w[0] > 0.0);
        assert!(output.ac_power_w[2] > 0.0);
    }

    #[test]
    fn empty_frame_is_simulation_error() {
        let mut frame = daylight_frame();
        frame.index.clear();
        let err = ArraySimulator::new(array()).simulate(&frame, &site()).unwrap_err();
        assert!(matches!(err, ForecastError::Simulation { .. }));
    }
}
