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

//! Solar geometry and irradiance decomposition
//!
//! Position: Spencer (1971) declination and equation of time, hour angle
//! from the UTC instant and site longitude. Decomposition of global
//! horizontal irradiance into direct-normal (DISC) and diffuse-horizontal
//! (Erbs) components, with the clamp bounds the pipeline is calibrated
//! for: minimum cosine-zenith 0.9 for the clearness index, maximum zenith
//! 80 degrees, maximum air mass 12. Samples outside the bounds saturate
//! or zero out; they are never errors.

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::f64::consts::PI;

const DEG: f64 = PI / 180.0;

/// Solar constant, W/m².
const SOLAR_CONSTANT: f64 = 1366.1;

/// Standard sea-level pressure, Pa, for air-mass correction.
const STANDARD_PRESSURE_PA: f64 = 101_325.0;

/// Clearness-index floor on cos(zenith).
const MIN_COS_ZENITH: f64 = 0.9;

/// Beyond this zenith the decomposition saturates (all diffuse, no beam).
const MAX_ZENITH_DEG: f64 = 80.0;

const MAX_AIRMASS: f64 = 12.0;

#[derive(Debug, Clone, Copy)]
pub struct SolarPosition {
    /// Angle from vertical, degrees. >= 90 means the sun is down.
    pub zenith_deg: f64,
    /// Degrees clockwise from north.
    pub azimuth_deg: f64,
}

/// Spencer day-angle series for declination (degrees).
fn declination_deg(day_of_year: f64) -> f64 {
    let b = 2.0 * PI * (day_of_year - 1.0) / 365.0;
    (180.0 / PI)
        * (0.006918 - 0.399912 * b.cos() + 0.070257 * b.sin()
            - 0.006758 * (2.0 * b).cos()
            + 0.000907 * (2.0 * b).sin()
            - 0.002697 * (3.0 * b).cos()
            + 0.00148 * (3.0 * b).sin())
}

/// Equation of time, minutes (Spencer 1971).
fn equation_of_time_min(day_of_year: f64) -> f64 {
    let b = 2.0 * PI * (day_of_year - 1.0) / 365.0;
    229.18
        * (0.000075 + 0.001868 * b.cos()
            - 0.032077 * b.sin()
            - 0.014615 * (2.0 * b).cos()
            - 0.04089 * (2.0 * b).sin())
}

/// Sun position for a UTC instant at the given site.
pub fn solar_position(instant: DateTime<Utc>, latitude_deg: f64, longitude_deg: f64) -> SolarPosition {
    let doy = f64::from(instant.ordinal());
    let ut_h = f64::from(instant.hour())
        + f64::from(instant.minute()) / 60.0
        + f64::from(instant.second()) / 3600.0;

    let decl = declination_deg(doy) * DEG;
    let eot_min = equation_of_time_min(doy);

    // Local solar time straight from UTC and longitude; no zone juggling.
    let solar_time_h = ut_h + longitude_deg / 15.0 + eot_min / 60.0;
    let hour_angle = 15.0 * (solar_time_h - 12.0) * DEG;

    let lat = latitude_deg * DEG;
    let cos_zenith = lat.sin() * decl.sin() + lat.cos() * decl.cos() * hour_angle.cos();
    let zenith = cos_zenith.clamp(-1.0, 1.0).acos();

    let elevation = PI / 2.0 - zenith;
    let cos_azimuth = if elevation.cos().abs() > 1e-9 {
        (decl.sin() - elevation.sin() * lat.sin()) / (elevation.cos() * lat.cos())
    } else {
        0.0
    };
    let azimuth_from_north = cos_azimuth.clamp(-1.0, 1.0).acos() / DEG;
    let azimuth_deg = if hour_angle > 0.0 {
        360.0 - azimuth_from_north
    } else {
        azimuth_from_north
    };

    SolarPosition {
        zenith_deg: zenith / DEG,
        azimuth_deg,
    }
}

/// Extraterrestrial normal irradiance with eccentricity correction, W/m².
fn extraterrestrial(day_of_year: f64) -> f64 {
    SOLAR_CONSTANT * (1.0 + 0.033 * (2.0 * PI * day_of_year / 365.0).cos())
}

/// Barometric pressure at altitude, Pa. Fallback for missing PPPP
/// samples.
pub fn pressure_from_altitude(altitude_m: f64) -> f64 {
    if !altitude_m.is_finite() {
        return STANDARD_PRESSURE_PA;
    }
    STANDARD_PRESSURE_PA * (1.0 - 2.25577e-5 * altitude_m).powf(5.25588)
}

/// Kasten (1966) relative air mass, pressure-corrected and clamped.
fn airmass(zenith_deg: f64, pressure_pa: f64) -> f64 {
    let cos_z = (zenith_deg * DEG).cos();
    let relative = 1.0 / (cos_z + 0.15 * (93.885 - zenith_deg).powf(-1.253));
    let pressure = if pressure_pa.is_finite() && pressure_pa > 0.0 {
        pressure_pa
    } else {
        STANDARD_PRESSURE_PA
    };
    (relative * pressure / STANDARD_PRESSURE_PA).clamp(1.0, MAX_AIRMASS)
}

/// Clearness index kt with the cos-zenith floor.
fn clearness_index(ghi: f64, zenith_deg: f64, day_of_year: f64) -> f64 {
    let cos_z = (zenith_deg * DEG).cos().max(MIN_COS_ZENITH);
    (ghi / (extraterrestrial(day_of_year) * cos_z)).clamp(0.0, 2.0)
}

/// DISC direct-normal irradiance from GHI, W/m².
///
/// Maxwell's piecewise clear-sky fraction model. Night, sub-horizon and
/// non-finite samples produce 0.0, not an error.
pub fn disc_dni(ghi: f64, zenith_deg: f64, day_of_year: u32, pressure_pa: f64) -> f64 {
    if !ghi.is_finite() || ghi <= 0.0 || !zenith_deg.is_finite() || zenith_deg >= MAX_ZENITH_DEG {
        return 0.0;
    }

    let doy = f64::from(day_of_year);
    let kt = clearness_index(ghi, zenith_deg, doy);
    let am = airmass(zenith_deg, pressure_pa);

    let (a, b, c) = if kt <= 0.6 {
        (
            0.512 - 1.56 * kt + 2.286 * kt.powi(2) - 2.222 * kt.powi(3),
            0.37 + 0.962 * kt,
            -0.28 + 0.932 * kt - 2.048 * kt.powi(2),
        )
    } else {
        (
            -5.743 + 21.77 * kt - 27.49 * kt.powi(2) + 11.56 * kt.powi(3),
            41.4 - 118.5 * kt + 66.05 * kt.powi(2) + 31.9 * kt.powi(3),
            -47.01 + 184.2 * kt - 222.0 * kt.powi(2) + 73.81 * kt.powi(3),
        )
    };

    let kn_clear = 0.866 - 0.122 * am + 0.0121 * am.powi(2) - 0.000653 * am.powi(3)
        + 1.4e-5 * am.powi(4);
    let kn = kn_clear - (a + b * (c * am).exp());

    (extraterrestrial(doy) * kn).max(0.0)
}

/// Erbs diffuse-horizontal irradiance from GHI, W/m².
///
/// Past the zenith bound the sky is treated as fully diffuse (dhi = ghi).
pub fn erbs_dhi(ghi: f64, zenith_deg: f64, day_of_year: u32) -> f64 {
    if !ghi.is_finite() || ghi <= 0.0 {
        return 0.0;
    }
    if !zenith_deg.is_finite() || zenith_deg >= MAX_ZENITH_DEG {
        return ghi;
    }

    let kt = clearness_index(ghi, zenith_deg, f64::from(day_of_year));
    let diffuse_fraction = if kt <= 0.22 {
        1.0 - 0.09 * kt
    } else if kt <= 0.8 {
        0.9511 - 0.1604 * kt + 4.388 * kt.powi(2) - 16.638 * kt.powi(3) + 12.336 * kt.powi(4)
    } else {
        0.165
    };

    (diffuse_fraction.clamp(0.0, 1.0) * ghi).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // Munich-ish site used throughout.
    const LAT: f64 = 48.1;
    const LON: f64 = 11.6;

    #[test]
    fn summer_noon_sun_is_high() {
        let noon = Utc.with_ymd_and_hms(2020, 6, 21, 11, 15, 0).unwrap();
        let pos = solar_position(noon, LAT, LON);
        assert!(pos.zenith_deg < 30.0, "zenith {} too large", pos.zenith_deg);
        assert!(pos.azimuth_deg > 90.0 && pos.azimuth_deg < 270.0);
    }

    #[test]
    fn midnight_sun_is_down() {
        let midnight = Utc.with_ymd_and_hms(2020, 6, 21, 23, 0, 0).unwrap();
        let pos = solar_position(midnight, LAT, LON);
        assert!(pos.zenith_deg > 90.0);
    }

    #[test]
    fn winter_noon_lower_than_summer_noon() {
        let summer = solar_position(Utc.with_ymd_and_hms(2020, 6, 21, 11, 15, 0).unwrap(), LAT, LON);
        let winter = solar_position(Utc.with_ymd_and_hms(2020, 12, 21, 11, 15, 0).unwrap(), LAT, LON);
        assert!(winter.zenith_deg > summer.zenith_deg + 40.0);
    }

    #[test]
    fn disc_zeroes_night_and_bad_samples() {
        assert_eq!(disc_dni(0.0, 30.0, 172, 101_325.0), 0.0);
        assert_eq!(disc_dni(-5.0, 30.0, 172, 101_325.0), 0.0);
        assert_eq!(disc_dni(f64::NAN, 30.0, 172, 101_325.0), 0.0);
        // Past the zenith clamp the beam component is dropped entirely.
        assert_eq!(disc_dni(120.0, 85.0, 172, 101_325.0), 0.0);
    }

    #[test]
    fn disc_clear_sky_sample_is_plausible() {
        // Strong mid-day summer irradiance: beam should dominate.
        let dni = disc_dni(800.0, 25.0, 172, 101_325.0);
        assert!(dni > 300.0 && dni < 1100.0, "dni = {dni}");
    }

    #[test]
    fn erbs_fraction_within_bounds() {
        for ghi in [50.0, 200.0, 500.0, 900.0] {
            let dhi = erbs_dhi(ghi, 40.0, 172);
            assert!(dhi >= 0.0 && dhi <= ghi, "ghi {ghi} -> dhi {dhi}");
        }
    }

    #[test]
    fn erbs_overcast_is_mostly_diffuse() {
        // Tiny kt: almost everything stays diffuse.
        let ghi = 30.0;
        let dhi = erbs_dhi(ghi, 40.0, 355);
        assert!(dhi > 0.9 * ghi);
    }

    #[test]
    fn erbs_saturates_past_zenith_bound() {
        assert_eq!(erbs_dhi(100.0, 85.0, 172), 100.0);
        assert_eq!(erbs_dhi(f64::NAN, 85.0, 172), 0.0);
    }

    #[test]
    fn altitude_pressure_decreases_with_height() {
        let sea = pressure_from_altitude(0.0);
        let munich = pressure_from_altitude(519.0);
        assert!((sea - STANDARD_PRESSURE_PA).abs() < 1e-6);
        assert!(munich < sea && munich > 90_000.0);
    }

    #[test]
    fn airmass_clamps_to_bound() {
        assert!(airmass(0.0, STANDARD_PRESSURE_PA) >= 1.0);
        assert_eq!(airmass(89.9, STANDARD_PRESSURE_PA), MAX_AIRMASS);
    }
}
