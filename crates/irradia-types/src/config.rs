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

//! Typed configuration for the forecast daemon.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_extension() -> String {
    "kmz".to_owned()
}

fn default_table() -> String {
    "forecast".to_owned()
}

fn default_poll_interval() -> u64 {
    300
}

fn default_listing_settle() -> u64 {
    10
}

fn default_download_settle() -> u64 {
    5
}

fn default_extract_settle() -> u64 {
    5
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./work")
}

fn default_unpack_dir() -> PathBuf {
    PathBuf::from("./kml")
}

fn default_albedo() -> f64 {
    0.2
}

fn default_temperature_coefficient() -> f64 {
    -0.0037
}

fn default_inverter_efficiency() -> f64 {
    0.96
}

fn default_simple_multiplier() -> f64 {
    1.0
}

/// Which DWD MOSMIX station to poll and where its listing lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Station identifier exactly as spelled in the kml placemark name,
    /// e.g. "P755".
    pub station_id: String,

    /// Directory-listing endpoint for the single-station files, e.g.
    /// `https://opendata.dwd.de/weather/local_forecasts/mos/MOSMIX_L/single_stations/P755/kml`
    pub listing_url: String,

    /// Archive extension the listing is filtered by.
    #[serde(default = "default_extension")]
    pub archive_extension: String,
}

/// Geographic location of the plant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude_m: f64,

    /// Calibration constant added to every forecast temperature sample.
    #[serde(default)]
    pub temperature_offset_c: f64,

    /// First-order yield estimate: Wh/m² column times this factor.
    #[serde(default = "default_simple_multiplier")]
    pub simple_multiplier: f64,
}

/// Fixed description of the PV array and inverter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayConfig {
    /// Panel tilt from horizontal, degrees.
    pub surface_tilt_deg: f64,

    /// Panel azimuth, degrees clockwise from north (180 = south).
    pub surface_azimuth_deg: f64,

    /// Informational module/inverter identifiers carried into logs.
    #[serde(default)]
    pub module_name: String,
    #[serde(default)]
    pub inverter_name: String,

    /// Nameplate DC power of one module at STC, watts.
    pub module_power_w: f64,

    /// Relative power change per °C of cell temperature above 25 °C.
    #[serde(default = "default_temperature_coefficient")]
    pub temperature_coefficient_per_c: f64,

    pub panels_per_string: u32,
    pub strings: u32,

    #[serde(default = "default_albedo")]
    pub albedo: f64,

    /// Rated AC output of the inverter, watts. DC is clipped to this.
    pub inverter_ac_rated_w: f64,

    #[serde(default = "default_inverter_efficiency")]
    pub inverter_efficiency: f64,
}

/// Poll cadence and the settle delays that tolerate the mirror's
/// eventual-consistency lag between listing a file and serving it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_listing_settle")]
    pub listing_settle_secs: u64,

    #[serde(default = "default_download_settle")]
    pub download_settle_secs: u64,

    #[serde(default = "default_extract_settle")]
    pub extract_settle_secs: u64,

    /// Where the raw kmz download lands (one fixed file, overwritten).
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Where the extracted kml member is placed.
    #[serde(default = "default_unpack_dir")]
    pub unpack_dir: PathBuf,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            listing_settle_secs: default_listing_settle(),
            download_settle_secs: default_download_settle(),
            extract_settle_secs: default_extract_settle(),
            work_dir: default_work_dir(),
            unpack_dir: default_unpack_dir(),
        }
    }
}

/// Output sink selection. Any combination may be enabled.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Dump the final frame to stdout each cycle.
    #[serde(default)]
    pub print: bool,

    /// Rewrite this CSV file wholesale each cycle.
    #[serde(default)]
    pub csv_path: Option<PathBuf>,

    /// Upsert rows into this SQLite database.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,

    #[serde(default = "default_table")]
    pub table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub station: StationConfig,
    pub site: SiteConfig,
    pub array: ArrayConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.station.station_id.trim().is_empty() {
            anyhow::bail!("station.station_id cannot be empty");
        }
        if self.station.listing_url.trim().is_empty() {
            anyhow::bail!("station.listing_url cannot be empty");
        }
        if !(-90.0..=90.0).contains(&self.site.latitude) {
            anyhow::bail!("site.latitude must be within [-90, 90]");
        }
        if !(-180.0..=180.0).contains(&self.site.longitude) {
            anyhow::bail!("site.longitude must be within [-180, 180]");
        }
        if !(0.0..=90.0).contains(&self.array.surface_tilt_deg) {
            anyhow::bail!("array.surface_tilt_deg must be within [0, 90]");
        }
        if !(0.0..360.0).contains(&self.array.surface_azimuth_deg) {
            anyhow::bail!("array.surface_azimuth_deg must be within [0, 360)");
        }
        if self.array.panels_per_string == 0 || self.array.strings == 0 {
            anyhow::bail!("array.panels_per_string and array.strings must be at least 1");
        }
        if self.array.module_power_w <= 0.0 {
            anyhow::bail!("array.module_power_w must be positive");
        }
        if self.array.inverter_ac_rated_w <= 0.0 {
            anyhow::bail!("array.inverter_ac_rated_w must be positive");
        }
        if !(0.0..=1.0).contains(&self.array.albedo) {
            anyhow::bail!("array.albedo must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.array.inverter_efficiency)
            || self.array.inverter_efficiency == 0.0
        {
            anyhow::bail!("array.inverter_efficiency must be within (0, 1]");
        }
        if self.processing.poll_interval_secs == 0 {
            anyhow::bail!("processing.poll_interval_secs must be at least 1");
        }
        if !self.output.print
            && self.output.csv_path.is_none()
            && self.output.sqlite_path.is_none()
        {
            anyhow::bail!("at least one output (print, csv_path, sqlite_path) must be enabled");
        }
        Ok(())
    }
}
