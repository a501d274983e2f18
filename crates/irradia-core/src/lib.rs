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

//! Irradia core - DWD MOSMIX forecast ingestion and PV yield estimation
//!
//! The pipeline polls the open-data mirror for one station, downloads and
//! unpacks the newest kmz, parses the kml into aligned numeric series,
//! derives irradiance decomposition and simulated PV output, and upserts
//! the rows into the configured sinks. One station per process.

pub mod archive;
pub mod error;
pub mod kml;
pub mod listing;
pub mod poll;
pub mod pvmodel;
pub mod series;
pub mod sink;
pub mod solar;
pub mod timefmt;

pub use error::{ForecastError, Result};
pub use kml::StationSeries;
pub use listing::ForecastListing;
pub use poll::{PollWorker, spawn_worker};
pub use pvmodel::{ArraySimulator, PvOutput, PvSimulator};
pub use series::WeatherFrame;
pub use sink::{CsvSink, SqliteSink};
