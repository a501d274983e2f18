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

//! Error types for the forecast pipeline
//!
//! Every variant is recoverable: the poll loop logs it and aborts the
//! current cycle, never the process. Only an explicit shutdown request
//! terminates the worker.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("listing fetch failed for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("parse failure in {origin}: {reason}")]
    Parse { origin: String, reason: String },

    #[error("download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("archive error for {path}: {reason}")]
    Archive { path: String, reason: String },

    #[error("station '{station}' not found in forecast document")]
    StationNotFound { station: String },

    #[error("mosmix element '{element}' missing from forecast document")]
    MissingElement { element: &'static str },

    #[error("irregular forecast series: {reason}")]
    IrregularSeries { reason: String },

    #[error("pv simulation failed: {reason}")]
    Simulation { reason: String },

    #[error("sink error: {0}")]
    Sink(#[from] rusqlite::Error),

    #[error("csv output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
