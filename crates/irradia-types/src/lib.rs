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

//! Shared configuration types for Irradia.
//!
//! Plain serde-derived data, no I/O. The binary crate owns reading the
//! TOML file; the core pipeline consumes these structs as-is.

pub mod config;

pub use config::{
    AppConfig, ArrayConfig, OutputConfig, ProcessingConfig, SiteConfig, StationConfig,
};
