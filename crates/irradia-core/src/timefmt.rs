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

//! Timestamp codec for the three encodings the pipeline deals with:
//! the DWD kml form (`2018-12-25T07:00:00.000Z`, UTC), epoch seconds
//! (the sink join key) and the Apache listing-row form (`25-Dec-2018 07:00`).

use chrono::{DateTime, NaiveDateTime, ParseError, Utc};

const DWD_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
const DB_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const LISTING_FORMAT: &str = "%d-%b-%Y %H:%M";

/// Parse a kml timestep value. All MOSMIX timestamps are UTC.
pub fn parse_dwd(value: &str) -> Result<DateTime<Utc>, ParseError> {
    NaiveDateTime::parse_from_str(value.trim(), DWD_FORMAT).map(|naive| naive.and_utc())
}

pub fn format_dwd(instant: DateTime<Utc>) -> String {
    instant.format(DWD_FORMAT).to_string()
}

/// The `T`/`Z`-free form stored in the sink's `forecast_time` column;
/// some database drivers choke on the ISO form during commits.
pub fn format_db(instant: DateTime<Utc>) -> String {
    instant.format(DB_FORMAT).to_string()
}

/// Parse the date and time tokens of an Apache autoindex row. The mirror
/// reports these in UTC.
pub fn parse_listing(date: &str, time: &str) -> Result<DateTime<Utc>, ParseError> {
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), LISTING_FORMAT)
        .map(|naive| naive.and_utc())
}

pub fn to_epoch(instant: DateTime<Utc>) -> i64 {
    instant.timestamp()
}

pub fn from_epoch(epoch: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(epoch, 0)
}
