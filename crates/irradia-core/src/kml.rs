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

//! MOSMIX kml parser
//!
//! Pulls four mosmix elements out of the forecast document for one
//! station placemark:
//!
//! - `FF`    wind speed, m/s
//! - `Rad1h` global irradiance, kJ/m² per hour
//! - `TTT`   temperature 2 m above ground, Kelvin in the file
//! - `PPPP`  surface pressure (reduced), Pa
//!
//! Timesteps appear under the product-definition block in document order,
//! which is the canonical time order; no sorting happens here. The
//! element name sits in a namespaced `elementName` attribute on each
//! `dwd:Forecast` node and is read through the attribute API rather than
//! string-splitting the raw attribute map.

use crate::error::{ForecastError, Result};
use crate::timefmt;
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::path::Path;

/// Kelvin offset for the TTT conversion. The physically correct value;
/// upstream MOSMIX tooling has shipped 273.13 in places.
const KELVIN_OFFSET: f64 = 273.15;

/// Aligned per-timestep series for one station, one parse pass.
/// Index i refers to the same forecast instant across all five sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub wind_speed_ms: Vec<f64>,
    pub irradiance_kj_m2: Vec<f64>,
    /// Converted from Kelvin at parse time.
    pub temperature_c: Vec<f64>,
    pub pressure_pa: Vec<f64>,
}

/// Read the kml file at `path` and parse it for `station_id`.
pub fn parse_file(path: &Path, station_id: &str) -> Result<StationSeries> {
    let xml = std::fs::read_to_string(path)?;
    parse_station_forecast(&xml, station_id, &path.display().to_string())
}

/// Parse a forecast document for the exact placemark name `station_id`.
/// Case-sensitive, no nearest-station fallback.
pub fn parse_station_forecast(
    xml: &str,
    station_id: &str,
    origin: &str,
) -> Result<StationSeries> {
    let parse_err = |reason: String| ForecastError::Parse {
        origin: origin.to_owned(),
        reason,
    };

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut timestamps: Vec<DateTime<Utc>> = Vec::new();
    let mut wind_speed: Option<Vec<f64>> = None;
    let mut irradiance: Option<Vec<f64>> = None;
    let mut temperature: Option<Vec<f64>> = None;
    let mut pressure: Option<Vec<f64>> = None;

    let mut in_placemark = false;
    let mut station_matches = false;
    let mut found_station = false;
    let mut current_element: Option<MosmixElement> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| parse_err(format!("malformed xml: {e}")))?;
        match event {
            Event::Start(ref start) => match start.local_name().as_ref() {
                b"TimeStep" => {
                    let text = reader
                        .read_text(start.name())
                        .map_err(|e| parse_err(format!("unreadable timestep: {e}")))?;
                    let instant = timefmt::parse_dwd(&text)
                        .map_err(|e| parse_err(format!("bad timestep '{text}': {e}")))?;
                    timestamps.push(instant);
                }
                b"Placemark" => {
                    in_placemark = true;
                    station_matches = false;
                }
                b"name" if in_placemark => {
                    let text = reader
                        .read_text(start.name())
                        .map_err(|e| parse_err(format!("unreadable placemark name: {e}")))?;
                    if text.as_ref() == station_id {
                        station_matches = true;
                        found_station = true;
                    }
                }
                b"Forecast" if station_matches => {
                    current_element =
                        element_name(start, &reader).and_then(MosmixElement::recognize);
                }
                b"value" if current_element.is_some() => {
                    let text = reader
                        .read_text(start.name())
                        .map_err(|e| parse_err(format!("unreadable value block: {e}")))?;
                    let values = parse_values(&text).map_err(parse_err)?;
                    match current_element.take() {
                        Some(MosmixElement::WindSpeed) => wind_speed = Some(values),
                        Some(MosmixElement::Irradiance) => irradiance = Some(values),
                        Some(MosmixElement::Temperature) => temperature = Some(values),
                        Some(MosmixElement::Pressure) => pressure = Some(values),
                        None => {}
                    }
                }
                _ => {}
            },
            Event::End(ref end) => match end.local_name().as_ref() {
                b"Placemark" => {
                    in_placemark = false;
                    station_matches = false;
                }
                b"Forecast" => current_element = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !found_station {
        return Err(ForecastError::StationNotFound {
            station: station_id.to_owned(),
        });
    }
    if timestamps.is_empty() {
        return Err(parse_err("no forecast timesteps in document".to_owned()));
    }

    let wind_speed_ms = wind_speed.ok_or(ForecastError::MissingElement { element: "FF" })?;
    let irradiance_kj_m2 =
        irradiance.ok_or(ForecastError::MissingElement { element: "Rad1h" })?;
    let temperature_k = temperature.ok_or(ForecastError::MissingElement { element: "TTT" })?;
    let pressure_pa = pressure.ok_or(ForecastError::MissingElement { element: "PPPP" })?;

    let temperature_c = temperature_k.iter().map(|k| k - KELVIN_OFFSET).collect();

    Ok(StationSeries {
        timestamps,
        wind_speed_ms,
        irradiance_kj_m2,
        temperature_c,
        pressure_pa,
    })
}

#[derive(Debug, Clone, Copy)]
enum MosmixElement {
    WindSpeed,
    Irradiance,
    Temperature,
    Pressure,
}

impl MosmixElement {
    fn recognize(name: String) -> Option<Self> {
        match name.as_str() {
            "FF" => Some(Self::WindSpeed),
            "Rad1h" => Some(Self::Irradiance),
            "TTT" => Some(Self::Temperature),
            "PPPP" => Some(Self::Pressure),
            _ => None,
        }
    }
}

/// The semantic name of a forecast node, carried in its namespaced
/// `elementName` attribute.
fn element_name<R>(start: &BytesStart<'_>, reader: &Reader<R>) -> Option<String> {
    for attr in start.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"elementName" {
            return attr
                .decode_and_unescape_value(reader.decoder())
                .ok()
                .map(|v| v.into_owned());
        }
    }
    None
}

/// Whitespace-separated float list. DWD uses `-` for a missing sample;
/// those become NaN and flow through the clamped models downstream.
fn parse_values(text: &str) -> std::result::Result<Vec<f64>, String> {
    text.split_whitespace()
        .map(|token| {
            if token == "-" {
                Ok(f64::NAN)
            } else {
                token
                    .parse::<f64>()
                    .map_err(|e| format!("bad forecast value '{token}': {e}"))
            }
        })
        .collect()
}
