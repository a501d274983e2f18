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

//! Persistence sinks for the simulated forecast frame.
//!
//! SQLite rows are keyed by `epoch_seconds`: re-polling the same
//! forecast run updates rows in place, a newer run overwrites the hours
//! it shares with the previous one and appends the rest. The CSV sink
//! is a plain snapshot, rewritten wholesale each cycle.

use crate::error::{ForecastError, Result};
use crate::series::WeatherFrame;
use crate::timefmt;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const COLUMNS: [&str; 12] = [
    "forecast_time",
    "irradiance_kj",
    "irradiance_wh",
    "temperature_c",
    "pressure_pa",
    "wind_speed_ms",
    "simple_yield_wh",
    "dni",
    "dhi",
    "ac_power_w",
    "dc_power_w",
    "cell_temperature_c",
];

/// SQLite does not represent NaN; store non-finite samples as NULL.
fn real(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn optional_real(column: &Option<Vec<f64>>, i: usize) -> Option<f64> {
    column.as_ref().and_then(|values| real(values[i]))
}

#[derive(Debug)]
pub struct SqliteSink {
    conn: Connection,
    table: String,
}

impl SqliteSink {
    pub fn open(path: &Path, table: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, table)
    }

    fn with_connection(conn: Connection, table: &str) -> Result<Self> {
        if table.is_empty()
            || !table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ForecastError::Parse {
                origin: "sink".to_owned(),
                reason: format!("invalid table name {table:?}"),
            });
        }
        let sink = Self {
            conn,
            table: table.to_owned(),
        };
        sink.ensure_schema()?;
        Ok(sink)
    }

    fn ensure_schema(&self) -> Result<()> {
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY,
                    epoch_seconds INTEGER NOT NULL UNIQUE,
                    forecast_time TEXT NOT NULL,
                    irradiance_kj REAL,
                    irradiance_wh REAL,
                    temperature_c REAL,
                    pressure_pa REAL,
                    wind_speed_ms REAL,
                    simple_yield_wh REAL,
                    dni REAL,
                    dhi REAL,
                    ac_power_w REAL,
                    dc_power_w REAL,
                    cell_temperature_c REAL
                )",
                self.table
            ),
            [],
        )?;
        Ok(())
    }

    /// Write every row of the frame, insert-or-update on
    /// `epoch_seconds`. A failed row is logged and skipped; the rest of
    /// the frame still lands. Returns the number of rows written.
    pub fn upsert_frame(&mut self, frame: &WeatherFrame) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0usize;
        for i in 0..frame.len() {
            match upsert_row(&tx, &self.table, frame, i) {
                Ok(()) => written += 1,
                Err(err) => {
                    warn!(
                        epoch_seconds = frame.epoch_seconds[i],
                        error = %err,
                        "skipping forecast row"
                    );
                }
            }
        }
        tx.commit()?;
        debug!(rows = written, table = %self.table, "forecast frame stored");
        Ok(written)
    }
}

fn upsert_row(
    tx: &rusqlite::Transaction<'_>,
    table: &str,
    frame: &WeatherFrame,
    i: usize,
) -> Result<()> {
    let epoch = frame.epoch_seconds[i];
    let existing: Option<i64> = tx
        .query_row(
            &format!("SELECT id FROM {table} WHERE epoch_seconds = ?1"),
            params![epoch],
            |row| row.get(0),
        )
        .optional()?;

    let values = params![
        timefmt::format_db(frame.index[i]),
        real(frame.irradiance_kj[i]),
        real(frame.irradiance_wh[i]),
        real(frame.temperature_c[i]),
        real(frame.pressure_pa[i]),
        real(frame.wind_speed_ms[i]),
        real(frame.simple_yield_wh[i]),
        real(frame.dni[i]),
        real(frame.dhi[i]),
        optional_real(&frame.ac_power_w, i),
        optional_real(&frame.dc_power_w, i),
        optional_real(&frame.cell_temperature_c, i),
        epoch,
    ];

    if let Some(id) = existing {
        let assignments = COLUMNS
            .iter()
            .enumerate()
            .map(|(n, column)| format!("{column} = ?{}", n + 1))
            .collect::<Vec<_>>()
            .join(", ");
        tx.execute(
            &format!("UPDATE {table} SET {assignments} WHERE epoch_seconds = ?13"),
            values,
        )?;
        debug!(epoch_seconds = epoch, id, "forecast row updated");
    } else {
        tx.execute(
            &format!(
                "INSERT INTO {table} (forecast_time, irradiance_kj, irradiance_wh, temperature_c, \
                 pressure_pa, wind_speed_ms, simple_yield_wh, dni, dhi, ac_power_w, dc_power_w, \
                 cell_temperature_c, epoch_seconds) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            values,
        )?;
    }
    Ok(())
}

#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Rewrite the whole file from this frame. Non-finite and absent
    /// samples become empty fields.
    pub fn write_frame(&self, frame: &WeatherFrame) -> Result<()> {
        let mut writer = csv::Writer::from_path(&self.path)?;
        let mut header = vec!["epoch_seconds"];
        header.extend_from_slice(&COLUMNS);
        writer.write_record(&header)?;

        for i in 0..frame.len() {
            let mut record = Vec::with_capacity(header.len());
            record.push(frame.epoch_seconds[i].to_string());
            record.push(timefmt::format_db(frame.index[i]));
            record.push(field(real(frame.irradiance_kj[i])));
            record.push(field(real(frame.irradiance_wh[i])));
            record.push(field(real(frame.temperature_c[i])));
            record.push(field(real(frame.pressure_pa[i])));
            record.push(field(real(frame.wind_speed_ms[i])));
            record.push(field(real(frame.simple_yield_wh[i])));
            record.push(field(real(frame.dni[i])));
            record.push(field(real(frame.dhi[i])));
            record.push(field(optional_real(&frame.ac_power_w, i)));
            record.push(field(optional_real(&frame.dc_power_w, i)));
            record.push(field(optional_real(&frame.cell_temperature_c, i)));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn field(value: Option<f64>) -> String {
    // Values land in the file exactly as computed, no rounding.
    match value {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

/// Console dump of the frame, one line per forecast hour.
pub fn print_frame(frame: &WeatherFrame) {
    println!(
        "{:<24} {:>10} {:>8} {:>8} {:>8} {:>8} {:>10}",
        "forecast_time", "ghi_wh", "dni", "dhi", "temp_c", "wind", "ac_w"
    );
    for i in 0..frame.len() {
        let ac = frame
            .ac_power_w
            .as_ref()
            .map_or_else(|| "-".to_owned(), |p| format!("{:.1}", p[i]));
        println!(
            "{:<24} {:>10.2} {:>8.1} {:>8.1} {:>8.2} {:>8.1} {:>10}",
            timefmt::format_db(frame.index[i]),
            frame.irradiance_wh[i],
            frame.dni[i],
            frame.dhi[i],
            frame.temperature_c[i],
            frame.wind_speed_ms[i],
            ac,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kml::StationSeries;
    use crate::pvmodel::PvOutput;
    use crate::series;
    use chrono::{Duration, TimeZone, Utc};
    use irradia_types::SiteConfig;

    fn frame(hours: i64, base_kj: f64) -> WeatherFrame {
        let site = SiteConfig {
            latitude: 48.1,
            longitude: 11.6,
            altitude_m: 0.0,
            temperature_offset_c: 0.0,
            simple_multiplier: 1.0,
        };
        let start = Utc.with_ymd_and_hms(2020, 6, 21, 10, 0, 0).unwrap();
        let n = hours as usize;
        let series = StationSeries {
            timestamps: (0..hours).map(|i| start + Duration::hours(i)).collect(),
            wind_speed_ms: vec![3.0; n],
            irradiance_kj_m2: (0..n).map(|i| base_kj + i as f64).collect(),
            temperature_c: vec![18.0; n],
            pressure_pa: vec![101_300.0; n],
        };
        series::build(&series, &site).unwrap()
    }

    fn memory_sink() -> SqliteSink {
        SqliteSink::with_connection(Connection::open_in_memory().unwrap(), "forecast").unwrap()
    }

    fn row_count(sink: &SqliteSink) -> i64 {
        sink.conn
            .query_row("SELECT COUNT(*) FROM forecast", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut sink = memory_sink();
        let frame = frame(4, 1000.0);
        assert_eq!(sink.upsert_frame(&frame).unwrap(), 4);
        assert_eq!(sink.upsert_frame(&frame).unwrap(), 4);
        assert_eq!(row_count(&sink), 4);
    }

    #[test]
    fn newer_run_updates_shared_hours() {
        let mut sink = memory_sink();
        sink.upsert_frame(&frame(4, 1000.0)).unwrap();
        sink.upsert_frame(&frame(4, 2000.0)).unwrap();
        assert_eq!(row_count(&sink), 4);

        let first: f64 = sink
            .conn
            .query_row(
                "SELECT irradiance_kj FROM forecast ORDER BY epoch_seconds LIMIT 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!((first - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn nan_sample_stores_null() {
        let mut sink = memory_sink();
        let mut frame = frame(2, 1000.0);
        frame.temperature_c[0] = f64::NAN;
        sink.upsert_frame(&frame).unwrap();

        let value: Option<f64> = sink
            .conn
            .query_row(
                "SELECT temperature_c FROM forecast ORDER BY epoch_seconds LIMIT 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn pv_columns_round_trip() {
        let mut sink = memory_sink();
        let mut frame = frame(2, 1000.0);
        frame.attach_pv(PvOutput {
            ac_power_w: vec![1234.5, 0.0],
            dc_power_w: vec![1300.0, 0.0],
            cell_temperature_c: vec![31.0, 18.0],
        });
        sink.upsert_frame(&frame).unwrap();

        let ac: f64 = sink
            .conn
            .query_row(
                "SELECT ac_power_w FROM forecast ORDER BY epoch_seconds LIMIT 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!((ac - 1234.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_suspect_table_name() {
        let err =
            SqliteSink::with_connection(Connection::open_in_memory().unwrap(), "forecast; DROP")
                .unwrap_err();
        assert!(matches!(err, ForecastError::Parse { .. }));
    }

    #[test]
    fn csv_snapshot_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.csv");
        let sink = CsvSink::new(path.clone());

        let mut frame = frame(3, 1000.0);
        frame.wind_speed_ms[0] = 2.3456789;
        frame.wind_speed_ms[1] = f64::NAN;
        sink.write_frame(&frame).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(
            reader.headers().unwrap().iter().next().unwrap(),
            "epoch_seconds"
        );
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        // Full precision preserved, NaN wind lands as an empty field.
        assert_eq!(rows[0].get(6).unwrap(), "2.3456789");
        assert_eq!(rows[1].get(6).unwrap(), "");
    }

    #[test]
    fn csv_rewrite_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.csv");
        let sink = CsvSink::new(path.clone());

        sink.write_frame(&frame(5, 1000.0)).unwrap();
        sink.write_frame(&frame(2, 1000.0)).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.records().count(), 2);
    }
}
