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

//! Irradia - Entry point for the forecast daemon
//!
//! Loads the TOML config, opens the sinks, spawns the poll worker and
//! waits for ctrl-c (or the first processed run with `--once`).

use anyhow::{Context, Result};
use clap::Parser;
use irradia_core::{ArraySimulator, CsvSink, SqliteSink, spawn_worker};
use irradia_types::AppConfig;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "irradia")]
#[command(version)]
#[command(about = "DWD MOSMIX forecast poller and PV yield estimator", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "irradia.toml")]
    config: PathBuf,

    /// Process one fresh forecast run, then exit
    #[arg(long)]
    once: bool,

    /// Dump each processed frame to stdout regardless of the config
    #[arg(long)]
    print: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,irradia=debug")),
        )
        .init();

    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("cannot read config file {}", cli.config.display()))?;
    let mut config: AppConfig =
        toml::from_str(&raw).with_context(|| format!("invalid config {}", cli.config.display()))?;
    if cli.print {
        config.output.print = true;
    }
    config.validate().context("configuration rejected")?;

    info!("Starting Irradia forecast daemon");
    info!("Configuration summary:");
    info!("   Station: {}", config.station.station_id);
    info!("   Listing: {}", config.station.listing_url);
    info!(
        "   Site: lat={} lon={} alt={}m",
        config.site.latitude, config.site.longitude, config.site.altitude_m
    );
    info!(
        "   Array: {} x {} x {}W, tilt={}° azimuth={}°",
        config.array.strings,
        config.array.panels_per_string,
        config.array.module_power_w,
        config.array.surface_tilt_deg,
        config.array.surface_azimuth_deg
    );
    info!(
        "   Poll interval: {}s",
        config.processing.poll_interval_secs
    );
    info!(
        "   Outputs: print={} csv={:?} sqlite={:?}",
        config.output.print, config.output.csv_path, config.output.sqlite_path
    );

    // Sinks open before anything is polled; a broken database path is a
    // startup failure, not a per-cycle one.
    let sqlite = match &config.output.sqlite_path {
        Some(path) => Some(
            SqliteSink::open(path, &config.output.table)
                .with_context(|| format!("cannot open sqlite sink {}", path.display()))?,
        ),
        None => None,
    };
    let csv = config.output.csv_path.clone().map(CsvSink::new);
    let simulator = Box::new(ArraySimulator::new(config.array.clone()));

    let once = cli.once;
    let (handle, mut events, shutdown) = spawn_worker(config, simulator, sqlite, csv)?;

    // The worker announces itself before the first cycle.
    events
        .recv()
        .await
        .context("worker stopped before its first cycle")?;
    info!("Poll worker running");

    if once {
        tokio::select! {
            run = events.recv() => match run {
                Some(published_at) => {
                    info!(%published_at, "forecast run processed, single-shot done");
                }
                None => warn!("worker stopped before processing a forecast run"),
            },
            _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        }
    } else {
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("ctrl-c received, shutting down");
                    break;
                }
                run = events.recv() => match run {
                    Some(published_at) => {
                        // Keep only the most recent when several queued up.
                        let mut latest = published_at;
                        while let Ok(next) = events.try_recv() {
                            latest = next;
                        }
                        info!(published_at = %latest, "forecast run processed");
                    }
                    None => {
                        warn!("worker event channel closed");
                        break;
                    }
                },
            }
        }
    }

    let _ = shutdown.send(true);
    handle.await.context("poll worker panicked")?;
    info!("Shutdown complete");
    Ok(())
}
