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

//! The poll worker
//!
//! One task owns the whole pipeline and a single piece of state: the
//! publish timestamp of the last forecast run it processed. Each tick it
//! re-reads the DWD directory listing; a publish time at or before the
//! last seen one means nothing new on the mirror and the cycle ends
//! without side effects. A fresh run advances the watermark immediately,
//! so a cycle that fails mid-pipeline is not retried against the same
//! run on the very next tick; the mirror publishes again within hours.
//!
//! Any stage error aborts the cycle with a log line and the worker keeps
//! running. Shutdown is a `watch` flag, observed between stages and
//! inside every settle sleep.

use crate::archive::{self, ArchiveFetcher};
use crate::error::Result;
use crate::kml;
use crate::listing::ListingClient;
use crate::pvmodel::PvSimulator;
use crate::series::{self, WeatherFrame};
use crate::sink::{self, CsvSink, SqliteSink};
use chrono::{DateTime, Utc};
use irradia_types::AppConfig;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// A fresh run is strictly newer than the watermark. First cycle after
/// startup always processes.
pub fn is_fresh(published_at: DateTime<Utc>, last_seen: Option<DateTime<Utc>>) -> bool {
    last_seen.is_none_or(|seen| published_at > seen)
}

enum CycleOutcome {
    /// A fresh run went all the way through the pipeline.
    Processed(DateTime<Utc>),
    /// Nothing new on the mirror.
    Stale,
    /// Shutdown observed mid-cycle.
    Interrupted,
}

pub struct PollWorker {
    config: AppConfig,
    listing: ListingClient,
    fetcher: ArchiveFetcher,
    simulator: Box<dyn PvSimulator + Send>,
    sqlite: Option<SqliteSink>,
    csv: Option<CsvSink>,
    events: mpsc::UnboundedSender<DateTime<Utc>>,
    last_seen_published: Option<DateTime<Utc>>,
}

impl PollWorker {
    pub fn new(
        config: AppConfig,
        simulator: Box<dyn PvSimulator + Send>,
        sqlite: Option<SqliteSink>,
        csv: Option<CsvSink>,
        events: mpsc::UnboundedSender<DateTime<Utc>>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            listing: ListingClient::new()?,
            fetcher: ArchiveFetcher::new()?,
            simulator,
            sqlite,
            csv,
            events,
            last_seen_published: None,
        })
    }

    /// Poll until the shutdown flag flips. The first message on the
    /// event channel is a wake-up marker sent before any cycle runs;
    /// every later message is the publish time of a processed run.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let _ = self.events.send(Utc::now());
        info!(
            station = %self.config.station.station_id,
            interval_secs = self.config.processing.poll_interval_secs,
            "poll worker started"
        );

        let mut ticker = tokio::time::interval(Duration::from_secs(
            self.config.processing.poll_interval_secs,
        ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The cycle gets its own receiver for the settle sleeps so the
        // select below keeps the original.
        let mut cycle_shutdown = shutdown.clone();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("shutdown requested, stopping poll worker");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match self.run_cycle(&mut cycle_shutdown).await {
                        Ok(CycleOutcome::Processed(published_at)) => {
                            let _ = self.events.send(published_at);
                        }
                        Ok(CycleOutcome::Stale) => {}
                        Ok(CycleOutcome::Interrupted) => {
                            info!("shutdown requested, stopping poll worker");
                            break;
                        }
                        Err(err) => error!(error = %err, "forecast cycle aborted"),
                    }
                }
            }
        }
    }

    async fn run_cycle(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<CycleOutcome> {
        let station = &self.config.station;
        let processing = &self.config.processing;

        let listing = self
            .listing
            .fetch_latest(&station.listing_url, &station.archive_extension)
            .await?;

        if !is_fresh(listing.published_at, self.last_seen_published) {
            debug!(published_at = %listing.published_at, "forecast run already processed");
            return Ok(CycleOutcome::Stale);
        }

        info!(
            published_at = %listing.published_at,
            url = listing.newest_url(),
            "new forecast run published"
        );
        self.last_seen_published = Some(listing.published_at);

        // The mirror lists a file slightly before it serves it; give
        // every stage transition time to settle.
        if !settle(processing.listing_settle_secs, shutdown).await {
            return Ok(CycleOutcome::Interrupted);
        }
        let archive_path = self
            .fetcher
            .download(listing.newest_url(), &processing.work_dir)
            .await?;

        if !settle(processing.download_settle_secs, shutdown).await {
            return Ok(CycleOutcome::Interrupted);
        }
        let kml_path = archive::unpack(&archive_path, &processing.unpack_dir)?;

        if !settle(processing.extract_settle_secs, shutdown).await {
            return Ok(CycleOutcome::Interrupted);
        }
        let series = kml::parse_file(&kml_path, &station.station_id)?;
        let mut frame = series::build(&series, &self.config.site)?;

        // Weather columns are still worth storing when the array model
        // fails.
        match self.simulator.simulate(&frame, &self.config.site) {
            Ok(output) => frame.attach_pv(output),
            Err(err) => warn!(error = %err, "pv simulation failed, storing weather columns only"),
        }

        self.persist(&frame)?;
        info!(
            rows = frame.len(),
            published_at = %listing.published_at,
            "forecast run processed"
        );
        Ok(CycleOutcome::Processed(listing.published_at))
    }

    fn persist(&mut self, frame: &WeatherFrame) -> Result<()> {
        if let Some(sqlite) = self.sqlite.as_mut() {
            sqlite.upsert_frame(frame)?;
        }
        if let Some(csv) = &self.csv {
            csv.write_frame(frame)?;
        }
        if self.config.output.print {
            sink::print_frame(frame);
        }
        Ok(())
    }
}

/// Interruptible sleep. Returns false when shutdown was requested.
async fn settle(secs: u64, shutdown: &mut watch::Receiver<bool>) -> bool {
    if secs == 0 {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(secs)) => true,
        changed = shutdown.changed() => changed.is_ok() && !*shutdown.borrow(),
    }
}

/// Spawn the worker onto the runtime. Returns the join handle, the
/// event channel receiver and the shutdown flag sender.
pub fn spawn_worker(
    config: AppConfig,
    simulator: Box<dyn PvSimulator + Send>,
    sqlite: Option<SqliteSink>,
    csv: Option<CsvSink>,
) -> Result<(
    JoinHandle<()>,
    mpsc::UnboundedReceiver<DateTime<Utc>>,
    watch::Sender<bool>,
)> {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = PollWorker::new(config, simulator, sqlite, csv, event_tx)?;
    let handle = tokio::spawn(worker.run(shutdown_rx));
    Ok((handle, event_rx, shutdown_tx))
}
