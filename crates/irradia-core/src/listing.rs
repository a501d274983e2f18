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

//! Directory-listing client for the DWD open-data mirror
//!
//! The single-station endpoint serves an Apache autoindex page: a `<pre>`
//! block with one row per file and anchor tags for the downloads. Exactly
//! one row carries the literal `LATEST` marker; its date/time tokens are
//! the publish timestamp the staleness gate compares against.

use crate::error::{ForecastError, Result};
use crate::timefmt;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};

const USER_AGENT: &str = "irradia/0.3";
const LATEST_MARKER: &str = "LATEST";

/// One poll's view of the remote listing. Discarded after the newest URL
/// is chosen.
#[derive(Debug, Clone)]
pub struct ForecastListing {
    pub published_at: DateTime<Utc>,
    /// In server listing order, non-empty.
    pub candidate_urls: Vec<String>,
}

impl ForecastListing {
    /// Last-listed wins. The single-station listing carries one `_LATEST`
    /// archive; listing order is stable there, so no sort by filename is
    /// attempted.
    pub fn newest_url(&self) -> &str {
        self.candidate_urls
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ListingClient {
    client: reqwest::Client,
}

impl ListingClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ForecastError::Transport {
                url: String::new(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    /// Fetch the listing page and extract the LATEST publish timestamp
    /// plus every download link ending in `extension`, in listing order.
    ///
    /// Transport failures are not retried here; the retry policy is the
    /// next scheduled poll.
    pub async fn fetch_latest(&self, endpoint: &str, extension: &str) -> Result<ForecastListing> {
        let response = self.client.get(endpoint).send().await.map_err(|e| {
            ForecastError::Transport {
                url: endpoint.to_owned(),
                reason: format!("Request failed: {e}"),
            }
        })?;

        if !response.status().is_success() {
            return Err(ForecastError::Transport {
                url: endpoint.to_owned(),
                reason: format!("HTTP status {}", response.status()),
            });
        }

        let page = response.text().await.map_err(|e| ForecastError::Transport {
            url: endpoint.to_owned(),
            reason: format!("Failed to read listing body: {e}"),
        })?;

        parse_listing_page(&page, endpoint, extension)
    }
}

/// Parse the autoindex HTML. Fails with [`ForecastError::Parse`] when the
/// page has no `LATEST` row or no matching links; the caller treats that
/// as an unusable cycle, not a crash.
pub fn parse_listing_page(
    page: &str,
    endpoint: &str,
    extension: &str,
) -> Result<ForecastListing> {
    let parse_err = |reason: String| ForecastError::Parse {
        origin: endpoint.to_owned(),
        reason,
    };

    let document = Html::parse_document(page);

    let pre_selector = Selector::parse("pre").expect("static selector");
    let pre = document
        .select(&pre_selector)
        .next()
        .ok_or_else(|| parse_err("no <pre> directory listing on page".to_owned()))?;

    let listing_text: String = pre.text().collect();
    let latest_line = listing_text
        .lines()
        .find(|line| line.contains(LATEST_MARKER))
        .ok_or_else(|| parse_err(format!("no '{LATEST_MARKER}' row in listing")))?;

    let published_at = parse_row_timestamp(latest_line)
        .ok_or_else(|| parse_err(format!("no parsable timestamp in row '{latest_line}'")))?;

    let anchor_selector = Selector::parse("a[href]").expect("static selector");
    let base = endpoint.trim_end_matches('/');
    let suffix = format!(".{extension}");
    let candidate_urls: Vec<String> = document
        .select(&anchor_selector)
        .filter_map(|node| node.value().attr("href"))
        .filter(|href| href.ends_with(&suffix))
        .map(|href| format!("{base}/{href}"))
        .collect();

    if candidate_urls.is_empty() {
        return Err(parse_err(format!("no links ending in '.{extension}'")));
    }

    Ok(ForecastListing {
        published_at,
        candidate_urls,
    })
}

/// Scan a listing row for adjacent `25-Dec-2018 07:30` date/time tokens.
fn parse_row_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    tokens
        .windows(2)
        .find_map(|pair| timefmt::parse_listing(pair[0], pair[1]).ok())
}
