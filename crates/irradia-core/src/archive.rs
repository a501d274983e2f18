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

//! Archive download and extraction
//!
//! A MOSMIX kmz is a ZIP archive with a single kml member. One download
//! is in flight per process; the temp file is a fixed path inside the
//! work directory and is overwritten on every cycle.

use crate::error::{ForecastError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

const DOWNLOAD_NAME: &str = "forecast.kmz.part";
const USER_AGENT: &str = "irradia/0.3";

#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    client: reqwest::Client,
}

impl ArchiveFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ForecastError::Download {
                url: String::new(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    /// Download `url` into the work directory, unpack its single member
    /// into the unpack directory and return the extracted path.
    pub async fn fetch_and_unpack(
        &self,
        url: &str,
        work_dir: &Path,
        unpack_dir: &Path,
    ) -> Result<PathBuf> {
        let archive_path = self.download(url, work_dir).await?;
        unpack(&archive_path, unpack_dir)
    }

    /// Download `url` into the work directory and return the archive
    /// path, overwriting any previous download.
    pub async fn download(&self, url: &str, work_dir: &Path) -> Result<PathBuf> {
        let download_err = |reason: String| ForecastError::Download {
            url: url.to_owned(),
            reason,
        };

        std::fs::create_dir_all(work_dir)
            .map_err(|e| download_err(format!("cannot create work dir: {e}")))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_err(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(download_err(format!("HTTP status {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_err(format!("Failed to read body: {e}")))?;

        let archive_path = work_dir.join(DOWNLOAD_NAME);
        std::fs::write(&archive_path, &bytes)
            .map_err(|e| download_err(format!("Failed to write download: {e}")))?;

        tracing::debug!(
            url,
            bytes = bytes.len(),
            path = %archive_path.display(),
            "forecast archive downloaded"
        );

        Ok(archive_path)
    }
}

/// Extract the single member of a kmz into `unpack_dir`.
pub fn unpack(archive_path: &Path, unpack_dir: &Path) -> Result<PathBuf> {
    let archive_err = |reason: String| ForecastError::Archive {
        path: archive_path.display().to_string(),
        reason,
    };

    std::fs::create_dir_all(unpack_dir)
        .map_err(|e| archive_err(format!("cannot create unpack dir: {e}")))?;

    let file =
        File::open(archive_path).map_err(|e| archive_err(format!("cannot open archive: {e}")))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| archive_err(format!("not a zip archive: {e}")))?;

    if archive.is_empty() {
        return Err(archive_err("archive has no members".to_owned()));
    }
    if archive.len() > 1 {
        tracing::warn!(
            members = archive.len(),
            "expected a single-member kmz, extracting the first member only"
        );
    }

    let mut member = archive
        .by_index(0)
        .map_err(|e| archive_err(format!("cannot read member: {e}")))?;
    let member_name = member
        .enclosed_name()
        .and_then(|p| p.file_name().map(PathBuf::from))
        .ok_or_else(|| archive_err("member has an unusable name".to_owned()))?;

    let out_path = unpack_dir.join(member_name);
    let mut out =
        File::create(&out_path).map_err(|e| archive_err(format!("cannot create output: {e}")))?;
    std::io::copy(&mut member, &mut out)
        .map_err(|e| archive_err(format!("extraction failed: {e}")))?;

    tracing::debug!(path = %out_path.display(), "kml member extracted");
    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::{FileOptions, ZipWriter};

    fn make_kmz(dir: &Path, member: &str, content: &[u8]) -> PathBuf {
        let path = dir.join("fixture.kmz");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        writer.start_file(member, FileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
        writer.finish().unwrap();
        path
    }

    #[test]
    fn unpacks_single_member() {
        let dir = TempDir::new().unwrap();
        let kmz = make_kmz(dir.path(), "MOSMIX_L_LATEST_P755.kml", b"<kml/>");
        let out = unpack(&kmz, dir.path()).unwrap();
        assert_eq!(out.file_name().unwrap(), "MOSMIX_L_LATEST_P755.kml");
        assert_eq!(std::fs::read(out).unwrap(), b"<kml/>");
    }

    #[test]
    fn garbage_bytes_are_archive_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bogus.kmz");
        std::fs::write(&path, b"this is not a zip").unwrap();
        let err = unpack(&path, dir.path()).unwrap_err();
        assert!(matches!(err, ForecastError::Archive { .. }));
    }

    #[test]
    fn empty_archive_is_archive_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.kmz");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        writer.finish().unwrap();
        let err = unpack(&path, dir.path()).unwrap_err();
        assert!(matches!(err, ForecastError::Archive { .. }));
    }

    #[tokio::test]
    async fn fetch_and_unpack_roundtrip() {
        let dir = TempDir::new().unwrap();
        let kmz = make_kmz(dir.path(), "forecast.kml", b"<kml>payload</kml>");
        let body = std::fs::read(&kmz).unwrap();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/MOSMIX_L_LATEST_P755.kmz")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let fetcher = ArchiveFetcher::new().unwrap();
        let url = format!("{}/MOSMIX_L_LATEST_P755.kmz", server.url());
        let work = dir.path().join("work");
        let unpack_dir = dir.path().join("kml");
        let out = fetcher
            .fetch_and_unpack(&url, &work, &unpack_dir)
            .await
            .unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"<kml>payload</kml>");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_file_is_download_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/gone.kmz")
            .with_status(404)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher = ArchiveFetcher::new().unwrap();
        let url = format!("{}/gone.kmz", server.url());
        let err = fetcher
            .fetch_and_unpack(&url, dir.path(), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::Download { .. }));
    }
}
