//! Firmware download from the Expert Sleepers site.
//!
//! Archives land in the system temp directory and are removed when the
//! guard drops, so an aborted run does not accumulate ZIPs.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const FIRMWARE_BASE_URL: &str = "https://www.expert-sleepers.co.uk/downloads/firmware/";
pub const FIRMWARE_PAGE_URL: &str =
    "https://www.expert-sleepers.co.uk/distingNTfirmwareupdates.html";

/// Versions known at release time, newest first. `--list` prints these and
/// `--latest` resolves to the head.
pub const KNOWN_VERSIONS: &[&str] = &[
    "1.12.0", "1.11.0", "1.10.0", "1.9.0", "1.8.0", "1.7.1", "1.7.0", "1.6.1", "1.6.0",
];

pub fn latest_version() -> &'static str {
    KNOWN_VERSIONS[0]
}

/// URL of the archive for a published version.
pub fn version_url(version: &str) -> String {
    format!("{}distingNT_{}.zip", FIRMWARE_BASE_URL, version)
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download of {url} failed: {reason}")]
    Http { url: String, reason: String },

    #[error("could not write {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A downloaded archive on disk; the file is deleted on drop.
pub struct DownloadedArchive {
    path: PathBuf,
}

impl DownloadedArchive {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DownloadedArchive {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::debug!("leaving {} behind: {}", self.path.display(), e);
        }
    }
}

/// Fetch `url` into the temp directory under `file_name`.
pub fn fetch(url: &str, file_name: &str) -> Result<DownloadedArchive, DownloadError> {
    log::info!("downloading {}", url);
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| DownloadError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    let body = response.bytes().map_err(|e| DownloadError::Http {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let path = std::env::temp_dir().join(file_name);
    fs::write(&path, &body).map_err(|source| DownloadError::Save {
        path: path.clone(),
        source,
    })?;
    log::debug!("saved {} bytes to {}", body.len(), path.display());

    Ok(DownloadedArchive { path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_urls_follow_the_site_naming_scheme() {
        assert_eq!(
            version_url("1.12.0"),
            "https://www.expert-sleepers.co.uk/downloads/firmware/distingNT_1.12.0.zip"
        );
    }

    #[test]
    fn latest_is_the_head_of_the_known_list() {
        assert_eq!(latest_version(), KNOWN_VERSIONS[0]);
        assert!(KNOWN_VERSIONS.contains(&latest_version()));
    }

    #[test]
    fn dropping_the_guard_removes_the_file() {
        let path = std::env::temp_dir().join("ntflash_drop_test.zip");
        fs::write(&path, b"zip").unwrap();
        drop(DownloadedArchive { path: path.clone() });
        assert!(!path.exists());
    }
}
