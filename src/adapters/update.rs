//! Firmware update delegate driven by a version manifest.
//!
//! Flow: fetch manifest → compare `version` → install image at `url` →
//! restart (inside the transport, never returns).
//!
//! The manifest is a small JSON document:
//!
//! ```json
//! { "version": 2, "url": "https://example.invalid/waterly-v2.bin" }
//! ```
//!
//! HTTP download and flash writing belong to the [`ImageTransport`]; this
//! module owns the decision logic so it runs on the host.

use core::convert::Infallible;

use log::{info, warn};
use serde::Deserialize;

use crate::app::ports::{UpdateDelegate, UpdateError};

/// Bytes reserved for the fetched manifest.
pub const MANIFEST_BUFFER_LEN: usize = 512;

/// Where the newest image lives and which version it is.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FirmwareManifest {
    pub version: u32,
    pub url: heapless::String<256>,
}

impl FirmwareManifest {
    pub fn parse(bytes: &[u8]) -> Result<Self, UpdateError> {
        serde_json::from_slice(bytes).map_err(|_| UpdateError::ManifestUnavailable)
    }

    pub fn is_newer_than(&self, current_version: u32) -> bool {
        self.version > current_version
    }
}

// ── Transport port ────────────────────────────────────────────

/// Network + flash half of an update.
pub trait ImageTransport {
    /// Read the manifest at `url` into `buf`, returning the length.
    fn fetch_manifest(&mut self, url: &str, buf: &mut [u8]) -> Result<usize, UpdateError>;

    /// Download, verify and boot the image at `url`.  Returns only on
    /// failure.
    fn install(&mut self, url: &str) -> Result<Infallible, UpdateError>;
}

// ── Delegate ──────────────────────────────────────────────────

pub struct ManifestUpdater<T> {
    manifest_url: heapless::String<128>,
    transport: T,
}

impl<T: ImageTransport> ManifestUpdater<T> {
    pub fn new(manifest_url: heapless::String<128>, transport: T) -> Self {
        Self {
            manifest_url,
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: ImageTransport> UpdateDelegate for ManifestUpdater<T> {
    fn check_and_update(&mut self, current_version: u32) -> Result<(), UpdateError> {
        info!("OTA: checking {}", self.manifest_url);
        let mut buf = [0u8; MANIFEST_BUFFER_LEN];
        let len = self
            .transport
            .fetch_manifest(&self.manifest_url, &mut buf)?
            .min(MANIFEST_BUFFER_LEN);
        let manifest = FirmwareManifest::parse(&buf[..len]).inspect_err(|_| {
            warn!("OTA: manifest is not valid (needs 'version' and 'url')");
        })?;

        info!(
            "OTA: running v{} | published v{}",
            current_version, manifest.version
        );
        if !manifest.is_newer_than(current_version) {
            info!("OTA: firmware is up to date");
            return Ok(());
        }

        warn!("OTA: new version found, installing from {}", manifest.url);
        self.transport
            .install(&manifest.url)
            .map(|never| match never {})
    }
}

/// Transport for builds without a network stack: every check fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineTransport;

impl ImageTransport for OfflineTransport {
    fn fetch_manifest(&mut self, _url: &str, _buf: &mut [u8]) -> Result<usize, UpdateError> {
        warn!("OTA: no network transport configured");
        Err(UpdateError::ManifestUnavailable)
    }

    fn install(&mut self, _url: &str) -> Result<Infallible, UpdateError> {
        Err(UpdateError::DownloadFailed)
    }
}

// ── Boot-time rollback confirmation ───────────────────────────

/// Mark the running image valid so the bootloader cancels rollback.
#[cfg(target_os = "espidf")]
pub fn check_rollback() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: firmware marked valid (rollback cancelled)"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn check_rollback() {
    log::info!("OTA rollback check (simulation): skipped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Scripted {
        manifest: Option<&'static str>,
        installs: Vec<String>,
    }

    impl ImageTransport for Scripted {
        fn fetch_manifest(&mut self, _url: &str, buf: &mut [u8]) -> Result<usize, UpdateError> {
            let body = self.manifest.ok_or(UpdateError::ManifestUnavailable)?;
            let n = body.len().min(buf.len());
            buf[..n].copy_from_slice(&body.as_bytes()[..n]);
            Ok(n)
        }

        fn install(&mut self, url: &str) -> Result<Infallible, UpdateError> {
            self.installs.push(url.to_owned());
            Err(UpdateError::DownloadFailed)
        }
    }

    fn updater(manifest: Option<&'static str>) -> ManifestUpdater<Scripted> {
        let url = heapless::String::try_from("https://host/version.json").unwrap();
        ManifestUpdater::new(
            url,
            Scripted {
                manifest,
                ..Scripted::default()
            },
        )
    }

    #[test]
    fn same_version_means_no_update() {
        let mut u = updater(Some(r#"{"version":1,"url":"https://host/fw.bin"}"#));
        assert_eq!(u.check_and_update(1), Ok(()));
        assert!(u.transport().installs.is_empty());
    }

    #[test]
    fn newer_version_is_installed() {
        let mut u = updater(Some(r#"{"version":2,"url":"https://host/fw.bin"}"#));
        assert_eq!(u.check_and_update(1), Err(UpdateError::DownloadFailed));
        assert_eq!(u.transport().installs, ["https://host/fw.bin"]);
    }

    #[test]
    fn manifest_without_url_is_rejected() {
        let mut u = updater(Some(r#"{"version":9}"#));
        assert_eq!(u.check_and_update(1), Err(UpdateError::ManifestUnavailable));
    }

    #[test]
    fn unreachable_server_fails() {
        let mut u = updater(None);
        assert_eq!(u.check_and_update(1), Err(UpdateError::ManifestUnavailable));
        let mut offline = ManifestUpdater::new(heapless::String::new(), OfflineTransport);
        assert!(offline.check_and_update(1).is_err());
    }
}
