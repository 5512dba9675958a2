//! ntflash-package - firmware package validation
//!
//! A firmware package is a ZIP archive carrying a `MANIFEST.json`, the
//! RAM-resident flashloader and the application firmware. Validation is
//! strictly pre-flight: it happens entirely in memory, before any device is
//! touched, and either yields a fully populated [`FirmwarePackage`] or
//! fails. There is no partially valid package.

use std::io::{Cursor, Read};

use serde::Deserialize;
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

/// Archive entry holding the manifest.
pub const MANIFEST_NAME: &str = "MANIFEST.json";

/// Archive entry holding the second-stage flashloader.
pub const FLASHLOADER_ENTRY: &str = "bootable_images/unsigned_MIMXRT1060_flashloader.bin";

/// Conventional firmware entry, used when the manifest does not name one.
pub const DEFAULT_FIRMWARE_ENTRY: &str = "bootable_images/disting_NT.bin";

/// The one processor this tool flashes.
pub const SUPPORTED_PROCESSOR: &str = "MIMXRT1060";

/// Why a package was rejected.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("not a valid ZIP archive: {0}")]
    BadArchive(String),

    #[error("MANIFEST.json missing from archive")]
    ManifestMissing,

    #[error("MANIFEST.json is not valid JSON: {0}")]
    ManifestInvalid(String),

    #[error("unsupported processor \"{0}\" (this tool flashes MIMXRT1060 only)")]
    UnsupportedProcessor(String),

    #[error("archive has no {role} image at {path}")]
    EntryMissing { role: &'static str, path: String },

    #[error("the {role} image in the archive is empty")]
    EmptyImage { role: &'static str },
}

/// The manifest fields this tool reads. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct Manifest {
    processor: Option<String>,
    app_firmware: Option<String>,
}

/// A validated firmware package. Immutable once constructed; both images
/// are guaranteed non-empty.
#[derive(Debug)]
pub struct FirmwarePackage {
    flashloader: Vec<u8>,
    firmware: Vec<u8>,
    firmware_entry: String,
    processor: Option<String>,
}

impl FirmwarePackage {
    /// Validate `archive` and extract its images.
    ///
    /// Order matters: the manifest is located and parsed first, the
    /// processor check runs before any image extraction, and a processor
    /// mismatch therefore never reads the (large) image entries at all.
    pub fn from_archive(archive: &[u8]) -> Result<Self, PackageError> {
        let mut zip = ZipArchive::new(Cursor::new(archive))
            .map_err(|e| PackageError::BadArchive(e.to_string()))?;

        let manifest_bytes =
            read_entry(&mut zip, MANIFEST_NAME)?.ok_or(PackageError::ManifestMissing)?;
        let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
            .map_err(|e| PackageError::ManifestInvalid(e.to_string()))?;

        if let Some(processor) = &manifest.processor {
            if processor != SUPPORTED_PROCESSOR {
                return Err(PackageError::UnsupportedProcessor(processor.clone()));
            }
        }

        let firmware_entry = manifest
            .app_firmware
            .unwrap_or_else(|| DEFAULT_FIRMWARE_ENTRY.to_string());

        let flashloader =
            read_entry(&mut zip, FLASHLOADER_ENTRY)?.ok_or(PackageError::EntryMissing {
                role: "flashloader",
                path: FLASHLOADER_ENTRY.to_string(),
            })?;
        let firmware =
            read_entry(&mut zip, &firmware_entry)?.ok_or_else(|| PackageError::EntryMissing {
                role: "firmware",
                path: firmware_entry.clone(),
            })?;

        if flashloader.is_empty() {
            return Err(PackageError::EmptyImage {
                role: "flashloader",
            });
        }
        if firmware.is_empty() {
            return Err(PackageError::EmptyImage { role: "firmware" });
        }

        log::debug!(
            "package validated: flashloader {} bytes, firmware {} bytes ({})",
            flashloader.len(),
            firmware.len(),
            firmware_entry
        );

        Ok(Self {
            flashloader,
            firmware,
            firmware_entry,
            processor: manifest.processor,
        })
    }

    /// Build a package from images already in memory, bypassing the
    /// archive. Used by embedding tools and tests; the non-empty invariant
    /// still holds.
    pub fn from_images(flashloader: Vec<u8>, firmware: Vec<u8>) -> Result<Self, PackageError> {
        if flashloader.is_empty() {
            return Err(PackageError::EmptyImage {
                role: "flashloader",
            });
        }
        if firmware.is_empty() {
            return Err(PackageError::EmptyImage { role: "firmware" });
        }
        Ok(Self {
            flashloader,
            firmware,
            firmware_entry: DEFAULT_FIRMWARE_ENTRY.to_string(),
            processor: None,
        })
    }

    /// The RAM-resident second-stage loader image.
    pub fn flashloader(&self) -> &[u8] {
        &self.flashloader
    }

    /// The application firmware image.
    pub fn firmware(&self) -> &[u8] {
        &self.firmware
    }

    /// Archive path the firmware came from.
    pub fn firmware_entry(&self) -> &str {
        &self.firmware_entry
    }

    /// Processor declared by the manifest, if any.
    pub fn processor(&self) -> Option<&str> {
        self.processor.as_deref()
    }

    /// Bytes to erase before writing: the firmware plus the FCB header area
    /// in front of it. The constant offset matches the device's flash
    /// layout and must not be derived from anything else.
    pub fn erase_size(&self) -> u32 {
        self.firmware.len() as u32 + ntflash_core::FIRMWARE_HEADER_SIZE
    }
}

/// Read one archive entry, distinguishing "absent" from "broken archive".
fn read_entry(
    zip: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<Vec<u8>>, PackageError> {
    let mut entry = match zip.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(PackageError::BadArchive(e.to_string())),
    };
    let mut data = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut data)
        .map_err(|e| PackageError::BadArchive(e.to_string()))?;
    Ok(Some(data))
}
