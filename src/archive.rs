//! Artifact archive extraction

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Errors from unpacking an archive
#[derive(Debug, thiserror::Error)]
pub enum UnpackError {
    #[error("invalid zip archive: {0}")]
    InvalidZip(String),

    #[error("entry '{0}' escapes the destination")]
    UnsafeEntry(String),

    #[error("extraction aborted")]
    Aborted,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Extract every file entry of a zip archive below `dest`.
///
/// Directory entries are skipped; parent folders are created as needed and
/// existing files are overwritten. The `abort` flag is checked between
/// entries so a cancelled install stops writing promptly.
pub fn unpack_zip(archive: &Path, dest: &Path, abort: &AtomicBool) -> Result<usize, UnpackError> {
    let file = File::open(archive)?;
    let reader = BufReader::with_capacity(1024 * 1024, file);
    let mut zip = zip::ZipArchive::new(reader).map_err(|e| UnpackError::InvalidZip(e.to_string()))?;

    fs::create_dir_all(dest)?;
    let mut extracted = 0;

    for index in 0..zip.len() {
        if abort.load(Ordering::Relaxed) {
            return Err(UnpackError::Aborted);
        }

        let mut entry = zip
            .by_index(index)
            .map_err(|e| UnpackError::InvalidZip(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| UnpackError::UnsafeEntry(entry.name().to_string()))?;

        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => UnpackError::InvalidZip(e.to_string()),
            _ => UnpackError::Io(e),
        })?;
        extracted += 1;
    }

    debug!("Extracted {} file(s) into {}", extracted, dest.display());
    Ok(extracted)
}
