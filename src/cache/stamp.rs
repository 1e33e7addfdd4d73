//! `lastused` sentinel files
//!
//! The stamp is a single integer: UTC time in .NET ticks (100 ns intervals
//! since 0001-01-01T00:00:00Z) followed by a line break. Other tooling sharing
//! the cache reads the same format.

use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::error::{ArtifactError, ArtifactResult};

/// Name of the sentinel file inside every cache entry
pub const LAST_USED_FILE: &str = "lastused";

const TICKS_PER_SECOND: i64 = 10_000_000;
const TICKS_AT_UNIX_EPOCH: i64 = 621_355_968_000_000_000;

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

/// Convert a UTC time to .NET ticks
pub fn to_ticks(at: DateTime<Utc>) -> i64 {
    TICKS_AT_UNIX_EPOCH
        + at.timestamp() * TICKS_PER_SECOND
        + i64::from(at.timestamp_subsec_nanos() / 100)
}

/// Convert .NET ticks back to a UTC time
pub fn from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    let relative = ticks.checked_sub(TICKS_AT_UNIX_EPOCH)?;
    let secs = relative.div_euclid(TICKS_PER_SECOND);
    let nanos = relative.rem_euclid(TICKS_PER_SECOND) * 100;
    DateTime::from_timestamp(secs, u32::try_from(nanos).ok()?)
}

/// Parse stamp file contents; only the first line is considered
pub fn parse_stamp(content: &str) -> Option<DateTime<Utc>> {
    content
        .lines()
        .next()
        .and_then(|line| line.trim().parse::<i64>().ok())
        .and_then(from_ticks)
}

/// Read the stamp of an entry directory.
///
/// A missing or unreadable stamp is reported as `None`.
pub async fn read_stamp(entry_dir: &Path) -> ArtifactResult<Option<DateTime<Utc>>> {
    let path = entry_dir.join(LAST_USED_FILE);
    let content = match fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ArtifactError::io(
                format!("reading {}", path.display()),
                e,
            ))
        }
    };

    let stamp = parse_stamp(&content);
    if stamp.is_none() {
        debug!("Ignoring malformed stamp in {}", path.display());
    }
    Ok(stamp)
}

/// Write the stamp of an entry directory.
///
/// The stamp is written to a private file first and renamed over the
/// sentinel, so readers never see a truncated value.
pub async fn write_stamp(entry_dir: &Path, at: DateTime<Utc>) -> ArtifactResult<()> {
    let path = entry_dir.join(LAST_USED_FILE);
    let tmp = entry_dir.join(format!(".{}.{}.tmp", LAST_USED_FILE, uuid::Uuid::new_v4().simple()));
    let content = format!("{}{}", to_ticks(at), LINE_ENDING);

    fs::write(&tmp, content)
        .await
        .map_err(|e| ArtifactError::io(format!("writing {}", tmp.display()), e))?;
    if let Err(e) = fs::rename(&tmp, &path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(ArtifactError::io(format!("writing {}", path.display()), e));
    }

    debug!("Stamped {} at {}", entry_dir.display(), at);
    Ok(())
}
