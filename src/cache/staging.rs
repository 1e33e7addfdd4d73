//! Scratch files and folders inside the cache root
//!
//! | Name | Purpose |
//! |------|---------|
//! | `<entry>_dl-<pid>-<rand>` | entry being unpacked |
//! | `<entry>_dl-rm-<pid>-<rand>` | entry being deleted |
//! | `.dl-<pid>-<rand>.zip` | download in progress |
//!
//! Each name carries the pid of its owner. Leftovers are removed once that
//! process is gone; names without a pid come from older versions and are
//! always removed.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::artifact::STAGING_SUFFIX;
use crate::error::{ArtifactError, ArtifactResult};
use crate::process;

/// Prefix of in-flight download files in the cache root
pub const DOWNLOAD_PREFIX: &str = ".dl-";

const REMOVAL_TAG: &str = "rm-";

/// A fresh staging sibling of `target` owned by this process
pub fn staging_sibling(target: &Path, removal: bool) -> PathBuf {
    let mut name: OsString = target.as_os_str().to_os_string();
    name.push(format!(
        "{}-{}{}-{}",
        STAGING_SUFFIX,
        if removal { REMOVAL_TAG } else { "" },
        std::process::id(),
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    ));
    PathBuf::from(name)
}

/// Prefix for download files created by this process
pub fn download_prefix() -> String {
    format!("{}{}-", DOWNLOAD_PREFIX, std::process::id())
}

/// Rename an entry to a removal sibling, taking it out of the cache in one
/// step. Returns the new location, or `None` when there was no entry.
pub fn retire(entry: &Path) -> ArtifactResult<Option<PathBuf>> {
    let retired = staging_sibling(entry, true);
    match std::fs::rename(entry, &retired) {
        Ok(()) => Ok(Some(retired)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ArtifactError::io(format!("retiring {}", entry.display()), e)),
    }
}

/// Delete an entry without ever exposing it half deleted.
///
/// Returns whether there was an entry. When the delete itself fails the
/// entry is already gone from the cache; the leftover is swept later.
pub async fn remove_entry(entry: &Path) -> ArtifactResult<bool> {
    let Some(retired) = retire(entry)? else {
        return Ok(false);
    };
    let display = retired.display().to_string();
    tokio::task::spawn_blocking(move || std::fs::remove_dir_all(&retired))
        .await
        .map_err(|e| ArtifactError::io(format!("removing {display}"), io::Error::other(e)))?
        .map_err(|e| ArtifactError::io(format!("removing {display}"), e))?;
    Ok(true)
}

/// Remove staging siblings of `target` whose owners no longer run.
///
/// Folders of live processes, this one included, are left to their owners.
pub fn remove_stale_staging(target: &Path) {
    let (Some(parent), Some(leaf)) = (target.parent(), target.file_name().and_then(|n| n.to_str()))
    else {
        return;
    };
    let marker = format!("{leaf}{STAGING_SUFFIX}");
    sweep(parent, |name| {
        let rest = name.strip_prefix(&marker)?;
        Some(staging_owner(rest))
    });
}

/// Remove download files in `root` whose owners no longer run
pub fn remove_stale_downloads(root: &Path) {
    sweep(root, |name| {
        let rest = name.strip_prefix(DOWNLOAD_PREFIX)?.strip_suffix(".zip")?;
        Some(rest.split_once('-').and_then(|(pid, _)| pid.parse().ok()))
    });
}

/// Owner pid encoded after the staging suffix
fn staging_owner(rest: &str) -> Option<u32> {
    let rest = rest.strip_prefix('-')?;
    let rest = rest.strip_prefix(REMOVAL_TAG).unwrap_or(rest);
    rest.split('-').next()?.parse().ok()
}

/// Delete every child of `dir` that `owner_of` claims (returns `Some`) and
/// whose owner, if any, is dead
fn sweep(dir: &Path, owner_of: impl Fn(&str) -> Option<Option<u32>>) {
    let Ok(children) = std::fs::read_dir(dir) else {
        return;
    };
    for child in children.flatten() {
        let name = child.file_name();
        let Some(owner) = name.to_str().and_then(&owner_of) else {
            continue;
        };
        if owner.is_some_and(|pid| process::is_alive(pid) != Some(false)) {
            continue;
        }

        let path = child.path();
        debug!("Removing stale {}", path.display());
        let removed = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        if let Err(e) = removed {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}
