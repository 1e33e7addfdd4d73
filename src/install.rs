//! Download-and-install of a single artifact
//!
//! The install of one URI runs under its cross-process lock:
//!
//! 1. drop the entry when a reinstall is forced
//! 2. when the entry is missing, download into a temp file, unpack into a
//!    private staging directory and rename that into place
//! 3. stamp the entry as used
//!
//! The rename is the only step that makes an entry visible, and a forced
//! reinstall renames the old entry away before deleting it, so readers never
//! see a partial entry. Scratch names carry the installing pid so leftovers
//! from dead processes can be recognized and removed.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::abort::AbortOnDrop;
use crate::archive::{self, UnpackError};
use crate::artifact::Artifact;
use crate::cache::local::{CacheEntry, LocalCache};
use crate::cache::staging;
use crate::error::{ArtifactError, ArtifactResult};
use crate::lock::{InstallLock, LockBackend};
use crate::source::ArtifactSource;

/// Installs artifacts into a local cache
#[derive(Clone)]
pub struct Installer {
    cache: LocalCache,
    source: Arc<dyn ArtifactSource>,
    lock_backend: LockBackend,
}

impl Installer {
    pub fn new(cache: LocalCache, source: Arc<dyn ArtifactSource>, lock_backend: LockBackend) -> Self {
        Self {
            cache,
            source,
            lock_backend,
        }
    }

    /// The cache installs go to
    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Make sure the artifact at `uri` is installed and return its entry.
    ///
    /// Installed entries are reused unless `force` is set. Dropping the
    /// returned future releases the lock and discards any staged files.
    pub async fn install(&self, uri: &Url, force: bool) -> ArtifactResult<CacheEntry> {
        let artifact = Artifact::from_uri(uri)?;
        let entry = self.cache.entry(&artifact);

        let lock = InstallLock::for_url(self.cache.root(), uri, self.lock_backend);
        let _guard = lock.acquire().await?;

        if force && staging::remove_entry(&entry.path).await? {
            info!("Removed {} for reinstall", artifact);
        }

        if entry.path.is_dir() {
            debug!("{} already cached at {}", artifact, entry.path.display());
        } else {
            self.populate(uri, &artifact, &entry.path).await?;
        }

        entry.touch(Utc::now()).await?;
        Ok(entry)
    }

    async fn populate(&self, uri: &Url, artifact: &Artifact, target: &Path) -> ArtifactResult<()> {
        let parent = target
            .parent()
            .ok_or_else(|| ArtifactError::install_failed(target, "entry has no parent folder"))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ArtifactError::io(format!("creating {}", parent.display()), e))?;
        staging::remove_stale_staging(target);
        staging::remove_stale_downloads(self.cache.root());

        let staging = StagingDir::create(target)?;
        let prefix = staging::download_prefix();
        let archive = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".zip")
            .tempfile_in(self.cache.root())
            .map_err(|e| ArtifactError::io("creating download file", e))?;
        let dest = archive
            .as_file()
            .try_clone()
            .map_err(|e| ArtifactError::io("opening download file", e))?;

        info!("Downloading {} from {}", artifact, self.source.source_name());
        let bytes = self.source.fetch(uri, dest).await?;
        debug!("Fetched {} byte(s) for {}", bytes, artifact);

        // Cancellation flips the flag; the blocking unpack stops at the next
        // entry and clears its own staging folder
        let abort = AbortOnDrop::new();
        let flag = abort.flag();
        let staging_path = staging.path.clone();
        let unpacked = tokio::task::spawn_blocking(move || {
            let result = archive::unpack_zip(archive.path(), &staging_path, &flag);
            if flag.load(Ordering::Relaxed) {
                let _ = std::fs::remove_dir_all(&staging_path);
            }
            drop(archive);
            result
        })
        .await
        .map_err(|e| ArtifactError::install_failed(target, e))?;

        match unpacked {
            Ok(files) => debug!("Unpacked {} file(s) for {}", files, artifact),
            Err(UnpackError::Aborted) => return Err(ArtifactError::Cancelled),
            Err(e) => return Err(ArtifactError::install_failed(target, e)),
        }

        staging.publish(target).await?;
        info!("Installed {} at {}", artifact, target.display());
        Ok(())
    }
}

/// Staging folder next to an entry, removed unless published
struct StagingDir {
    path: PathBuf,
    published: bool,
}

impl StagingDir {
    fn create(target: &Path) -> ArtifactResult<Self> {
        let path = staging::staging_sibling(target, false);
        std::fs::create_dir(&path)
            .map_err(|e| ArtifactError::io(format!("creating {}", path.display()), e))?;
        Ok(Self {
            path,
            published: false,
        })
    }

    /// Rename into place. Losing the race to an entry published by another
    /// installer counts as success; the staged copy is discarded.
    async fn publish(mut self, target: &Path) -> ArtifactResult<()> {
        match tokio::fs::rename(&self.path, target).await {
            Ok(()) => {
                self.published = true;
                Ok(())
            }
            Err(_) if target.is_dir() => {
                info!("{} was installed concurrently; using it", target.display());
                Ok(())
            }
            Err(e) => Err(ArtifactError::install_failed(target, e)),
        }
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove staging {}: {}", self.path.display(), e);
            }
        }
    }
}
