//! Age-based cache eviction
//!
//! Entries whose `lastused` stamp is older than the allowed age are deleted.
//! Entries without a stamp are never touched.

use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::artifact::Artifact;
use crate::cache::local::LocalCache;
use crate::cache::staging;
use crate::error::{ArtifactError, ArtifactResult};

/// Outcome of a cleanup pass
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Number of entries examined
    pub scanned: usize,
    /// Entries deleted (or that would be, in a dry run)
    pub removed: Vec<Artifact>,
    /// Entries kept because they carry no stamp
    pub unstamped: usize,
    /// Deletions that failed; the pass continued past them
    pub failed: Vec<(PathBuf, ArtifactError)>,
}

/// Deletes stale cache entries
#[derive(Debug, Clone)]
pub struct CacheJanitor {
    cache: LocalCache,
    dry_run: bool,
}

impl CacheJanitor {
    /// Create a janitor for a cache
    pub fn new(cache: LocalCache) -> Self {
        Self {
            cache,
            dry_run: false,
        }
    }

    /// Report what would be removed without deleting anything
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Remove entries not used within `max_age`
    pub async fn cleanup(&self, max_age: Duration) -> ArtifactResult<CleanupReport> {
        self.cleanup_at(max_age, Utc::now()).await
    }

    /// Remove entries whose stamp is older than `now - max_age`.
    ///
    /// An entry stamped exactly at the cutoff is kept.
    pub async fn cleanup_at(
        &self,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> ArtifactResult<CleanupReport> {
        // An age reaching past the earliest representable time evicts nothing
        let cutoff = now
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut report = CleanupReport::default();
        let artifacts: Vec<Artifact> = self.cache.enumerate().collect();

        for artifact in artifacts {
            report.scanned += 1;
            let path = self.cache.entry_path(&artifact);

            let last_used = match self.cache.last_used(&artifact).await {
                Ok(Some(at)) => at,
                Ok(None) => {
                    report.unstamped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Skipping {}: {}", artifact, e);
                    report.failed.push((path, e));
                    continue;
                }
            };
            if last_used >= cutoff {
                continue;
            }

            if self.dry_run {
                debug!("Would remove {} (last used {})", artifact, last_used);
                report.removed.push(artifact);
                continue;
            }

            match staging::remove_entry(&path).await {
                Ok(_) => {
                    info!("Removed {} (last used {})", artifact, last_used);
                    report.removed.push(artifact);
                }
                Err(e) => {
                    warn!("Failed to remove {}: {}", path.display(), e);
                    report.failed.push((path, e));
                }
            }
        }

        Ok(report)
    }
}
