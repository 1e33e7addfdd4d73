//! Local artifact cache index
//!
//! Entries live at `<root>/<kind>/<version>/<country>/`. The index is read
//! straight from the directory tree and never locked: entries only ever
//! appear through an atomic rename, so readers see them complete or not at all.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::artifact::{Artifact, ArtifactKind};
use crate::cache::stamp;
use crate::error::ArtifactResult;

/// An installed artifact and its folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    /// The installed artifact
    pub artifact: Artifact,
    /// Folder holding the unpacked package
    pub path: PathBuf,
}

impl CacheEntry {
    /// When the entry was last used, if it was ever stamped
    pub async fn last_used(&self) -> ArtifactResult<Option<DateTime<Utc>>> {
        stamp::read_stamp(&self.path).await
    }

    /// Record a use of the entry
    pub async fn touch(&self, at: DateTime<Utc>) -> ArtifactResult<()> {
        stamp::write_stamp(&self.path, at).await
    }
}

/// Read access to the cache tree
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    /// Create an index over the given cache root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Expected folder of an artifact, whether installed or not
    pub fn entry_path(&self, artifact: &Artifact) -> PathBuf {
        self.root.join(artifact.relative_path())
    }

    /// The entry for an artifact
    pub fn entry(&self, artifact: &Artifact) -> CacheEntry {
        CacheEntry {
            artifact: artifact.clone(),
            path: self.entry_path(artifact),
        }
    }

    /// Whether an artifact is installed
    pub fn contains(&self, artifact: &Artifact) -> bool {
        self.entry_path(artifact).is_dir()
    }

    /// Lazily enumerate installed artifacts.
    ///
    /// Walks `<kind>/<version>/<country>` folders and yields every one that
    /// parses; anything else is skipped. Calling again restarts the walk.
    pub fn enumerate(&self) -> impl Iterator<Item = Artifact> + '_ {
        WalkDir::new(&self.root)
            .min_depth(3)
            .max_depth(3)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_type().is_dir())
            .filter_map(Result::ok)
            .filter_map(move |e| Artifact::from_local_folder(&self.root, e.path()))
    }

    /// Installed artifacts of one kind
    pub fn enumerate_kind(&self, kind: ArtifactKind) -> impl Iterator<Item = Artifact> + '_ {
        self.enumerate().filter(move |a| a.kind() == kind)
    }

    /// When an artifact was last used
    pub async fn last_used(&self, artifact: &Artifact) -> ArtifactResult<Option<DateTime<Utc>>> {
        self.entry(artifact).last_used().await
    }

    /// Stamp an installed artifact; returns `false` when it is not installed
    pub async fn set_last_used(&self, artifact: &Artifact, at: DateTime<Utc>) -> ArtifactResult<bool> {
        let entry = self.entry(artifact);
        if !entry.path.is_dir() {
            return Ok(false);
        }
        entry.touch(at).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn install(root: &Path, rel: &str) {
        fs::create_dir_all(root.join(rel)).unwrap();
    }

    #[test]
    fn enumerate_skips_non_artifacts() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        install(root, "onprem/24.0.1.1/w1");
        install(root, "onprem/24.0.1.1/platform");
        install(root, "sandbox/25.0.2.2/us");
        install(root, "sandbox/25.0.2.2/us_dl-0a1b2c3d");
        install(root, "onprem/not-a-version/w1");
        install(root, "tools/1.0.0.0/w1");
        install(root, "onprem/24.0.1.1/w1/nested/deeper");
        fs::write(root.join("dl-abc.lock"), "1").unwrap();
        fs::write(root.join("onprem/24.0.1.1/readme.txt"), "x").unwrap();

        let found: Vec<String> = LocalCache::new(root)
            .enumerate()
            .map(|a| a.relative_path().to_string_lossy().replace('\\', "/"))
            .collect();

        assert_eq!(
            found,
            vec!["onprem/24.0.1.1/platform", "onprem/24.0.1.1/w1", "sandbox/25.0.2.2/us"]
        );
    }

    #[test]
    fn enumerate_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let cache = LocalCache::new(temp.path().join("nope"));
        assert_eq!(cache.enumerate().count(), 0);
    }

    #[test]
    fn enumerate_can_stop_early_and_restart() {
        let temp = TempDir::new().unwrap();
        install(temp.path(), "onprem/24.0.1.1/w1");
        install(temp.path(), "onprem/24.0.1.2/w1");
        let cache = LocalCache::new(temp.path());

        assert_eq!(cache.enumerate().take(1).count(), 1);
        assert_eq!(cache.enumerate().count(), 2);
        assert_eq!(cache.enumerate_kind(ArtifactKind::Sandbox).count(), 0);
    }

    #[tokio::test]
    async fn stamp_only_installed_entries() {
        let temp = TempDir::new().unwrap();
        let cache = LocalCache::new(temp.path());
        let af = Artifact::parse("https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1/w1").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

        assert!(!cache.set_last_used(&af, at).await.unwrap());
        assert_eq!(cache.last_used(&af).await.unwrap(), None);

        install(temp.path(), "onprem/24.0.1.1/w1");
        assert!(cache.contains(&af));
        assert!(cache.set_last_used(&af, at).await.unwrap());
        assert_eq!(cache.last_used(&af).await.unwrap(), Some(at));
    }
}
