//! Artifact download orchestration
//!
//! Installs an artifact together with its platform package. Both installs
//! run concurrently; each one is serialized against other processes by its
//! own install lock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use crate::artifact::{Artifact, ArtifactKind, ArtifactVersion, StorageAccount};
use crate::cache::local::{CacheEntry, LocalCache};
use crate::config::EngineConfig;
use crate::error::{ArtifactError, ArtifactResult};
use crate::install::Installer;
use crate::source::ArtifactSource;

/// Installed entries of one download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    /// The requested artifact
    pub artifact: CacheEntry,
    /// Its platform package, when requested
    pub platform: Option<CacheEntry>,
}

impl DownloadResult {
    /// Stamp every entry of this result as used at `at`
    pub async fn touch(&self, at: DateTime<Utc>) -> ArtifactResult<()> {
        self.artifact.touch(at).await?;
        if let Some(platform) = self.platform.as_ref().filter(|p| p.path != self.artifact.path) {
            platform.touch(at).await?;
        }
        Ok(())
    }
}

/// Downloads artifacts into the local cache
#[derive(Clone)]
pub struct ArtifactDownloader {
    installer: Installer,
    use_cdn: bool,
}

impl ArtifactDownloader {
    pub fn new(config: &EngineConfig, source: Arc<dyn ArtifactSource>) -> Self {
        let installer = Installer::new(
            LocalCache::new(&config.cache_root),
            source,
            config.lock_backend,
        );
        Self::from_installer(installer, config.use_cdn)
    }

    pub fn from_installer(installer: Installer, use_cdn: bool) -> Self {
        Self { installer, use_cdn }
    }

    /// The cache downloads go to
    pub fn cache(&self) -> &LocalCache {
        self.installer.cache()
    }

    /// Parse `uri` and download the artifact it names
    pub async fn download_uri(
        &self,
        uri: &str,
        include_platform: bool,
        force: bool,
    ) -> ArtifactResult<DownloadResult> {
        let artifact = Artifact::parse(uri)?;
        self.download(&artifact, include_platform, force).await
    }

    /// Download the artifact with the given parts
    pub async fn download_parts(
        &self,
        account: StorageAccount,
        kind: ArtifactKind,
        version: ArtifactVersion,
        country: &str,
        include_platform: bool,
        force: bool,
    ) -> ArtifactResult<DownloadResult> {
        let artifact = Artifact::from_parts(account, kind, version, country, self.use_cdn)?;
        self.download(&artifact, include_platform, force).await
    }

    /// Install `artifact` and, when requested, its platform package.
    ///
    /// When either install fails the error lists every failed install and
    /// names the ones that succeeded.
    pub async fn download(
        &self,
        artifact: &Artifact,
        include_platform: bool,
        force: bool,
    ) -> ArtifactResult<DownloadResult> {
        let uri = artifact.download_uri(self.use_cdn)?;

        if artifact.is_platform() || !include_platform {
            let entry = self
                .installer
                .install(&uri, force)
                .await
                .map_err(|e| aggregate(vec![(artifact.to_string(), e)], Vec::new()))?;
            let platform = include_platform.then(|| entry.clone());
            return Ok(DownloadResult {
                artifact: entry,
                platform,
            });
        }

        let platform = artifact.platform_artifact()?;
        let platform_uri = platform.download_uri(self.use_cdn)?;
        debug!("Downloading {} with {}", artifact, platform);

        let (primary, platform_entry) = tokio::join!(
            self.installer.install(&uri, force),
            self.installer.install(&platform_uri, force)
        );

        match (primary, platform_entry) {
            (Ok(artifact), Ok(platform)) => {
                info!("Downloaded {} and {}", artifact.artifact, platform.artifact);
                Ok(DownloadResult {
                    artifact,
                    platform: Some(platform),
                })
            }
            (primary, platform_entry) => {
                let mut failures = Vec::new();
                let mut succeeded = Vec::new();
                for (label, outcome) in [
                    (artifact.to_string(), primary),
                    (platform.to_string(), platform_entry),
                ] {
                    match outcome {
                        Ok(_) => succeeded.push(label),
                        Err(e) => failures.push((label, e)),
                    }
                }
                Err(aggregate(failures, succeeded))
            }
        }
    }

    /// Like [`download`](Self::download), giving up with `Cancelled` once
    /// `cancel` completes.
    ///
    /// In-flight installs are dropped: their locks are released and staged
    /// files removed.
    pub async fn download_until<F>(
        &self,
        artifact: &Artifact,
        include_platform: bool,
        force: bool,
        cancel: F,
    ) -> ArtifactResult<DownloadResult>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.download(artifact, include_platform, force) => result,
            () = cancel => {
                info!("Download of {} cancelled", artifact);
                Err(ArtifactError::Cancelled)
            }
        }
    }
}

fn aggregate(failures: Vec<(String, ArtifactError)>, succeeded: Vec<String>) -> ArtifactError {
    ArtifactError::DownloadsFailed {
        failures,
        succeeded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::zip_bytes;
    use crate::lock::LockBackend;
    use crate::source::fake::FakeSource;
    use std::time::Duration;
    use tempfile::TempDir;

    const APP: &str = "https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1/w1";
    const PLATFORM: &str = "https://bcartifacts.blob.core.windows.net/onprem/24.0.1.1/platform";

    fn downloader(root: &TempDir, source: Arc<FakeSource>) -> ArtifactDownloader {
        let mut config = EngineConfig::with_cache_root(root.path());
        config.use_cdn = false;
        config.lock_backend = LockBackend::PidFile;
        ArtifactDownloader::new(&config, source)
    }

    fn published() -> Arc<FakeSource> {
        let source = Arc::new(FakeSource::new());
        source.put(APP, zip_bytes(&[("app.txt", b"app")], &[]));
        source.put(PLATFORM, zip_bytes(&[("platform.txt", b"platform")], &[]));
        source
    }

    #[tokio::test]
    async fn downloads_artifact_with_platform() {
        let temp = TempDir::new().unwrap();
        let source = published();
        let downloader = downloader(&temp, source.clone());

        let result = downloader.download_uri(APP, true, false).await.unwrap();
        let platform = result.platform.unwrap();

        assert!(platform.artifact.is_platform());
        assert_eq!(platform.artifact.version(), result.artifact.artifact.version());
        assert_eq!(platform.artifact.kind(), result.artifact.artifact.kind());
        assert!(result.artifact.path.join("app.txt").is_file());
        assert!(platform.path.join("platform.txt").is_file());
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn platform_artifact_installs_once() {
        let temp = TempDir::new().unwrap();
        let source = published();
        let downloader = downloader(&temp, source.clone());

        let result = downloader.download_uri(PLATFORM, true, false).await.unwrap();
        assert_eq!(result.platform.as_ref(), Some(&result.artifact));
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn without_platform() {
        let temp = TempDir::new().unwrap();
        let source = published();
        let downloader = downloader(&temp, source.clone());

        let result = downloader.download_uri(APP, false, false).await.unwrap();
        assert!(result.platform.is_none());
        assert!(!temp.path().join("onprem/24.0.1.1/platform").exists());
    }

    #[tokio::test]
    async fn download_parts_renders_uri() {
        let temp = TempDir::new().unwrap();
        let source = published();
        let downloader = downloader(&temp, source);

        let result = downloader
            .download_parts(
                StorageAccount::BcArtifacts,
                ArtifactKind::OnPrem,
                ArtifactVersion::new(24, 0, 1, 1),
                "W1",
                true,
                false,
            )
            .await
            .unwrap();
        assert_eq!(result.artifact.path, temp.path().join("onprem").join("24.0.1.1").join("w1"));
    }

    #[tokio::test]
    async fn one_failure_reports_both_outcomes() {
        let temp = TempDir::new().unwrap();
        let source = published();
        source.fail(PLATFORM);
        let downloader = downloader(&temp, source);

        let err = downloader.download_uri(APP, true, false).await.unwrap_err();
        match &err {
            ArtifactError::DownloadsFailed { failures, succeeded } => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].0.contains("platform"));
                assert!(matches!(failures[0].1, ArtifactError::DownloadFailed { .. }));
                assert_eq!(succeeded.len(), 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_retryable());
        // The primary install stands on its own
        assert!(temp.path().join("onprem/24.0.1.1/w1/app.txt").is_file());
    }

    #[tokio::test]
    async fn cancelled_download_leaves_cache_clean() {
        let temp = TempDir::new().unwrap();
        let source = Arc::new(FakeSource::new().with_delay(Duration::from_secs(30)));
        source.put(APP, zip_bytes(&[("app.txt", b"app")], &[]));
        source.put(PLATFORM, zip_bytes(&[("platform.txt", b"platform")], &[]));
        let downloader = downloader(&temp, source);
        let artifact = Artifact::parse(APP).unwrap();

        let err = downloader
            .download_until(&artifact, true, false, tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap_err();

        assert!(matches!(err, ArtifactError::Cancelled));
        let leftovers: Vec<_> = walkdir::WalkDir::new(temp.path())
            .min_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
        assert_eq!(downloader.cache().enumerate().count(), 0);
    }

    #[tokio::test]
    async fn touch_restamps_entries() {
        let temp = TempDir::new().unwrap();
        let downloader = downloader(&temp, published());
        let result = downloader.download_uri(APP, true, false).await.unwrap();

        let at = Utc::now() - chrono::Duration::days(3);
        result.touch(at).await.unwrap();

        let stamped = result.artifact.last_used().await.unwrap().unwrap();
        assert!((stamped - at).num_milliseconds().abs() < 1);
        assert!(result.platform.unwrap().last_used().await.unwrap().is_some());
    }
}
