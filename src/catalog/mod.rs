//! Remote artifact catalog
//!
//! Answers "which artifacts exist" for one kind on one storage account,
//! either by listing the container or by reading its published indexes,
//! and picks the latest or upcoming versions from the result.

pub mod index;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::artifact::{
    Artifact, ArtifactKind, ArtifactVersion, StorageAccount, PLATFORM_COUNTRY,
};
use crate::cache::local::LocalCache;
use crate::error::{ArtifactError, ArtifactResult};
use crate::source::ArtifactSource;

/// Country whose Sandbox builds on the default account define the current version
const BASELINE_COUNTRY: &str = "base";

/// How the remote artifact set is discovered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStrategy {
    /// Enumerate blob names in the container
    #[default]
    Container,
    /// Read `indexes/*.json` documents
    Index,
}

impl fmt::Display for ListingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container => write!(f, "container"),
            Self::Index => write!(f, "index"),
        }
    }
}

/// Catalog of the artifacts of one kind on one account
#[derive(Clone)]
pub struct ArtifactCatalog {
    kind: ArtifactKind,
    account: StorageAccount,
    use_cdn: bool,
    strategy: ListingStrategy,
    source: Arc<dyn ArtifactSource>,
    local: LocalCache,
}

impl ArtifactCatalog {
    /// Create a catalog; fails for account/kind pairs that cannot exist
    pub fn new(
        kind: ArtifactKind,
        account: StorageAccount,
        source: Arc<dyn ArtifactSource>,
        local: LocalCache,
    ) -> ArtifactResult<Self> {
        if !account.supports(kind) {
            return Err(ArtifactError::UnsupportedOperation(format!(
                "{account} only hosts sandbox artifacts"
            )));
        }
        Ok(Self {
            kind,
            account,
            use_cdn: false,
            strategy: ListingStrategy::default(),
            source,
            local,
        })
    }

    /// Render artifact URIs through the CDN
    pub fn with_cdn(mut self, use_cdn: bool) -> Self {
        self.use_cdn = use_cdn;
        self
    }

    pub fn with_strategy(mut self, strategy: ListingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn account(&self) -> StorageAccount {
        self.account
    }

    /// Same settings, other account and kind
    fn sibling(&self, kind: ArtifactKind, account: StorageAccount) -> ArtifactResult<Self> {
        Ok(Self::new(kind, account, self.source.clone(), self.local.clone())?
            .with_cdn(self.use_cdn)
            .with_strategy(self.strategy))
    }

    /// Container URL; listings always go to blob storage directly
    fn container_uri(&self) -> ArtifactResult<Url> {
        let text = Artifact::account_uri(self.account, self.kind, false);
        Url::parse(&text).map_err(|e| ArtifactError::remote(text, e))
    }

    fn artifact(&self, version: ArtifactVersion, country: &str) -> Option<Artifact> {
        Artifact::from_parts(self.account, self.kind, version, country, self.use_cdn).ok()
    }

    /// All remote artifacts matching the filters
    pub async fn list_all(
        &self,
        version_prefix: Option<&str>,
        country: Option<&str>,
    ) -> ArtifactResult<Vec<Artifact>> {
        let found = match self.strategy {
            ListingStrategy::Container => self.list_container(version_prefix).await?,
            ListingStrategy::Index => self.list_indexes(country).await?,
        };
        debug!(
            "{} {} lists {} artifact(s) via {}",
            self.account,
            self.kind,
            found.len(),
            self.strategy
        );
        Ok(Self::filter(found, version_prefix, country))
    }

    async fn list_container(&self, version_prefix: Option<&str>) -> ArtifactResult<Vec<Artifact>> {
        let container = self.container_uri()?;
        let names = self.source.list_blobs(&container, version_prefix).await?;

        Ok(names
            .iter()
            .filter_map(|name| {
                let mut parts = name.rsplit('/').filter(|p| !p.is_empty());
                let country = parts.next()?;
                let version = parts.next()?.parse().ok()?;
                self.artifact(version, country)
            })
            .collect())
    }

    async fn list_indexes(&self, country: Option<&str>) -> ArtifactResult<Vec<Artifact>> {
        let container = self.container_uri()?;
        let source = self.source.as_ref();

        let countries = match country.filter(|c| !c.is_empty()) {
            Some(country) => vec![country.to_lowercase()],
            None => {
                let mut all = index::fetch_countries(source, &container).await?;
                if !all.iter().any(|c| c.eq_ignore_ascii_case(PLATFORM_COUNTRY)) {
                    all.push(PLATFORM_COUNTRY.to_string());
                }
                all
            }
        };

        let fetches = countries
            .iter()
            .map(|c| index::fetch_country(source, &container, c));
        let results = join_all(fetches).await;

        let mut found = Vec::new();
        for (country, entries) in countries.iter().zip(results) {
            found.extend(
                entries?
                    .into_iter()
                    .filter_map(|entry| self.artifact(entry.version, country)),
            );
        }
        Ok(found)
    }

    /// Keep items whose version starts with `version_prefix` and whose
    /// country equals `country` ignoring case. Empty filters match everything.
    pub fn filter(
        items: impl IntoIterator<Item = Artifact>,
        version_prefix: Option<&str>,
        country: Option<&str>,
    ) -> Vec<Artifact> {
        let prefix = version_prefix.unwrap_or_default().to_lowercase();
        let country = country.unwrap_or_default();
        items
            .into_iter()
            .filter(|a| country.is_empty() || a.country().eq_ignore_ascii_case(country))
            .filter(|a| a.version().to_string().to_lowercase().starts_with(&prefix))
            .collect()
    }

    /// Matching artifacts from the local cache or the remote account
    pub async fn all(
        &self,
        version_prefix: Option<&str>,
        country: Option<&str>,
        local: bool,
    ) -> ArtifactResult<Vec<Artifact>> {
        if local {
            let cached: Vec<Artifact> = self.local.enumerate_kind(self.kind).collect();
            return Ok(Self::filter(cached, version_prefix, country));
        }
        self.list_all(version_prefix, country).await
    }

    /// The highest matching version.
    ///
    /// With `prefer_local`, a match in the local cache is returned without
    /// asking the remote at all.
    pub async fn latest(
        &self,
        version_prefix: Option<&str>,
        country: Option<&str>,
        prefer_local: bool,
    ) -> ArtifactResult<Option<Artifact>> {
        if prefer_local {
            let cached = self.all(version_prefix, country, true).await?;
            if let Some(hit) = newest(cached) {
                debug!("Latest {} found locally: {}", self.kind, hit);
                return Ok(Some(hit));
            }
        }
        Ok(newest(self.all(version_prefix, country, false).await?))
    }

    /// Version of the newest Sandbox `base` build on the default account
    pub async fn current_version(&self) -> ArtifactResult<Option<ArtifactVersion>> {
        let baseline = self.sibling(ArtifactKind::Sandbox, StorageAccount::BcArtifacts)?;
        let latest = baseline.latest(None, Some(BASELINE_COUNTRY), false).await?;
        Ok(latest.map(|a| a.version()))
    }

    /// Newest build of the next major version
    pub async fn next_major(&self, country: Option<&str>) -> ArtifactResult<Option<Artifact>> {
        self.require_insider("next-major")?;
        let Some(base) = self.current_version().await? else {
            return Ok(None);
        };
        let prefix = format!("{}.", base.major() + 1);
        self.newest_upcoming(&prefix, country).await
    }

    /// Newest build of the next minor version
    pub async fn next_minor(&self, country: Option<&str>) -> ArtifactResult<Option<Artifact>> {
        self.require_insider("next-minor")?;
        let Some(base) = self.current_version().await? else {
            return Ok(None);
        };
        let prefix = format!("{}.{}.", base.major(), base.minor() + 1);
        self.newest_upcoming(&prefix, country).await
    }

    fn require_insider(&self, operation: &str) -> ArtifactResult<()> {
        if self.account != StorageAccount::BcInsider {
            return Err(ArtifactError::UnsupportedOperation(format!(
                "{operation} is only available on {}",
                StorageAccount::BcInsider
            )));
        }
        Ok(())
    }

    /// Compare public preview and insider builds; preview wins ties
    async fn newest_upcoming(&self, prefix: &str, country: Option<&str>) -> ArtifactResult<Option<Artifact>> {
        let preview = self.sibling(self.kind, StorageAccount::BcPublicPreview)?;
        let (preview, insider) = tokio::join!(
            preview.latest(Some(prefix), country, false),
            self.latest(Some(prefix), country, false)
        );

        Ok(match (preview?, insider?) {
            (Some(p), Some(i)) if p.version() >= i.version() => Some(p),
            (p, None) => p,
            (_, i) => i,
        })
    }

    /// Countries published for this kind and account, without `platform`
    pub async fn countries(&self) -> ArtifactResult<Vec<String>> {
        let names: Vec<String> = match self.strategy {
            ListingStrategy::Index => {
                index::fetch_countries(self.source.as_ref(), &self.container_uri()?).await?
            }
            ListingStrategy::Container => self
                .list_all(None, None)
                .await?
                .into_iter()
                .map(|a| a.country().to_string())
                .collect(),
        };

        let set: BTreeSet<String> = names
            .into_iter()
            .map(|c| c.to_lowercase())
            .filter(|c| c != PLATFORM_COUNTRY)
            .collect();
        Ok(set.into_iter().collect())
    }

    /// Remote platform artifacts matching the prefix
    pub async fn platforms(&self, version_prefix: Option<&str>) -> ArtifactResult<Vec<Artifact>> {
        self.all(version_prefix, Some(PLATFORM_COUNTRY), false).await
    }
}

fn newest(items: Vec<Artifact>) -> Option<Artifact> {
    items.into_iter().max_by_key(|a| a.version())
}
