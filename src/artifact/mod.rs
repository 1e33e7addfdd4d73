//! Artifact identities
//!
//! An [`Artifact`] names one installable package: storage account, kind,
//! version and country. It is parsed from a remote URI or from a path inside
//! the local cache, and is never mutated afterwards.

pub mod account;
pub mod version;

pub use account::{ArtifactKind, StorageAccount};
pub use version::ArtifactVersion;

use crate::error::{ArtifactError, ArtifactResult};
use serde::Serialize;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Country identifier of locale-independent platform artifacts
pub const PLATFORM_COUNTRY: &str = "platform";

/// Default country when none is given
pub const DEFAULT_COUNTRY: &str = "w1";

/// Suffix marking in-flight staging directories next to cache entries
pub const STAGING_SUFFIX: &str = "_dl";

/// A BC artifact identity
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    account: Option<StorageAccount>,
    kind: ArtifactKind,
    version: ArtifactVersion,
    country: String,
    uri: Option<Url>,
}

impl Artifact {
    /// Parse an artifact from its remote URI.
    ///
    /// Accepts direct blob storage hosts as well as CDN-fronted hosts.
    pub fn from_uri(uri: &Url) -> ArtifactResult<Self> {
        let invalid = |reason: String| ArtifactError::invalid_identity(uri.as_str(), reason);

        let host = uri
            .host_str()
            .ok_or_else(|| invalid("URI has no host".to_string()))?;
        let account = StorageAccount::from_host(host)
            .ok_or_else(|| invalid(format!("host '{host}' is not a known storage account")))?;

        let segments: Vec<&str> = uri
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        let [kind, version, country] = segments.as_slice() else {
            return Err(invalid(format!(
                "expected <type>/<version>/<country>, found {} path segment(s)",
                segments.len()
            )));
        };

        let kind: ArtifactKind = kind.parse().map_err(invalid)?;
        let version: ArtifactVersion = version.parse().map_err(invalid)?;
        validate_country(country).map_err(invalid)?;
        if !account.supports(kind) {
            return Err(invalid(format!("{account} only hosts sandbox artifacts")));
        }

        Ok(Self {
            account: Some(account),
            kind,
            version,
            country: country.to_ascii_lowercase(),
            uri: Some(uri.clone()),
        })
    }

    /// Parse an artifact from a URI string
    pub fn parse(uri: &str) -> ArtifactResult<Self> {
        let url = Url::parse(uri).map_err(|e| ArtifactError::invalid_identity(uri, e.to_string()))?;
        Self::from_uri(&url)
    }

    /// Reconstruct an artifact from its folder inside the cache root.
    ///
    /// Returns `None` for anything that is not a `<kind>/<version>/<country>`
    /// folder, so callers can skip unrelated directories.
    pub fn from_local_folder(root: &Path, folder: &Path) -> Option<Self> {
        let relative = folder.strip_prefix(root).ok()?;
        let parts = relative
            .components()
            .map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        let [kind, version, country] = parts.as_slice() else {
            return None;
        };
        if is_staging_name(country) {
            return None;
        }
        validate_country(country).ok()?;

        Some(Self {
            account: None,
            kind: kind.parse().ok()?,
            version: version.parse().ok()?,
            country: country.to_ascii_lowercase(),
            uri: None,
        })
    }

    /// Build an artifact from explicit parts, rendering its URI
    pub fn from_parts(
        account: StorageAccount,
        kind: ArtifactKind,
        version: ArtifactVersion,
        country: &str,
        use_cdn: bool,
    ) -> ArtifactResult<Self> {
        let uri = Self::make_uri(account, kind, version, country, use_cdn)?;
        Self::from_uri(&uri)
    }

    /// Render `https://{host}/{kind}/{version}/{country}`, lower-cased
    pub fn make_uri(
        account: StorageAccount,
        kind: ArtifactKind,
        version: ArtifactVersion,
        country: &str,
        use_cdn: bool,
    ) -> ArtifactResult<Url> {
        validate_country(country).map_err(|r| ArtifactError::invalid_identity(country, r))?;
        if !account.supports(kind) {
            return Err(ArtifactError::UnsupportedOperation(format!(
                "{account} does not host {kind} artifacts"
            )));
        }
        let text = format!(
            "{}/{}/{}",
            Self::account_uri(account, kind, use_cdn),
            version,
            country
        )
        .to_lowercase();
        Url::parse(&text).map_err(|e| ArtifactError::invalid_identity(text, e.to_string()))
    }

    /// Container URI for an account and kind, e.g. `https://bcartifacts.blob.core.windows.net/onprem`
    pub fn account_uri(account: StorageAccount, kind: ArtifactKind, use_cdn: bool) -> String {
        format!("https://{}/{}", account.host(use_cdn), kind.as_path())
    }

    /// Rewrite a direct blob storage artifact URI to go through the CDN.
    ///
    /// URIs whose host is not a known account are returned unchanged.
    pub fn cdn_uri(uri: &Url) -> Url {
        let Some(account) = uri.host_str().and_then(StorageAccount::from_host) else {
            return uri.clone();
        };
        let mut rewritten = uri.clone();
        if rewritten.set_host(Some(&account.host(true))).is_err() {
            return uri.clone();
        }
        rewritten
    }

    /// The platform artifact belonging to this artifact.
    ///
    /// Platform artifacts return themselves.
    pub fn platform_artifact(&self) -> ArtifactResult<Self> {
        if self.is_platform() {
            return Ok(self.clone());
        }
        Self::from_parts(
            self.account.unwrap_or_default(),
            self.kind,
            self.version,
            PLATFORM_COUNTRY,
            false,
        )
    }

    /// Whether this is a locale-independent platform artifact
    pub fn is_platform(&self) -> bool {
        self.country.eq_ignore_ascii_case(PLATFORM_COUNTRY)
    }

    /// Storage account; `None` for artifacts found in the local cache
    pub fn account(&self) -> Option<StorageAccount> {
        self.account
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn version(&self) -> ArtifactVersion {
        self.version
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    /// Remote URI, when the artifact was derived from one
    pub fn uri(&self) -> Option<&Url> {
        self.uri.as_ref()
    }

    /// The remote URI, or one rendered for the default account
    pub fn download_uri(&self, use_cdn: bool) -> ArtifactResult<Url> {
        match &self.uri {
            Some(uri) if use_cdn => Ok(Self::cdn_uri(uri)),
            Some(uri) => Ok(uri.clone()),
            None => Self::make_uri(
                self.account.unwrap_or_default(),
                self.kind,
                self.version,
                &self.country,
                use_cdn,
            ),
        }
    }

    /// Path of this artifact relative to the cache root
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.kind.as_path())
            .join(self.version.to_string())
            .join(&self.country)
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.account == other.account
            && self.kind == other.kind
            && self.version == other.version
            && self.country.eq_ignore_ascii_case(&other.country)
    }
}

impl Eq for Artifact {}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.version, self.country)
    }
}

/// Whether a directory name is an in-flight staging directory
pub fn is_staging_name(name: &str) -> bool {
    name.contains(STAGING_SUFFIX)
}

fn validate_country(country: &str) -> Result<(), String> {
    if country.is_empty() {
        return Err("country is empty".to_string());
    }
    if country == "." || country == ".." || country.contains(&['/', '\\', ':'][..]) {
        return Err(format!("'{country}' is not a valid country"));
    }
    if is_staging_name(country) {
        return Err(format!("'{country}' collides with staging directory names"));
    }
    Ok(())
}
