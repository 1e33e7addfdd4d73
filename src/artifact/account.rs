//! Storage accounts and artifact kinds, plus host rendering
//!
//! The CDN edge table is fixed; an account without an edge falls back to
//! its direct blob storage host.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Suffix of direct blob storage hosts
pub const BLOB_HOST_SUFFIX: &str = "blob.core.windows.net";

/// Remote storage account an artifact is published to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageAccount {
    /// Released builds (the default account)
    #[default]
    BcArtifacts,
    /// Insider builds, sandbox only
    BcInsider,
    /// Public preview builds
    BcPublicPreview,
}

impl StorageAccount {
    /// All known accounts
    pub fn all() -> &'static [Self] {
        &[Self::BcArtifacts, Self::BcInsider, Self::BcPublicPreview]
    }

    /// Lower-case account name as used in host names
    pub fn name(&self) -> &'static str {
        match self {
            Self::BcArtifacts => "bcartifacts",
            Self::BcInsider => "bcinsider",
            Self::BcPublicPreview => "bcpublicpreview",
        }
    }

    /// Azure Front Door edge serving this account, if any
    pub fn cdn_edge(&self) -> Option<&'static str> {
        match self {
            Self::BcArtifacts => Some("exdbf9fwegejdqak.b02.azurefd.net"),
            Self::BcPublicPreview => Some("f2ajahg0e2cudpgh.b02.azurefd.net"),
            Self::BcInsider => Some("fvh2ekdjecfjd6gk.b02.azurefd.net"),
        }
    }

    /// Host serving this account's containers
    pub fn host(&self, use_cdn: bool) -> String {
        match self.cdn_edge() {
            Some(edge) if use_cdn => format!("{}-{}", self.name(), edge),
            _ => format!("{}.{}", self.name(), BLOB_HOST_SUFFIX),
        }
    }

    /// Recover the account from a host name.
    ///
    /// Takes the first DNS label; CDN-fronted hosts carry the account name
    /// before the first `-` of that label.
    pub fn from_host(host: &str) -> Option<Self> {
        let label = host.split('.').next()?;
        let name = label.split('-').next()?;
        name.parse().ok()
    }

    /// Whether the account can host the given kind
    pub fn supports(&self, kind: ArtifactKind) -> bool {
        !matches!(self, Self::BcInsider) || kind == ArtifactKind::Sandbox
    }
}

impl fmt::Display for StorageAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for StorageAccount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|a| a.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown storage account '{s}'"))
    }
}

/// Artifact family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// On-premises builds
    OnPrem,
    /// SaaS builds
    Sandbox,
}

impl ArtifactKind {
    /// All known kinds
    pub fn all() -> &'static [Self] {
        &[Self::OnPrem, Self::Sandbox]
    }

    /// Lower-case name used in URIs and cache paths
    pub fn as_path(&self) -> &'static str {
        match self {
            Self::OnPrem => "onprem",
            Self::Sandbox => "sandbox",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnPrem => write!(f, "OnPrem"),
            Self::Sandbox => write!(f, "Sandbox"),
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.as_path().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown artifact type '{s}'"))
    }
}
