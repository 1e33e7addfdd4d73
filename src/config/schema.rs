//! Configuration schema for bcart
//!
//! Configuration is stored at `~/.config/bcartifacts/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::artifact::{StorageAccount, DEFAULT_COUNTRY};
use crate::catalog::ListingStrategy;
use crate::config::engine::{default_cache_root, EngineConfig};
use crate::lock::LockBackend;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Local cache settings
    pub cache: CacheConfig,

    /// Remote catalog settings
    pub catalog: CatalogConfig,
}

impl Config {
    /// Engine settings described by this configuration
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            cache_root: self.cache.root.clone().unwrap_or_else(default_cache_root),
            lock_backend: self.cache.lock_backend,
            use_cdn: self.catalog.use_cdn,
            listing: self.catalog.listing,
        }
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Local cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root; the platform default when unset
    pub root: Option<PathBuf>,

    /// Install lock mechanism
    pub lock_backend: LockBackend,

    /// `cleanup` removes entries unused for this many days
    pub cleanup_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            lock_backend: LockBackend::default(),
            cleanup_days: 30,
        }
    }
}

/// Remote catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Download through the CDN
    pub use_cdn: bool,

    /// How remote artifacts are discovered
    pub listing: ListingStrategy,

    /// Account used when none is given
    pub default_account: StorageAccount,

    /// Country used when none is given
    pub default_country: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            use_cdn: true,
            listing: ListingStrategy::default(),
            default_account: StorageAccount::default(),
            default_country: DEFAULT_COUNTRY.to_string(),
        }
    }
}
