//! Settings handed to the engine
//!
//! The engine never reads configuration files itself; callers build an
//! [`EngineConfig`] and pass it in.

use serde::Serialize;
use std::path::PathBuf;

use crate::catalog::ListingStrategy;
use crate::lock::LockBackend;

/// Folder name of the cache below the platform cache directory
const CACHE_DIR_NAME: &str = "bcartifacts.cache";

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    /// Root of the artifact cache
    pub cache_root: PathBuf,
    pub lock_backend: LockBackend,
    /// Render download URIs through the CDN
    pub use_cdn: bool,
    pub listing: ListingStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            lock_backend: LockBackend::default(),
            use_cdn: true,
            listing: ListingStrategy::default(),
        }
    }
}

impl EngineConfig {
    /// Default settings with another cache root
    pub fn with_cache_root(root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: root.into(),
            ..Self::default()
        }
    }
}

/// Platform default cache root.
///
/// `C:\bcartifacts.cache` on Windows, shared with other tooling; the user
/// cache directory elsewhere.
pub fn default_cache_root() -> PathBuf {
    if cfg!(windows) {
        return PathBuf::from(r"C:\").join(CACHE_DIR_NAME);
    }
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
}
