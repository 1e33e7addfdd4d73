//! bcart configuration
//!
//! The engine itself only takes an [`EngineConfig`]. This module owns the
//! CLI's TOML file and the environment overrides layered on top of it.

pub mod engine;
pub mod schema;

pub use engine::{default_cache_root, EngineConfig};
pub use schema::Config;

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{ArtifactError, ArtifactResult};

/// Environment variable overriding the cache root
pub const CACHE_ENV: &str = "BCART_CACHE";

/// Locates and reads the configuration file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Use `explicit` when given, the per-user config file otherwise
    pub fn locate(explicit: Option<PathBuf>) -> Self {
        Self {
            path: explicit.unwrap_or_else(Self::user_config_path),
        }
    }

    /// `<config dir>/bcartifacts/config.toml`
    pub fn user_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bcartifacts")
            .join("config.toml")
    }

    /// Path of the configuration file, whether or not it exists
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file (defaults when it is missing) and apply environment
    /// overrides
    pub async fn load(&self) -> ArtifactResult<Config> {
        let mut config = match fs::read_to_string(&self.path).await {
            Ok(content) => parse(&self.path, &content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", self.path.display());
                Config::default()
            }
            Err(e) => {
                return Err(ArtifactError::io(
                    format!("reading config {}", self.path.display()),
                    e,
                ))
            }
        };
        apply_env(&mut config);
        Ok(config)
    }
}

fn parse(path: &Path, content: &str) -> ArtifactResult<Config> {
    toml::from_str(content).map_err(|e| ArtifactError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.message().to_string(),
    })
}

fn apply_env(config: &mut Config) {
    if let Some(root) = std::env::var_os(CACHE_ENV).filter(|v| !v.is_empty()) {
        debug!("Cache root taken from {}", CACHE_ENV);
        config.cache.root = Some(PathBuf::from(root));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[tokio::test]
    #[serial]
    async fn missing_file_yields_defaults() {
        std::env::remove_var(CACHE_ENV);
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::locate(Some(temp.path().join("absent.toml")));

        let config = manager.load().await.unwrap();
        assert_eq!(config.catalog.default_country, "w1");
        assert!(config.cache.root.is_none());
    }

    #[tokio::test]
    #[serial]
    async fn file_values_are_used() {
        std::env::remove_var(CACHE_ENV);
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[cache]\ncleanup_days = 7\n\n[catalog]\nuse_cdn = false\n").unwrap();

        let config = ConfigManager::locate(Some(path)).load().await.unwrap();
        assert_eq!(config.cache.cleanup_days, 7);
        assert!(!config.catalog.use_cdn);
    }

    #[tokio::test]
    #[serial]
    async fn env_overrides_cache_root() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[cache]\nroot = \"/from/file\"\n").unwrap();

        std::env::set_var(CACHE_ENV, temp.path().join("from-env"));
        let config = ConfigManager::locate(Some(path)).load().await.unwrap();
        std::env::remove_var(CACHE_ENV);

        assert_eq!(config.engine().cache_root, temp.path().join("from-env"));
    }

    #[tokio::test]
    #[serial]
    async fn malformed_file_names_its_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[cache\nroot=").unwrap();

        let err = ConfigManager::locate(Some(path.clone())).load().await.unwrap_err();
        match err {
            ArtifactError::ConfigInvalid { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn user_path_is_namespaced() {
        assert!(ConfigManager::user_config_path().ends_with("bcartifacts/config.toml"));
    }
}
