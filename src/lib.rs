//! bc-artifacts - BC artifact acquisition and local cache
//!
//! Resolves artifact identities to blob storage locations, downloads and
//! unpacks them exactly once across concurrent processes, and evicts cache
//! entries that were not used recently.

mod abort;
pub mod archive;
pub mod artifact;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod install;
pub mod lock;
pub mod process;
pub mod source;
pub mod ui;

pub use artifact::{Artifact, ArtifactKind, ArtifactVersion, StorageAccount};
pub use cache::{CacheEntry, CacheJanitor, CleanupReport, LocalCache};
pub use catalog::{ArtifactCatalog, ListingStrategy};
pub use config::EngineConfig;
pub use download::{ArtifactDownloader, DownloadResult};
pub use error::{ArtifactError, ArtifactResult};
pub use install::Installer;
pub use lock::{InstallLock, InstallLockGuard, LockBackend};
pub use source::{ArtifactSource, HttpSource};
