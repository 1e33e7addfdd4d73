//! Error types for bc-artifacts
//!
//! All modules use `ArtifactResult<T>` as their return type.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for artifact operations
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// All errors that can occur while resolving, downloading or caching artifacts
#[derive(Error, Debug)]
pub enum ArtifactError {
    // Identity and usage errors
    #[error("'{input}' is not a valid artifact identity: {reason}")]
    InvalidIdentity { input: String, reason: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    // Transfer and install errors
    #[error("Download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Install into {path} failed: {reason}")]
    InstallFailed { path: PathBuf, reason: String },

    #[error("Cannot tell whether process {pid} holding lock {path} is still alive")]
    LockOrphanRecoveryFailure { path: PathBuf, pid: u32 },

    #[error("{}", FailureList(.failures))]
    DownloadsFailed {
        failures: Vec<(String, ArtifactError)>,
        succeeded: Vec<String>,
    },

    #[error("Remote request to {url} failed: {reason}")]
    Remote { url: String, reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

struct FailureList<'a>(&'a [(String, ArtifactError)]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} download(s) failed", self.0.len())?;
        for (label, err) in self.0 {
            write!(f, "; {}: {}", label, err)?;
        }
        Ok(())
    }
}

impl ArtifactError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid identity error
    pub fn invalid_identity(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a download failure
    pub fn download_failed(url: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::DownloadFailed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an install failure
    pub fn install_failed(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::InstallFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a remote (catalog transport) failure
    pub fn remote(url: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Remote {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Check if the caller may safely retry the failed operation
    ///
    /// Retryable failures never leave partial state behind in the cache.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::DownloadFailed { .. }
            | Self::InstallFailed { .. }
            | Self::Remote { .. }
            | Self::Cancelled => true,
            Self::DownloadsFailed { failures, .. } => {
                failures.iter().all(|(_, err)| err.is_retryable())
            }
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidIdentity { .. } => {
                Some("Expected https://<account>.blob.core.windows.net/<type>/<version>/<country>")
            }
            Self::UnsupportedOperation(_) => {
                Some("bcinsider only hosts sandbox artifacts; next-major/next-minor need --account bcinsider")
            }
            Self::DownloadFailed { .. } | Self::Remote { .. } => {
                Some("Nothing was installed; it is safe to run the command again")
            }
            Self::InstallFailed { .. } => Some("The archive may be corrupt; retry with --force"),
            Self::DownloadsFailed { .. } if self.is_retryable() => {
                Some("Nothing partial was installed; it is safe to run the command again")
            }
            _ => None,
        }
    }
}
