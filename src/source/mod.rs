//! Remote artifact sources
//!
//! Provides a trait for the few remote operations the engine needs, so the
//! installer and catalog can run against blob storage or an in-memory fake.

pub mod http;

pub use http::HttpSource;

use crate::error::ArtifactResult;
use async_trait::async_trait;
use std::fs::File;
use url::Url;

/// Remote storage interface
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Stream the resource at `url` into the open file `dest`, returning
    /// the number of bytes written. Any non-success response is an error.
    /// Dropping the future stops the transfer.
    async fn fetch(&self, url: &Url, dest: File) -> ArtifactResult<u64>;

    /// Fetch a text resource; `None` when it does not exist
    async fn get_text(&self, url: &Url) -> ArtifactResult<Option<String>>;

    /// Names of all blobs in a container, optionally restricted to a prefix
    async fn list_blobs(&self, container: &Url, prefix: Option<&str>) -> ArtifactResult<Vec<String>>;

    /// Human-readable source name for logs
    fn source_name(&self) -> &'static str;
}
