//! Published index documents
//!
//! Containers that publish indexes carry `indexes/countries.json` (an array
//! of country names) and one `indexes/<country>.json` per country listing its
//! versions.

use serde::Deserialize;
use url::Url;

use crate::artifact::ArtifactVersion;
use crate::error::{ArtifactError, ArtifactResult};
use crate::source::ArtifactSource;

/// One version in a country index
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexEntry {
    #[serde(rename = "Version")]
    pub version: ArtifactVersion,
    /// Publication time as written by the publisher
    #[serde(rename = "CreationTime", default)]
    pub creation_time: Option<String>,
}

/// URL of an index document below a container
pub fn index_url(container: &Url, document: &str) -> ArtifactResult<Url> {
    let text = format!(
        "{}/indexes/{}.json",
        container.as_str().trim_end_matches('/'),
        document.to_lowercase()
    );
    Url::parse(&text).map_err(|e| ArtifactError::remote(text, e))
}

/// Countries listed in the container's country index
pub async fn fetch_countries(source: &dyn ArtifactSource, container: &Url) -> ArtifactResult<Vec<String>> {
    fetch_document(source, &index_url(container, "countries")?).await
}

/// Versions published for one country; empty when the index is missing
pub async fn fetch_country(
    source: &dyn ArtifactSource,
    container: &Url,
    country: &str,
) -> ArtifactResult<Vec<IndexEntry>> {
    fetch_document(source, &index_url(container, country)?).await
}

async fn fetch_document<T>(source: &dyn ArtifactSource, url: &Url) -> ArtifactResult<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let Some(text) = source.get_text(url).await? else {
        return Ok(Vec::new());
    };
    serde_json::from_str(text.trim_start_matches('\u{feff}'))
        .map_err(|e| ArtifactError::remote(url, format!("malformed index: {e}")))
}
