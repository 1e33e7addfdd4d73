//! Blob storage over HTTP
//!
//! Uses a blocking `ureq` agent on tokio's blocking pool. Container listings
//! follow the Azure "List Blobs" protocol, paging with `NextMarker`.

use async_trait::async_trait;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use super::ArtifactSource;
use crate::abort::AbortOnDrop;
use crate::error::{ArtifactError, ArtifactResult};

/// Largest listing page or index document accepted
const MAX_TEXT_BYTES: u64 = 64 * 1024 * 1024;

const CHUNK_BYTES: usize = 64 * 1024;

/// HTTP source for public blob storage
#[derive(Debug, Clone)]
pub struct HttpSource {
    agent: ureq::Agent,
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpSource {
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(Duration::from_secs(30)))
            .timeout_recv_response(Some(Duration::from_secs(120)))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }

    /// Copy the body into `dest` chunk by chunk, giving up with
    /// `Cancelled` once `abort` is raised.
    fn fetch_blocking(
        agent: &ureq::Agent,
        url: &Url,
        dest: File,
        abort: &AtomicBool,
    ) -> ArtifactResult<u64> {
        let response = agent
            .get(url.as_str())
            .call()
            .map_err(|e| ArtifactError::download_failed(url, describe(&e)))?;
        if abort.load(Ordering::Relaxed) {
            return Err(ArtifactError::Cancelled);
        }

        let mut writer = BufWriter::with_capacity(1024 * 1024, dest);
        let mut reader = response.into_body().into_reader();
        let mut buf = vec![0u8; CHUNK_BYTES];
        let mut written = 0u64;

        loop {
            if abort.load(Ordering::Relaxed) {
                debug!("Download of {} abandoned after {} byte(s)", url, written);
                return Err(ArtifactError::Cancelled);
            }
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ArtifactError::download_failed(url, e)),
            };
            writer
                .write_all(&buf[..n])
                .map_err(|e| ArtifactError::io("writing download", e))?;
            written += n as u64;
        }

        writer
            .flush()
            .map_err(|e| ArtifactError::io("writing download", e))?;
        Ok(written)
    }

    fn get_text_blocking(agent: &ureq::Agent, url: &str) -> ArtifactResult<Option<String>> {
        let response = match agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(404)) => return Ok(None),
            Err(e) => return Err(ArtifactError::remote(url, describe(&e))),
        };
        let text = response
            .into_body()
            .with_config()
            .limit(MAX_TEXT_BYTES)
            .read_to_string()
            .map_err(|e| ArtifactError::remote(url, e))?;
        Ok(Some(text))
    }

    fn list_blobs_blocking(
        agent: &ureq::Agent,
        container: &Url,
        prefix: Option<&str>,
    ) -> ArtifactResult<Vec<String>> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut url = container.clone();
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("restype", "container").append_pair("comp", "list");
                if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
                    query.append_pair("prefix", prefix);
                }
                if let Some(marker) = &marker {
                    query.append_pair("marker", marker);
                }
            }

            trace!("Listing {}", url);
            // A missing container lists as empty
            let Some(body) = Self::get_text_blocking(agent, url.as_str())? else {
                break;
            };
            let page = parse_listing(&body).map_err(|e| ArtifactError::remote(&url, e))?;
            names.extend(page.names);

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        debug!("Listed {} blob(s) under {}", names.len(), container);
        Ok(names)
    }
}

#[async_trait]
impl ArtifactSource for HttpSource {
    async fn fetch(&self, url: &Url, dest: File) -> ArtifactResult<u64> {
        let agent = self.agent.clone();
        let url = url.clone();
        // Dropped with this future, which stops the transfer at the next chunk
        let abort = AbortOnDrop::new();
        let flag = abort.flag();
        debug!("Downloading {}", url);
        let result = run_blocking(move || Self::fetch_blocking(&agent, &url, dest, &flag)).await;
        drop(abort);
        result
    }

    async fn get_text(&self, url: &Url) -> ArtifactResult<Option<String>> {
        let agent = self.agent.clone();
        let url = url.to_string();
        run_blocking(move || Self::get_text_blocking(&agent, &url)).await
    }

    async fn list_blobs(&self, container: &Url, prefix: Option<&str>) -> ArtifactResult<Vec<String>> {
        let agent = self.agent.clone();
        let container = container.clone();
        let prefix = prefix.map(str::to_string);
        run_blocking(move || Self::list_blobs_blocking(&agent, &container, prefix.as_deref())).await
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

async fn run_blocking<T, F>(f: F) -> ArtifactResult<T>
where
    F: FnOnce() -> ArtifactResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ArtifactError::io("blocking transfer task", io::Error::other(e)))?
}

fn describe(err: &ureq::Error) -> String {
    match err {
        ureq::Error::StatusCode(code) => format!("HTTP {code}"),
        other => other.to_string(),
    }
}

/// One page of a container listing
#[derive(Debug, Default, PartialEq)]
struct ListingPage {
    names: Vec<String>,
    next_marker: Option<String>,
}

fn parse_listing(xml: &str) -> Result<ListingPage, roxmltree::Error> {
    let doc = roxmltree::Document::parse(xml.trim_start_matches('\u{feff}'))?;

    let names = doc
        .descendants()
        .filter(|n| n.has_tag_name("Blob"))
        .filter_map(|blob| blob.children().find(|c| c.has_tag_name("Name")))
        .filter_map(|name| name.text())
        .map(str::to_string)
        .collect();

    let next_marker = doc
        .descendants()
        .find(|n| n.has_tag_name("NextMarker"))
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    Ok(ListingPage { names, next_marker })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;
    use tempfile::TempDir;

    /// Serve one response that trickles out a large body. Returns the
    /// address and a handle yielding the number of body bytes accepted.
    fn trickle_server(total: usize) -> (String, thread::JoinHandle<usize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }

            let mut stream = stream;
            let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {total}\r\n\r\n");
            stream.write_all(head.as_bytes()).unwrap();
            let chunk = vec![b'x'; CHUNK_BYTES];
            let mut sent = 0;
            while sent < total {
                thread::sleep(Duration::from_millis(10));
                match stream.write_all(&chunk) {
                    Ok(()) => sent += chunk.len(),
                    Err(_) => break,
                }
            }
            sent
        });
        (format!("http://{addr}/sandbox/24.0.1.1/us"), handle)
    }

    #[tokio::test]
    async fn cancelled_fetch_stops_reading_and_leaves_no_file() {
        let temp = TempDir::new().unwrap();
        let total = 400 * CHUNK_BYTES;
        let (url, server) = trickle_server(total);
        let url = Url::parse(&url).unwrap();

        let download = tempfile::Builder::new()
            .prefix(".dl-")
            .suffix(".zip")
            .tempfile_in(temp.path())
            .unwrap();
        let dest = download.as_file().try_clone().unwrap();

        let source = HttpSource::new();
        let cancelled = tokio::time::timeout(Duration::from_millis(200), source.fetch(&url, dest)).await;
        assert!(cancelled.is_err());
        drop(download);

        let sent = tokio::task::spawn_blocking(move || server.join().unwrap())
            .await
            .unwrap();
        assert!(sent < total, "transfer ran to completion after cancel");
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn parse_listing_page_with_marker() {
        let xml = "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?>\
            <EnumerationResults ContainerName=\"https://bcartifacts.blob.core.windows.net/sandbox\">\
              <Prefix>24.0.</Prefix>\
              <Blobs>\
                <Blob><Name>24.0.1.1/us</Name><Properties><Content-Length>10</Content-Length></Properties></Blob>\
                <Blob><Name>24.0.1.1/platform</Name></Blob>\
              </Blobs>\
              <NextMarker>2!96!MDAwMDE</NextMarker>\
            </EnumerationResults>";

        let page = parse_listing(xml).unwrap();
        assert_eq!(page.names, vec!["24.0.1.1/us", "24.0.1.1/platform"]);
        assert_eq!(page.next_marker.as_deref(), Some("2!96!MDAwMDE"));
    }

    #[test]
    fn parse_last_page() {
        let xml = "<EnumerationResults><Blobs/><NextMarker/></EnumerationResults>";
        assert_eq!(parse_listing(xml).unwrap(), ListingPage::default());
    }

    #[test]
    fn parse_garbage_fails() {
        assert!(parse_listing("<EnumerationResults><Blobs>").is_err());
    }
}
