//! HTTP client implementation

use std::path::Path;
use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};
use url::Url;

use crate::errors::AgentError;
use crate::utils::{hex_encode, version_info};

/// Size and checksum of a payload streamed to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDigest {
    pub sha256: String,
    pub size: u64,
}

/// HTTP client for the GitHub REST API
pub struct HttpClient {
    client: Client,
    base_url: Url,
}

impl HttpClient {
    /// Create a new HTTP client.
    ///
    /// `timeout` bounds each request from connect to the end of the body.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AgentError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AgentError::ConfigError(format!("invalid API base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AgentError::ConfigError(format!(
                "invalid API base URL {base_url}"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(version_info().user_agent())
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Build an endpoint URL by appending path segments to the base URL
    pub fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET `url` and stream the body into `dest`.
    ///
    /// Only a `200 OK` counts as success; every other outcome, including
    /// transport errors and local write failures, is a fetch error.
    pub async fn download_to_file(
        &self,
        url: Url,
        token: &str,
        dest: &Path,
    ) -> Result<ArchiveDigest, AgentError> {
        debug!("GET {}", url);

        let mut response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(AgentError::fetch_transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            error!("HTTP GET failed: {}", status);
            return Err(AgentError::fetch_status(status.as_u16()));
        }

        let mut file = fs::File::create(dest)
            .await
            .map_err(AgentError::fetch_transport)?;
        let mut hasher = Sha256::new();
        let mut size = 0u64;

        while let Some(chunk) = response.chunk().await.map_err(AgentError::fetch_transport)? {
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(AgentError::fetch_transport)?;
            size += chunk.len() as u64;
        }
        file.sync_all().await.map_err(AgentError::fetch_transport)?;

        Ok(ArchiveDigest {
            sha256: hex_encode(hasher.finalize()),
            size,
        })
    }
}
