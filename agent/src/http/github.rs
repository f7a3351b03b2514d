//! GitHub snapshot downloads

use std::path::Path;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::deploy::fetch::ArchiveSource;
use crate::errors::AgentError;
use crate::http::client::{ArchiveDigest, HttpClient};
use crate::models::deployment::RepoRef;

impl HttpClient {
    /// `{base}/repos/{owner}/{repo}/zipball/{branch}`
    pub fn zipball_url(&self, repo: &RepoRef) -> Url {
        let mut segments = vec!["repos", repo.owner.as_str(), repo.name.as_str(), "zipball"];
        // Branch names like `release/1.2` map onto nested path segments
        segments.extend(repo.branch.split('/').filter(|s| !s.is_empty()));
        self.endpoint(segments)
    }
}

#[async_trait]
impl ArchiveSource for HttpClient {
    async fn download(
        &self,
        repo: &RepoRef,
        token: &SecretString,
        dest: &Path,
    ) -> Result<ArchiveDigest, AgentError> {
        let url = self.zipball_url(repo);
        self.download_to_file(url, token.expose_secret(), dest).await
    }
}
