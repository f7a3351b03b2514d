//! Shared fixtures for the integration tests

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use gitdeploy::deploy::apply::ContentRoots;
use gitdeploy::deploy::fetch::ArchiveSource;
use gitdeploy::deploy::orchestrator::Deployer;
use gitdeploy::errors::AgentError;
use gitdeploy::http::client::ArchiveDigest;
use gitdeploy::models::deployment::RepoRef;
use gitdeploy::storage::history::MemoryHistory;
use gitdeploy::storage::state::MemoryConfigStore;

pub const SNAPSHOT_ROOT: &str = "acme-repo-abcdef123";

/// Build an in-memory zip. Names ending in `/` become directory entries.
pub fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
    }

    writer.finish().unwrap().into_inner()
}

/// A GitHub-style zipball: everything nested under `SNAPSHOT_ROOT/`
pub fn github_zipball(files: &[(&str, &str)]) -> Vec<u8> {
    let root = format!("{}/", SNAPSHOT_ROOT);
    let nested: Vec<(String, &str)> = files
        .iter()
        .map(|(name, contents)| (format!("{}{}", root, name), *contents))
        .collect();

    let mut entries: Vec<(&str, &str)> = vec![(root.as_str(), "")];
    entries.extend(nested.iter().map(|(name, contents)| (name.as_str(), *contents)));
    build_zip(&entries)
}

/// Archive source that serves a prepared body, or fails
pub struct FakeSource {
    body: Option<Vec<u8>>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn serving(body: Vec<u8>) -> Self {
        Self {
            body: Some(body),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            body: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveSource for FakeSource {
    async fn download(
        &self,
        _repo: &RepoRef,
        _token: &SecretString,
        dest: &Path,
    ) -> Result<ArchiveDigest, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.body {
            Some(body) => {
                tokio::fs::write(dest, body)
                    .await
                    .map_err(AgentError::fetch_transport)?;
                Ok(ArchiveDigest {
                    sha256: String::new(),
                    size: body.len() as u64,
                })
            }
            None => {
                // Leave a partial file behind like an interrupted download would
                let _ = tokio::fs::write(dest, b"partial").await;
                Err(AgentError::fetch_status(403))
            }
        }
    }
}

/// Temporary WordPress install plus pull directory
pub struct Site {
    pub tmp: tempfile::TempDir,
}

impl Site {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        for dir in ["wp-content/plugins", "wp-content/themes", "wp-content/mu-plugins", "pull"] {
            std::fs::create_dir_all(tmp.path().join(dir)).unwrap();
        }
        Self { tmp }
    }

    pub fn content(&self, rel: &str) -> PathBuf {
        self.tmp.path().join("wp-content").join(rel)
    }

    pub fn pull_dir(&self) -> PathBuf {
        self.tmp.path().join("pull")
    }

    pub fn roots(&self) -> ContentRoots {
        ContentRoots {
            plugins: self.content("plugins"),
            themes: self.content("themes"),
            mu_plugins: self.content("mu-plugins"),
        }
    }

    pub fn pull_entries(&self) -> usize {
        std::fs::read_dir(self.pull_dir()).unwrap().count()
    }
}

/// A deployer wired to in-memory config and history
pub fn deployer(
    site: &Site,
    setup_complete: bool,
    source: Arc<dyn ArchiveSource>,
) -> (Deployer, Arc<MemoryConfigStore>, Arc<MemoryHistory>) {
    let config = Arc::new(MemoryConfigStore::new(setup_complete, "acme", "ghp_test", "repo", "main"));
    let history = Arc::new(MemoryHistory::new());
    let deployer = Deployer::new(
        config.clone(),
        source,
        history.clone(),
        site.pull_dir(),
        site.roots(),
    );
    (deployer, config, history)
}
