//! Deployment models

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source label attached to every outcome produced by this agent
pub const OUTCOME_SOURCE: &str = "GitHub -> WP";

/// Repository coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    /// Repository owner (user or organization)
    pub owner: String,

    /// Repository name
    pub name: String,

    /// Branch to snapshot
    pub branch: String,
}

/// Stored GitHub credentials
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub token: SecretString,
    pub repository: String,
    pub branch: String,
}

impl Credentials {
    /// Repository coordinates described by these credentials
    pub fn repo(&self) -> RepoRef {
        RepoRef {
            owner: self.username.clone(),
            name: self.repository.clone(),
            branch: self.branch.clone(),
        }
    }
}

/// Ordered, de-duplicated repository-relative change paths
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeList(Vec<String>);

impl ChangeList {
    /// Build a change list from raw trigger input.
    ///
    /// Entries are trimmed, empty entries dropped, duplicates removed (first
    /// occurrence wins) and anything under `self_path` excluded.
    pub fn from_paths<I, S>(paths: I, self_path: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let self_path = self_path.trim_end_matches('/');
        let mut seen = HashSet::new();
        let mut changes = Vec::new();

        for path in paths {
            let path = path.as_ref().trim();
            if path.is_empty() {
                continue;
            }
            if is_under(path, self_path) {
                continue;
            }
            if seen.insert(path.to_string()) {
                changes.push(path.to_string());
            }
        }

        Self(changes)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// JSON array form stored in outcome records
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }
}

/// `path` is `dir` itself or lies inside it; `foo-pro/` is not under `foo`
fn is_under(path: &str, dir: &str) -> bool {
    !dir.is_empty()
        && path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Everything one deployment run needs to fetch and apply
#[derive(Debug)]
pub struct DeploymentRequest {
    pub repo: RepoRef,
    pub token: SecretString,
    pub changes: ChangeList,
}

impl DeploymentRequest {
    pub fn new(credentials: Credentials, changes: ChangeList) -> Self {
        Self {
            repo: credentials.repo(),
            token: credentials.token,
            changes,
        }
    }
}

/// Final deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStatus {
    Success,
    Failed,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentStatus::Success => write!(f, "Success"),
            DeploymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Outcome recorded once per deployment run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentOutcome {
    /// Run identifier
    pub id: Uuid,

    /// When the outcome was produced
    pub recorded_at: DateTime<Utc>,

    pub status: DeploymentStatus,

    /// Always `OUTCOME_SOURCE` for outcomes produced here
    pub source: String,

    /// Empty on success, otherwise the first failure encountered
    pub reason: String,

    /// JSON-serialized change list that was attempted
    pub changes: String,
}

impl DeploymentOutcome {
    pub fn success(id: Uuid, changes: &ChangeList) -> Self {
        Self::new(id, DeploymentStatus::Success, String::new(), changes.to_json())
    }

    pub fn failed(id: Uuid, reason: impl Into<String>, changes: &ChangeList) -> Self {
        Self::new(id, DeploymentStatus::Failed, reason.into(), changes.to_json())
    }

    fn new(id: Uuid, status: DeploymentStatus, reason: String, changes: String) -> Self {
        Self {
            id,
            recorded_at: Utc::now(),
            status,
            source: OUTCOME_SOURCE.to_string(),
            reason,
            changes,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DeploymentStatus::Success
    }
}
