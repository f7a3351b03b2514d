//! Applying a change list to the WordPress content roots

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::deploy::unpack::ExtractedTree;
use crate::errors::AgentError;
use crate::models::deployment::ChangeList;

/// Which content root a change path belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Plugin,
    Theme,
    MuPlugin,
    Unrecognized,
}

const PREFIXES: [(&str, ContentKind); 3] = [
    ("plugins/", ContentKind::Plugin),
    ("themes/", ContentKind::Theme),
    ("mu-plugins/", ContentKind::MuPlugin),
];

/// Classify a change path by its longest matching prefix.
///
/// Returns the kind and the path relative to the content root. Paths that
/// would escape the root (absolute, `..`, empty remainder) are unrecognized.
pub fn classify(entry: &str) -> (ContentKind, &str) {
    let matched = PREFIXES
        .iter()
        .filter(|(prefix, _)| entry.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len());

    let Some((prefix, kind)) = matched else {
        return (ContentKind::Unrecognized, entry);
    };

    let rest = &entry[prefix.len()..];
    let confined = !rest.is_empty()
        && Path::new(rest)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

    if confined {
        (*kind, rest)
    } else {
        (ContentKind::Unrecognized, entry)
    }
}

/// Destination base directories, one per recognized prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRoots {
    pub plugins: PathBuf,
    pub themes: PathBuf,
    pub mu_plugins: PathBuf,
}

impl ContentRoots {
    pub fn root(&self, kind: ContentKind) -> Option<&Path> {
        match kind {
            ContentKind::Plugin => Some(&self.plugins),
            ContentKind::Theme => Some(&self.themes),
            ContentKind::MuPlugin => Some(&self.mu_plugins),
            ContentKind::Unrecognized => None,
        }
    }

    /// Destination path for a change entry, if it is recognized
    pub fn destination(&self, entry: &str) -> Option<PathBuf> {
        let (kind, rest) = classify(entry);
        self.root(kind).map(|root| root.join(rest))
    }
}

/// What `apply` did with the change list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub copied: Vec<String>,
    pub deleted: Vec<String>,
    /// Absent from both the snapshot and the destination
    pub unchanged: Vec<String>,
    pub skipped: Vec<String>,
}

/// Copy or delete every change entry, in order.
///
/// Entries present in the snapshot are copied over their destination;
/// entries absent from it are deleted from the destination. The first
/// failure stops the loop; entries already processed stay applied.
pub async fn apply(
    tree: &ExtractedTree,
    changes: &ChangeList,
    roots: &ContentRoots,
) -> Result<ApplyReport, AgentError> {
    if changes.is_empty() {
        return Err(AgentError::EmptyChangeSet);
    }

    let mut report = ApplyReport::default();

    for entry in changes.iter() {
        let Some(dest) = roots.destination(entry) else {
            warn!("Skipping {}: not under a recognized content root", entry);
            report.skipped.push(entry.to_string());
            continue;
        };
        let src = tree.resolve(entry);

        if fs::metadata(&src).await.is_ok() {
            ensure_parent(&dest).await?;
            fs::copy(&src, &dest).await.map_err(|e| AgentError::Copy {
                path: dest.clone(),
                source: e,
            })?;
            debug!("Copied {} -> {}", entry, dest.display());
            report.copied.push(entry.to_string());
        } else if fs::symlink_metadata(&dest).await.is_ok() {
            fs::remove_file(&dest).await.map_err(|e| AgentError::Delete {
                path: dest.clone(),
                source: e,
            })?;
            debug!("Deleted {}", dest.display());
            report.deleted.push(entry.to_string());
        } else {
            debug!("{} is absent from both snapshot and destination", entry);
            report.unchanged.push(entry.to_string());
        }
    }

    info!(
        "Applied changes: {} copied, {} deleted, {} skipped",
        report.copied.len(),
        report.deleted.len(),
        report.skipped.len()
    );
    Ok(report)
}

async fn ensure_parent(dest: &Path) -> Result<(), AgentError> {
    let Some(parent) = dest.parent() else {
        return Ok(());
    };
    if fs::metadata(parent).await.is_ok() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);

    builder.create(parent).await.map_err(|e| AgentError::CreateDir {
        path: parent.to_path_buf(),
        source: e,
    })
}
