//! Snapshot extraction and root promotion
//!
//! GitHub zipballs wrap the repository in a single generated directory
//! (`{owner}-{repo}-{sha}/`). After extraction that directory's contents are
//! promoted so the extraction directory mirrors the repository root.

use std::error::Error as StdError;
use std::io::{self, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;
use zip::ZipArchive;

use crate::errors::AgentError;
use crate::filesys::dir::Dir;

/// Normalized snapshot contents, owned by one deployment run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTree {
    root: PathBuf,
}

impl ExtractedTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a repository-relative entry inside the tree
    pub fn resolve(&self, entry: &str) -> PathBuf {
        self.root.join(entry)
    }
}

/// Directory an archive is extracted into: `{dest_dir}/{archive stem}`
pub fn extraction_dir(archive: &Path, dest_dir: &Path) -> PathBuf {
    let stem = archive
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    dest_dir.join(stem)
}

/// Extract `archive` under `dest_dir` and promote its single root directory.
pub async fn unpack(archive: &Path, dest_dir: &Path) -> Result<ExtractedTree, AgentError> {
    let target = extraction_dir(archive, dest_dir);
    info!("Extracting {} into {}", archive.display(), target.display());

    let entries = extract_zip(archive.to_path_buf(), target.clone()).await?;
    debug!("Extracted {} archive entries", entries);

    let mut roots = Dir::new(&target)
        .list_dirs()
        .await
        .map_err(|e| AgentError::Extract {
            archive: archive.to_path_buf(),
            source: Box::new(e),
        })?;

    let snapshot_root = match roots.len() {
        0 => return Err(AgentError::EmptyArchive),
        1 => roots.remove(0),
        n => return Err(AgentError::AmbiguousArchive(n)),
    };

    // Move the root aside first so a child sharing its name cannot collide
    let staged = target.join(format!(".snapshot-{}", Uuid::new_v4()));
    fs::rename(&snapshot_root, &staged)
        .await
        .map_err(|e| AgentError::PromoteMove {
            name: snapshot_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            source: e,
        })?;

    let moved = promote(&staged, &target).await?;
    Dir::new(&staged).delete().await?;

    if moved == 0 {
        return Err(AgentError::EmptyArchive);
    }

    Ok(ExtractedTree::new(target))
}

/// Move every immediate child of `source_dir` into `target_dir`.
///
/// Existing entries with the same name are replaced. The first child that
/// cannot be moved aborts the promotion. Returns the number of children moved.
pub async fn promote(source_dir: &Path, target_dir: &Path) -> Result<usize, AgentError> {
    if !Dir::new(source_dir).exists().await {
        return Err(AgentError::PromoteSourceMissing(source_dir.to_path_buf()));
    }

    let scan_err = |e: io::Error| AgentError::PromoteScan {
        dir: source_dir.to_path_buf(),
        source: e,
    };

    let mut children = Vec::new();
    let mut entries = fs::read_dir(source_dir).await.map_err(scan_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(scan_err)? {
        children.push(entry.file_name());
    }

    for name in &children {
        let from = source_dir.join(name);
        let to = target_dir.join(name);
        let display_name = name.to_string_lossy().into_owned();

        replace_into(&from, &to)
            .await
            .map_err(|e| AgentError::PromoteMove {
                name: display_name.clone(),
                source: e,
            })?;
        debug!("Promoted {}", display_name);
    }

    Ok(children.len())
}

async fn replace_into(from: &Path, to: &Path) -> io::Result<()> {
    match fs::symlink_metadata(to).await {
        Ok(meta) if meta.is_dir() => {
            Dir::new(to)
                .delete()
                .await
                .map_err(|e| io::Error::new(ErrorKind::Other, e.to_string()))?;
        }
        Ok(_) => fs::remove_file(to).await?,
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    fs::rename(from, to).await
}

async fn extract_zip(archive: PathBuf, target: PathBuf) -> Result<usize, AgentError> {
    let archive_path = archive.clone();
    let result = tokio::task::spawn_blocking(move || extract_zip_blocking(&archive, &target)).await;

    match result {
        Ok(Ok(count)) => Ok(count),
        Ok(Err(source)) => Err(AgentError::Extract {
            archive: archive_path,
            source,
        }),
        Err(join) => Err(AgentError::Extract {
            archive: archive_path,
            source: Box::new(join),
        }),
    }
}

fn extract_zip_blocking(
    archive: &Path,
    target: &Path,
) -> Result<usize, Box<dyn StdError + Send + Sync>> {
    let file = std::fs::File::open(archive)?;
    let mut zip = ZipArchive::new(BufReader::new(file))?;
    std::fs::create_dir_all(target)?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;

        // Reject absolute paths and `..` traversal
        let Some(relative) = entry.enclosed_name() else {
            return Err(Box::new(io::Error::new(
                ErrorKind::InvalidData,
                format!("archive entry {:?} escapes the extraction directory", entry.name()),
            )));
        };
        let out_path = target.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            let mode = (mode & 0o777) | 0o600;
            std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))?;
        }
    }

    Ok(zip.len())
}
