//! Directory mirroring: reproduce the source tree's directories under the
//! destination root, top-down, skipping excluded subtrees.
//!
//! The walk is driven one directory at a time through [`MirrorWalk::next_step`]
//! so the caller can dispatch a directory's files before the walk moves on.
//! Children of a directory are only queued once its destination exists.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::filter::FilterContext;

/// Appended to the source root's name to form the default destination root.
pub const DESTINATION_SUFFIX: &str = "_pdf";

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("path {path} is not under source root {root}")]
    NotUnderRoot { path: PathBuf, root: PathBuf },
    #[error("failed to remove stale directory {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to list directory {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

/// One entry met while walking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub path: PathBuf,
    pub kind: NodeKind,
}

/// `<root>_pdf`, next to the source root.
pub fn default_destination_root(source_root: &Path) -> PathBuf {
    let mut name: OsString = source_root
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(DESTINATION_SUFFIX);
    source_root.with_file_name(name)
}

/// Map `source_path` to its place under `destination_root`.
pub fn map_path(
    source_root: &Path,
    destination_root: &Path,
    source_path: &Path,
) -> Result<PathBuf, MirrorError> {
    let relative = source_path
        .strip_prefix(source_root)
        .map_err(|_| MirrorError::NotUnderRoot {
            path: source_path.to_path_buf(),
            root: source_root.to_path_buf(),
        })?;
    Ok(destination_root.join(relative))
}

/// Create `path` empty, deleting whatever was there before.
pub fn build_directory(path: &Path) -> Result<(), MirrorError> {
    if path.exists() {
        info!(path = %path.display(), "Deleting old destination directory");
        fs::remove_dir_all(path).map_err(|source| MirrorError::Remove {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::create_dir(path).map_err(|source| MirrorError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Created destination directory");
    Ok(())
}

/// List a directory's entries, sorted by name.
///
/// Symlinked directories are not followed; symlinks to files are listed as
/// files.
pub fn list_entries(dir: &Path) -> Result<Vec<TreeNode>, MirrorError> {
    let list_err = |source| MirrorError::List {
        path: dir.to_path_buf(),
        source,
    };
    let mut nodes = Vec::new();
    for entry in fs::read_dir(dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %path.display(), error = ?e, "Cannot stat entry, ignoring it");
                continue;
            }
        };
        let kind = if file_type.is_dir() {
            NodeKind::Directory
        } else if file_type.is_file() {
            NodeKind::File
        } else if file_type.is_symlink() && path.is_file() {
            NodeKind::File
        } else {
            debug!(path = %path.display(), "Ignoring entry that is neither file nor directory");
            continue;
        };
        nodes.push(TreeNode { path, kind });
    }
    nodes.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(nodes)
}

/// A directory whose destination now exists, ready for dispatch.
#[derive(Debug, Clone)]
pub struct MirroredDirectory {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// File names as listed, not re-encoded.
    pub files: Vec<OsString>,
}

/// What the walk did with the next directory.
#[derive(Debug)]
pub enum WalkStep {
    Mirrored(MirroredDirectory),
    Skipped(PathBuf),
    Failed { path: PathBuf, error: MirrorError },
}

/// Source and destination roots of one run.
#[derive(Debug, Clone)]
pub struct DirectoryMirror {
    source_root: PathBuf,
    destination_root: PathBuf,
}

impl DirectoryMirror {
    pub fn new(source_root: impl Into<PathBuf>, destination_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            destination_root: destination_root.into(),
        }
    }

    /// Recreate the destination root empty.
    pub fn prepare(&self) -> Result<(), MirrorError> {
        build_directory(&self.destination_root)
    }

    /// Destination for a visited directory, created fresh unless it is the root.
    pub fn mirror_directory(&self, dir: &Path) -> Result<PathBuf, MirrorError> {
        if dir == self.source_root {
            return Ok(self.destination_root.clone());
        }
        let destination = map_path(&self.source_root, &self.destination_root, dir)?;
        build_directory(&destination)?;
        Ok(destination)
    }

    /// Start a top-down walk from the source root.
    pub fn walk(&self) -> MirrorWalk<'_> {
        MirrorWalk {
            mirror: self,
            pending: vec![self.source_root.clone()],
        }
    }
}

/// Pre-order walk over the source tree.
#[derive(Debug)]
pub struct MirrorWalk<'a> {
    mirror: &'a DirectoryMirror,
    pending: Vec<PathBuf>,
}

impl MirrorWalk<'_> {
    /// Mirror the next directory, or `None` once the tree is exhausted.
    pub fn next_step(&mut self, filter: &mut FilterContext) -> Option<WalkStep> {
        let dir = self.pending.pop()?;

        if filter.is_blacklisted_path(&dir) {
            info!(path = %dir.display(), "Skipping excluded directory");
            return Some(WalkStep::Skipped(dir));
        }

        let destination = match self.mirror.mirror_directory(&dir) {
            Ok(destination) => destination,
            Err(error) => {
                error!(path = %dir.display(), error = %error, "Failed to mirror directory");
                return Some(WalkStep::Failed { path: dir, error });
            }
        };

        let entries = match list_entries(&dir) {
            Ok(entries) => entries,
            Err(error) => {
                error!(path = %dir.display(), error = %error, "Failed to read source directory");
                return Some(WalkStep::Failed { path: dir, error });
            }
        };

        let mut files = Vec::new();
        let mut children = Vec::new();
        for node in entries {
            match node.kind {
                NodeKind::Directory => children.push(node.path),
                NodeKind::File => {
                    if let Some(name) = node.path.file_name() {
                        files.push(name.to_os_string());
                    }
                }
            }
        }
        // Reversed so the first child in name order is popped first.
        self.pending.extend(children.into_iter().rev());

        Some(WalkStep::Mirrored(MirroredDirectory {
            source: dir,
            destination,
            files,
        }))
    }
}
