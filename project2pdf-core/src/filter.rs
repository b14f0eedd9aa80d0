//! Exclusion rules for directories and files.
//!
//! A path is excluded when any of its components below the source root is a
//! blacklisted directory name or starts with `.`. The components above the
//! source root are never looked at, so a project that itself lives inside a
//! hidden directory is still converted. Directories found to be excluded are
//! remembered in the [`FilterContext`] for the rest of the run.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Leading character marking hidden entries.
pub const HIDDEN_MARKER: char = '.';

/// Names and extensions excluded from mirroring or conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Blacklist {
    /// Directory names, exact match.
    pub directories: BTreeSet<String>,
    /// File names, exact match.
    pub files: BTreeSet<String>,
    /// File extensions without the dot, case-sensitive.
    pub extensions: BTreeSet<String>,
}

impl Default for Blacklist {
    fn default() -> Self {
        Self {
            directories: BTreeSet::from([".git".to_string()]),
            files: BTreeSet::from([".gitignore".to_string()]),
            extensions: BTreeSet::new(),
        }
    }
}

impl Blacklist {
    /// Merge another blacklist into this one. Entries are only ever added.
    pub fn extend(&mut self, other: Blacklist) {
        self.directories.extend(other.directories);
        self.files.extend(other.files);
        self.extensions.extend(other.extensions);
    }

    fn is_excluded_component(&self, name: &str) -> bool {
        name.starts_with(HIDDEN_MARKER) || self.directories.contains(name)
    }
}

/// Run-scoped filter state, threaded through the walk and the dispatch.
#[derive(Debug, Clone)]
pub struct FilterContext {
    blacklist: Blacklist,
    source_root: PathBuf,
    excluded: Vec<PathBuf>,
}

impl FilterContext {
    pub fn new(source_root: impl Into<PathBuf>, blacklist: Blacklist) -> Self {
        Self {
            blacklist,
            source_root: source_root.into(),
            excluded: Vec::new(),
        }
    }

    /// Directories recorded as excluded so far, in discovery order.
    pub fn excluded_directories(&self) -> &[PathBuf] {
        &self.excluded
    }

    /// Whether `path` must be left out of the mirror.
    ///
    /// Records `path` when it is judged excluded, so the answer for it and
    /// everything beneath it stays `true` for the rest of the run.
    pub fn is_blacklisted_path(&mut self, path: &Path) -> bool {
        if self.is_under_excluded(path) {
            return true;
        }
        if !self.matches_path(path) {
            return false;
        }
        debug!(path = %path.display(), "Recording excluded directory");
        self.excluded.push(path.to_path_buf());
        true
    }

    /// The pure part of [`is_blacklisted_path`](Self::is_blacklisted_path),
    /// without consulting or updating the recorded exclusions.
    pub fn matches_path(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.source_root) {
            Ok(relative) => relative.components().any(|component| match component {
                Component::Normal(name) => self
                    .blacklist
                    .is_excluded_component(&name.to_string_lossy()),
                _ => false,
            }),
            // Outside the root only the base name and the parent name are known.
            Err(_) => {
                let base = path.file_name().map(|n| n.to_string_lossy());
                let parent = path
                    .parent()
                    .and_then(Path::file_name)
                    .map(|n| n.to_string_lossy());
                base.is_some_and(|b| self.blacklist.is_excluded_component(&b))
                    || parent.is_some_and(|p| self.blacklist.directories.contains(&*p))
            }
        }
    }

    /// Whether a file with this name must not be converted.
    ///
    /// Names that are not valid UTF-8 can only match by extension.
    pub fn is_blacklisted_file(&self, name: impl AsRef<OsStr>) -> bool {
        let name = name.as_ref();
        if name.to_str().is_some_and(|n| self.blacklist.files.contains(n)) {
            return true;
        }
        Path::new(name)
            .extension()
            .map(|ext| self.blacklist.extensions.contains(&*ext.to_string_lossy()))
            .unwrap_or(false)
    }

    fn is_under_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|dir| path.starts_with(dir))
    }
}
