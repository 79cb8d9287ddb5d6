//! Resolution of relay-relative paths against the shared root.
//!
//! Every path a viewer sends is relative to the host's registered root.
//! [`PathResolver`] is the sole access-control boundary: it turns such a path
//! into an absolute one under the root or fails with [`FsError::PathEscape`],
//! and every filesystem touch in the executor goes through it first.

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::FsError;

/// Maps relay-relative paths to absolute paths under one registered root.
///
/// The root is canonicalized once at construction and never changes for the
/// lifetime of a session.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Creates a resolver for the given root directory.
    ///
    /// The root must exist and be a directory; it is canonicalized so later
    /// containment checks compare real paths, not textual ones.
    pub fn new(root: &Path) -> Result<Self, FsError> {
        let canonical = fs::canonicalize(root).map_err(|e| FsError::from_io(e, root))?;
        if !canonical.is_dir() {
            return Err(FsError::NotADirectory(canonical));
        }
        Ok(Self { root: canonical })
    }

    /// The canonical root all paths resolve under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a relay-relative path to an absolute path under the root.
    ///
    /// The empty string and `"/"` refer to the root itself. Traversal
    /// escapes are rejected lexically before any filesystem call; symlink
    /// escapes are rejected after canonicalization. Absolute inputs are
    /// rejected unless they canonicalize to the root itself.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, FsError> {
        if Path::new(relative).is_absolute() {
            return self.resolve_absolute(relative);
        }

        let normalized = self.normalize(relative)?;
        if normalized.as_os_str().is_empty() {
            return Ok(self.root.clone());
        }

        let joined = self.root.join(&normalized);
        let canonical = fs::canonicalize(&joined).map_err(|e| FsError::from_io(e, &joined))?;
        if !canonical.starts_with(&self.root) {
            return Err(FsError::PathEscape(PathBuf::from(relative)));
        }
        Ok(canonical)
    }

    /// Resolves a relay-relative path whose final component may not exist
    /// yet, for writes.
    ///
    /// The parent directory must exist and resolve under the root; a missing
    /// parent is `NotFound` (parents are never auto-created). The file name
    /// itself must be a plain component.
    pub fn resolve_for_creation(&self, relative: &str) -> Result<PathBuf, FsError> {
        let normalized = self.normalize(relative)?;
        let file_name = normalized
            .file_name()
            .ok_or_else(|| FsError::PathEscape(PathBuf::from(relative)))?
            .to_owned();

        let parent_rel = normalized
            .parent()
            .map(|p| p.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/"))
            .unwrap_or_default();
        let parent = self.resolve(&parent_rel)?;
        if !parent.is_dir() {
            return Err(FsError::NotADirectory(parent));
        }

        Ok(parent.join(file_name))
    }

    /// Converts an absolute path back to its relay-relative form.
    pub fn to_relative(&self, absolute: &Path) -> Result<String, FsError> {
        let stripped = absolute
            .strip_prefix(&self.root)
            .map_err(|_| FsError::PathEscape(absolute.to_path_buf()))?;
        Ok(stripped
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"))
    }

    /// Lexically normalizes a relative input: splits on `/`, drops empty and
    /// `.` segments, applies `..` by popping. Popping past the root is an
    /// escape, detected without touching the filesystem.
    fn normalize(&self, relative: &str) -> Result<PathBuf, FsError> {
        let mut parts: Vec<&str> = Vec::new();
        for segment in relative.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if parts.pop().is_none() {
                        return Err(FsError::PathEscape(PathBuf::from(relative)));
                    }
                }
                other => parts.push(other),
            }
        }
        Ok(parts.iter().collect())
    }

    /// Some clients send the absolute root path for the opening listing, so
    /// an absolute input is accepted when it is the root itself and an
    /// escape otherwise.
    fn resolve_absolute(&self, input: &str) -> Result<PathBuf, FsError> {
        let path = Path::new(input);
        // Reject traversal components outright; canonicalizing attacker
        // input would touch paths outside the root.
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(FsError::PathEscape(path.to_path_buf()));
        }
        match fs::canonicalize(path) {
            Ok(canonical) if canonical == self.root => Ok(canonical),
            _ => Err(FsError::PathEscape(path.to_path_buf())),
        }
    }
}
