//! Host-side filesystem access.
//!
//! [`PathResolver`] maps relay-relative paths onto the shared root with
//! containment guarantees; [`FileOperationExecutor`] performs the four file
//! operations against resolved paths. Nothing else in the host touches the
//! filesystem on behalf of a viewer.

mod executor;
mod resolver;

pub use executor::FileOperationExecutor;
pub use resolver::PathResolver;

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from the filesystem layer.
///
/// These are recovered locally and answered as structured failure payloads
/// over the channel; they never close it.
#[derive(Debug, Error)]
pub enum FsError {
    /// The path resolves outside the shared root.
    #[error("path escapes the shared directory: {0}")]
    PathEscape(PathBuf),

    /// The path does not exist (or, for writes, its parent does not).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// A directory operation was aimed at a file.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A file operation was aimed at a directory.
    #[error("is a directory: {0}")]
    IsADirectory(PathBuf),

    /// The host process lacks permission.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Any other IO failure.
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    /// Maps an IO error to the taxonomy, keeping the offending path.
    pub(crate) fn from_io(source: std::io::Error, path: &Path) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => FsError::PermissionDenied(path.to_path_buf()),
            _ => FsError::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}
