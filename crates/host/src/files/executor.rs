//! The four file operations behind the channel.
//!
//! Each operation takes a relay-relative path, resolves it through
//! [`PathResolver`] and works on the resulting absolute path. Operations are
//! synchronous; the controller dispatches them off the message-receive path.

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use protocol::FileEntry;

use super::{FsError, PathResolver};

/// Executes list/read/write/delete against the shared root.
#[derive(Debug, Clone)]
pub struct FileOperationExecutor {
    resolver: PathResolver,
}

impl FileOperationExecutor {
    /// Creates an executor over the given resolver.
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// The resolver guarding this executor.
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Lists a directory.
    ///
    /// Entries carry relay-relative paths a viewer can send back verbatim.
    /// Entries whose metadata cannot be read are skipped. Ordering is
    /// unspecified at this layer; sorting is a presentation concern.
    pub fn list(&self, relative: &str) -> Result<Vec<FileEntry>, FsError> {
        let dir = self.resolver.resolve(relative)?;
        let metadata = fs::metadata(&dir).map_err(|e| FsError::from_io(e, &dir))?;
        if !metadata.is_dir() {
            return Err(FsError::NotADirectory(dir));
        }

        let mut entries = Vec::new();
        let read_dir = fs::read_dir(&dir).map_err(|e| FsError::from_io(e, &dir))?;
        for entry in read_dir {
            let Ok(entry) = entry else { continue };
            let Ok(metadata) = entry.metadata() else {
                continue;
            };

            let name = entry.file_name().to_string_lossy().to_string();
            let Ok(path) = self.resolver.to_relative(&entry.path()) else {
                continue;
            };

            let is_directory = metadata.is_dir();
            entries.push(FileEntry {
                name,
                path,
                is_directory,
                size: (!is_directory).then(|| metadata.len()),
                modified: metadata.modified().ok().and_then(epoch_seconds),
            });
        }

        debug!(path = %dir.display(), count = entries.len(), "listed directory");
        Ok(entries)
    }

    /// Reads a whole file into memory.
    pub fn read(&self, relative: &str) -> Result<Vec<u8>, FsError> {
        let path = self.resolver.resolve(relative)?;
        if path.is_dir() {
            return Err(FsError::IsADirectory(path));
        }
        fs::read(&path).map_err(|e| FsError::from_io(e, &path))
    }

    /// Creates or overwrites a file with the given bytes.
    ///
    /// Parent directories are not auto-created; a missing parent is
    /// `NotFound`. The write is atomic from a reader's perspective: bytes go
    /// to a temp file in the destination's directory, then a rename makes
    /// them visible, so a concurrent list or read never sees a partial file.
    pub fn write(&self, relative: &str, bytes: &[u8]) -> Result<(), FsError> {
        let path = self.resolver.resolve_for_creation(relative)?;
        if path.is_dir() {
            return Err(FsError::IsADirectory(path));
        }

        let parent = path.parent().unwrap_or_else(|| self.resolver.root());
        let file_name = path.file_name().unwrap_or_default().to_string_lossy();
        let temp_path = parent.join(format!(".{}.{:08x}.tmp", file_name, rand::random::<u32>()));

        fs::write(&temp_path, bytes).map_err(|e| FsError::from_io(e, &temp_path))?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(FsError::from_io(e, &path));
        }

        debug!(path = %path.display(), bytes = bytes.len(), "wrote file");
        Ok(())
    }

    /// Deletes a single file.
    ///
    /// Directory deletion is outside the channel's message set, so a
    /// directory target is `IsADirectory`.
    pub fn delete(&self, relative: &str) -> Result<(), FsError> {
        let path = self.resolver.resolve(relative)?;
        if path.is_dir() {
            return Err(FsError::IsADirectory(path));
        }
        fs::remove_file(&path).map_err(|e| FsError::from_io(e, &path))?;
        debug!(path = %path.display(), "deleted file");
        Ok(())
    }
}

fn epoch_seconds(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, FileOperationExecutor) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("notes.txt"), "Hi").unwrap();
        fs::write(dir.path().join("docs/readme.md"), "# readme").unwrap();
        let executor = FileOperationExecutor::new(PathResolver::new(dir.path()).unwrap());
        (dir, executor)
    }

    #[test]
    fn test_list_root() {
        let (_dir, executor) = fixture();
        let mut entries = executor.list("").unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "docs");
        assert!(entries[0].is_directory);
        assert!(entries[0].size.is_none());
        assert_eq!(entries[1].name, "notes.txt");
        assert!(!entries[1].is_directory);
        assert_eq!(entries[1].size, Some(2));
        assert!(entries[1].modified.is_some());
    }

    #[test]
    fn test_list_entries_are_direct_children() {
        let (_dir, executor) = fixture();
        let resolver = executor.resolver().clone();
        for entry in executor.list("").unwrap() {
            let resolved = resolver.resolve(&entry.path).unwrap();
            assert_eq!(resolved.parent().unwrap(), resolver.root());
        }
    }

    #[test]
    fn test_list_subdirectory_paths_are_relative() {
        let (_dir, executor) = fixture();
        let entries = executor.list("docs").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "docs/readme.md");
    }

    #[test]
    fn test_list_missing_and_file_targets() {
        let (_dir, executor) = fixture();
        assert!(matches!(
            executor.list("missing"),
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(
            executor.list("notes.txt"),
            Err(FsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_read_file() {
        let (_dir, executor) = fixture();
        assert_eq!(executor.read("notes.txt").unwrap(), b"Hi");
    }

    #[test]
    fn test_read_errors() {
        let (_dir, executor) = fixture();
        assert!(matches!(
            executor.read("missing.txt"),
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(
            executor.read("docs"),
            Err(FsError::IsADirectory(_))
        ));
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let (_dir, executor) = fixture();
        let payload = b"round trip \x00\xff bytes";
        executor.write("docs/data.bin", payload).unwrap();
        assert_eq!(executor.read("docs/data.bin").unwrap(), payload);
    }

    #[test]
    fn test_write_empty_file() {
        let (_dir, executor) = fixture();
        executor.write("empty.txt", b"").unwrap();
        assert_eq!(executor.read("empty.txt").unwrap(), b"");
    }

    #[test]
    fn test_write_overwrites() {
        let (_dir, executor) = fixture();
        executor.write("notes.txt", b"replaced").unwrap();
        assert_eq!(executor.read("notes.txt").unwrap(), b"replaced");
    }

    #[test]
    fn test_write_missing_parent() {
        let (_dir, executor) = fixture();
        let result = executor.write("nowhere/file.txt", b"x");
        assert!(matches!(result, Err(FsError::NotFound(_))));
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let (dir, executor) = fixture();
        executor.write("fresh.txt", b"content").unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {leftovers:?}");
    }

    #[test]
    fn test_write_escape_rejected() {
        let (_dir, executor) = fixture();
        let result = executor.write("../escape.txt", b"x");
        assert!(matches!(result, Err(FsError::PathEscape(_))));
    }

    #[test]
    fn test_delete_file() {
        let (_dir, executor) = fixture();
        executor.delete("notes.txt").unwrap();
        assert!(matches!(
            executor.read("notes.txt"),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_missing_leaves_siblings() {
        let (_dir, executor) = fixture();
        let before: Vec<_> = executor.list("").unwrap();

        let result = executor.delete("missing.txt");
        assert!(matches!(result, Err(FsError::NotFound(_))));

        let after: Vec<_> = executor.list("").unwrap();
        assert_eq!(before.len(), after.len());
    }

    #[test]
    fn test_delete_directory_rejected() {
        let (_dir, executor) = fixture();
        assert!(matches!(
            executor.delete("docs"),
            Err(FsError::IsADirectory(_))
        ));
    }

    #[test]
    fn test_delete_then_list_no_longer_shows_entry() {
        let (_dir, executor) = fixture();
        executor.delete("notes.txt").unwrap();
        let names: Vec<_> = executor
            .list("")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert!(!names.contains(&"notes.txt".to_string()));
    }
}
