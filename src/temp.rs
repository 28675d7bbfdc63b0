//! Temporary directory management module
//!
//! This module provides RAII-based temporary directory handling with automatic cleanup.

use std::fs;
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Guard for temporary resources that automatically cleans up on drop
#[derive(Debug)]
pub(crate) enum TempGuard {
    /// Temporary directory that will be removed with its contents when dropped
    Directory(PathBuf),
}

impl TempGuard {
    /// Get the path to the temporary resource
    pub(crate) fn path(&self) -> &Path {
        match self {
            TempGuard::Directory(path) => path,
        }
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        match self {
            TempGuard::Directory(path) => {
                // Silently ignore errors during cleanup
                let _ = fs::remove_dir_all(path);
            }
        }
    }
}

impl Deref for TempGuard {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.path()
    }
}

/// Creates a temporary directory and returns a guard that will remove it on drop
///
/// The directory is created in the system's temporary directory with a unique
/// name generated using ULID (monotonic, sortable unique identifier).
///
/// # Examples
///
/// ```ignore
/// let profile = create_temp_dir("browser-profile").unwrap();
/// // Directory and everything written into it is removed when profile goes out of scope
/// ```
pub(crate) fn create_temp_dir(prefix: &str) -> io::Result<TempGuard> {
    let ulid = ulid::Ulid::new();
    let path = std::env::temp_dir().join(format!("{}_{}", prefix, ulid));

    fs::create_dir(&path)?;

    Ok(TempGuard::Directory(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_temp_dir() {
        let temp = create_temp_dir("test").unwrap();
        let path = temp.path().to_path_buf();

        assert!(path.is_dir());
        assert!(path.is_absolute());

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("test_"));

        drop(temp);
        assert!(!path.exists());
    }

    #[test]
    fn test_contents_removed_on_drop() {
        let path = {
            let temp = create_temp_dir("cleanup_test").unwrap();
            fs::write(temp.join("Cookies"), "data").unwrap();
            temp.path().to_path_buf()
        };

        assert!(!path.exists());
    }

    #[test]
    fn test_multiple_temp_dirs_unique() {
        let first = create_temp_dir("test").unwrap();
        let second = create_temp_dir("test").unwrap();

        assert_ne!(first.path(), second.path());
    }
}
