//! Lock file primitives for single-instance enforcement.
//!
//! The lock is an `fs2` advisory lock on a file in the runtime directory. The
//! lock is held for as long as the [`LockFile`] lives; dropping it releases the
//! lock and removes the file.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::constants::LOCK_FILE_NAME;
use crate::common::utils::runtime_dir;

/// An exclusively locked file.
#[derive(Debug)]
pub struct LockFile {
    pub(crate) file: File,
    pub(crate) path: PathBuf,
}

impl LockFile {
    /// Try to take the lock without blocking.
    ///
    /// Returns `Ok(None)` when another process holds it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        // Open without truncating: the holder's contents must survive a failed attempt
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(_) => Ok(None),
        }
    }

    /// Replace the lock file contents.
    pub fn write(&mut self, contents: &str) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file
            .write_all(contents.as_bytes())
            .context("Failed to write lock file")?;
        self.file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Path of the daemon lock file.
pub fn get_main_lock_path() -> PathBuf {
    runtime_dir().join(LOCK_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("duskshift.lock");

        let mut first = LockFile::try_acquire(&path).unwrap().unwrap();
        first.write("1234\n").unwrap();
        assert!(LockFile::try_acquire(&path).unwrap().is_none());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1234\n");
    }

    #[test]
    fn test_drop_releases_and_removes() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("duskshift.lock");

        {
            let _lock = LockFile::try_acquire(&path).unwrap().unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
        assert!(LockFile::try_acquire(&path).unwrap().is_some());
    }
}
