//! `DiskIO` contract and local filesystem implementation
//!
//! Every write that must survive a crash goes through
//! [`DiskIo::write_atomic`]: write to a temp path on the same
//! filesystem, `fsync` the file, rename into place, then `fsync` the
//! containing directory so the rename itself is durable.

use objectio_common::{DiskId, Error, Result};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Metadata about a stored file, returned by [`DiskIo::stat`].
#[derive(Clone, Copy, Debug)]
pub struct FileStat {
    pub size: u64,
    pub modified_unix_ms: i64,
}

/// The downstream contract the core depends on. Every method is
/// parameterized by a path relative to the disk's data root; the
/// implementation owns translating that into an absolute path.
pub trait DiskIo: Send + Sync {
    fn disk_id(&self) -> DiskId;

    /// Atomically write `data` to `rel_path`, creating parent
    /// directories as needed.
    fn write_atomic(&self, rel_path: &Path, data: &[u8]) -> Result<()>;

    /// Write `data` to a temp path alongside `final_rel_path`'s parent
    /// directory and fsync it, without making it visible yet. Returns a
    /// handle to pass to [`DiskIo::commit`] or [`DiskIo::abort_stage`].
    fn stage(&self, final_rel_path: &Path, data: &[u8]) -> Result<PathBuf>;

    /// Atomically rename a staged temp path into place and fsync the
    /// containing directory.
    fn commit(&self, staged: &Path, final_rel_path: &Path) -> Result<()>;

    /// Remove a staged temp path that will not be committed.
    fn abort_stage(&self, staged: &Path) -> Result<()>;

    fn read(&self, rel_path: &Path) -> Result<Vec<u8>>;

    fn remove(&self, rel_path: &Path) -> Result<()>;

    /// List entries (file names only, not full paths) directly inside
    /// `rel_dir`. Returns an empty vector if the directory is absent.
    fn enumerate(&self, rel_dir: &Path) -> Result<Vec<String>>;

    fn stat(&self, rel_path: &Path) -> Result<FileStat>;

    /// Fsync the containing directory so a prior rename's directory
    /// entry is durable.
    fn sync_dir(&self, rel_dir: &Path) -> Result<()>;

    fn exists(&self, rel_path: &Path) -> bool;
}

/// `DiskIo` backed by a POSIX filesystem tree rooted at `root`.
pub struct LocalDiskIo {
    disk_id: DiskId,
    root: PathBuf,
}

impl LocalDiskIo {
    pub fn new(disk_id: DiskId, root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { disk_id, root })
    }

    fn abs(&self, rel_path: &Path) -> PathBuf {
        self.root.join(rel_path)
    }
}

impl DiskIo for LocalDiskIo {
    fn disk_id(&self) -> DiskId {
        self.disk_id
    }

    fn write_atomic(&self, rel_path: &Path, data: &[u8]) -> Result<()> {
        let staged = self.stage(rel_path, data)?;
        self.commit(&staged, rel_path)
    }

    fn stage(&self, final_rel_path: &Path, data: &[u8]) -> Result<PathBuf> {
        let final_path = self.abs(final_rel_path);
        let parent = final_path
            .parent()
            .ok_or_else(|| Error::invalid_arg("write path has no parent"))?;
        fs::create_dir_all(parent)?;

        let tmp_name = format!(
            ".tmp.{}.{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        );
        let tmp_path = parent.join(tmp_name);

        let mut f = fs::File::create(&tmp_path)?;
        f.write_all(data)?;
        f.sync_all()?;
        Ok(tmp_path)
    }

    fn commit(&self, staged: &Path, final_rel_path: &Path) -> Result<()> {
        let final_path = self.abs(final_rel_path);
        let parent = final_path
            .parent()
            .ok_or_else(|| Error::invalid_arg("write path has no parent"))?;
        fs::rename(staged, &final_path)?;
        let rel_dir = parent.strip_prefix(&self.root).unwrap_or(parent).to_path_buf();
        self.sync_dir(&rel_dir)?;
        Ok(())
    }

    fn abort_stage(&self, staged: &Path) -> Result<()> {
        match fs::remove_file(staged) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn read(&self, rel_path: &Path) -> Result<Vec<u8>> {
        fs::read(self.abs(rel_path)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found("", rel_path.to_string_lossy())
            } else {
                Error::Io(e)
            }
        })
    }

    fn remove(&self, rel_path: &Path) -> Result<()> {
        match fs::remove_file(self.abs(rel_path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn enumerate(&self, rel_dir: &Path) -> Result<Vec<String>> {
        let dir = self.abs(rel_dir);
        match fs::read_dir(&dir) {
            Ok(entries) => {
                let mut names = Vec::new();
                for entry in entries {
                    let entry = entry?;
                    if let Ok(name) = entry.file_name().into_string() {
                        names.push(name);
                    }
                }
                Ok(names)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn stat(&self, rel_path: &Path) -> Result<FileStat> {
        let meta = fs::metadata(self.abs(rel_path)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found("", rel_path.to_string_lossy())
            } else {
                Error::Io(e)
            }
        })?;
        let modified_unix_ms = meta
            .modified()?
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Ok(FileStat {
            size: meta.len(),
            modified_unix_ms,
        })
    }

    fn sync_dir(&self, rel_dir: &Path) -> Result<()> {
        let dir = self.abs(rel_dir);
        let f = fs::File::open(&dir)?;
        f.sync_all()?;
        Ok(())
    }

    fn exists(&self, rel_path: &Path) -> bool {
        self.abs(rel_path).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_read_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = LocalDiskIo::new(DiskId::new(), tmp.path()).unwrap();
        let rel = Path::new("bucket/aa/deadbeefdeadbeef/objhash/sidecar.v1");
        disk.write_atomic(rel, b"hello").unwrap();
        assert_eq!(disk.read(rel).unwrap(), b"hello");
    }

    #[test]
    fn test_enumerate_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = LocalDiskIo::new(DiskId::new(), tmp.path()).unwrap();
        assert!(disk.enumerate(Path::new("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = LocalDiskIo::new(DiskId::new(), tmp.path()).unwrap();
        assert!(disk.remove(Path::new("nope")).is_ok());
    }
}
