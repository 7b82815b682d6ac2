use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::{PipelineError, PipelineResult};

pub trait StorageManager {
    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()>;
    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>>;
    fn exists(&self, ident: &str) -> bool;
}

#[derive(Clone)]
pub struct BackendLocal {
    pub base_dir: PathBuf,
}

impl BackendLocal {
    pub fn new(storage_dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(storage_dir)?;
        Ok(BackendLocal {
            base_dir: storage_dir.to_path_buf(),
        })
    }
}

impl StorageManager for BackendLocal {
    fn exists(&self, ident: &str) -> bool {
        self.base_dir.join(ident).exists()
    }

    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.base_dir.join(ident))
    }

    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()> {
        write_atomic(&self.base_dir.join(ident), data)
    }
}

/// Writes `data` next to `path` and renames it into place.
pub fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = ensure_parent(path)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Reads an artifact, reporting a missing file as `MissingArtifact`.
pub fn read_artifact(path: &Path) -> PipelineResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| PipelineError::from_io_at(e, path))
}

pub fn read_artifact_string(path: &Path) -> PipelineResult<String> {
    let bytes = read_artifact(path)?;
    String::from_utf8(bytes).map_err(|e| {
        PipelineError::IO(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

/// Moves a staged file over its published location.
pub fn publish(staged: &Path, published: &Path) -> std::io::Result<()> {
    ensure_parent(published)?;
    std::fs::rename(staged, published)
}

/// Creates the parent directory of `path` and returns it.
pub fn ensure_parent(path: &Path) -> std::io::Result<&Path> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(tmp.path()).unwrap();

        assert!(!store.exists("a.txt"));
        store.write("a.txt", b"hello").unwrap();
        assert!(store.exists("a.txt"));
        assert_eq!(store.read("a.txt").unwrap(), b"hello");

        store.write("a.txt", b"bye").unwrap();
        assert_eq!(store.read("a.txt").unwrap(), b"bye");
    }

    #[test]
    fn test_write_atomic_creates_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/dir/file.json");

        write_atomic(&path, b"{}").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");

        // no leftovers besides the target
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_read_missing_artifact_names_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("missing.json");

        match read_artifact(&path) {
            Err(PipelineError::MissingArtifact(p)) => assert_eq!(p, path),
            other => panic!("expected MissingArtifact, got {other:?}"),
        }
    }
}
