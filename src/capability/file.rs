//! Filesystem operations.

use super::CapabilityError;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;

/// File capability consumed by the engine.
///
/// All operations are whole-path: `copy` and `rename` work on files,
/// `delete` removes files or directory trees and is idempotent.
#[async_trait]
pub trait FileCapability: Send + Sync {
    async fn create_file(&self, path: &str) -> Result<(), CapabilityError>;
    async fn create_dir(&self, path: &str) -> Result<(), CapabilityError>;
    async fn copy(&self, from: &str, to: &str) -> Result<(), CapabilityError>;
    async fn rename(&self, from: &str, to: &str) -> Result<(), CapabilityError>;
    async fn delete(&self, path: &str) -> Result<(), CapabilityError>;
    async fn read(&self, path: &str) -> Result<String, CapabilityError>;
    async fn write(&self, path: &str, content: &str) -> Result<(), CapabilityError>;
    async fn append(&self, path: &str, content: &str) -> Result<(), CapabilityError>;
    async fn exists(&self, path: &str) -> bool;
    /// Lines of a text file, for `for each ... in line "<file>"` loops.
    async fn read_lines(&self, path: &str) -> Result<Vec<String>, CapabilityError>;
}

/// `tokio::fs`-backed implementation.
#[derive(Debug, Clone, Default)]
pub struct LocalFile;

impl LocalFile {
    pub fn new() -> Self {
        Self
    }
}

fn file_err(op: &str, path: &str, e: std::io::Error) -> CapabilityError {
    CapabilityError::File(format!("{op} `{path}`: {e}"))
}

#[async_trait]
impl FileCapability for LocalFile {
    async fn create_file(&self, path: &str) -> Result<(), CapabilityError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| file_err("create parent of", path, e))?;
            }
        }
        fs::File::create(path)
            .await
            .map(|_| ())
            .map_err(|e| file_err("create", path, e))
    }

    async fn create_dir(&self, path: &str) -> Result<(), CapabilityError> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| file_err("create dir", path, e))
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), CapabilityError> {
        fs::copy(from, to)
            .await
            .map(|_| ())
            .map_err(|e| file_err("copy", from, e))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), CapabilityError> {
        fs::rename(from, to)
            .await
            .map_err(|e| file_err("move", from, e))
    }

    async fn delete(&self, path: &str) -> Result<(), CapabilityError> {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)
                .await
                .map_err(|e| file_err("delete", path, e)),
            Ok(_) => fs::remove_file(path)
                .await
                .map_err(|e| file_err("delete", path, e)),
            // Already gone; delete is idempotent.
            Err(_) => Ok(()),
        }
    }

    async fn read(&self, path: &str) -> Result<String, CapabilityError> {
        fs::read_to_string(path)
            .await
            .map_err(|e| file_err("read", path, e))
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), CapabilityError> {
        fs::write(path, content)
            .await
            .map_err(|e| file_err("write", path, e))
    }

    async fn append(&self, path: &str, content: &str) -> Result<(), CapabilityError> {
        use tokio::io::AsyncWriteExt;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| file_err("append", path, e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| file_err("append", path, e))
    }

    async fn exists(&self, path: &str) -> bool {
        fs::metadata(path).await.is_ok()
    }

    async fn read_lines(&self, path: &str) -> Result<Vec<String>, CapabilityError> {
        let content = self.read(path).await?;
        Ok(content.lines().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_and_idempotent_delete() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("note.txt");
        let path = file.to_str().unwrap();
        let files = LocalFile::new();

        files.write(path, "hello\nworld\n").await.unwrap();
        assert!(files.exists(path).await);
        assert_eq!(files.read(path).await.unwrap(), "hello\nworld\n");
        assert_eq!(files.read_lines(path).await.unwrap(), vec!["hello", "world"]);

        files.append(path, "again\n").await.unwrap();
        assert!(files.read(path).await.unwrap().ends_with("again\n"));

        files.delete(path).await.unwrap();
        assert!(!files.exists(path).await);
        // Second delete is a no-op, not an error.
        files.delete(path).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_file_makes_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/keep");
        let files = LocalFile::new();
        files.create_file(nested.to_str().unwrap()).await.unwrap();
        assert!(files.exists(nested.to_str().unwrap()).await);
    }

    #[tokio::test]
    async fn test_copy_and_rename() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let c = dir.path().join("c.txt");
        let files = LocalFile::new();
        files.write(a.to_str().unwrap(), "data").await.unwrap();
        files
            .copy(a.to_str().unwrap(), b.to_str().unwrap())
            .await
            .unwrap();
        files
            .rename(b.to_str().unwrap(), c.to_str().unwrap())
            .await
            .unwrap();
        assert!(files.exists(a.to_str().unwrap()).await);
        assert!(!files.exists(b.to_str().unwrap()).await);
        assert_eq!(files.read(c.to_str().unwrap()).await.unwrap(), "data");
    }

    #[tokio::test]
    async fn test_read_missing_file_is_error() {
        let files = LocalFile::new();
        let err = files.read("/definitely/not/here.txt").await.unwrap_err();
        assert_eq!(err.classification(), "file");
    }
}
