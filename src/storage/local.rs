use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::core::error::StorageError;

use super::{content_type_for_extension, GetObjectOutput, MediaStore, ObjectInfo};

// ---------------------------------------------------------------------------
// LocalMediaStore
// ---------------------------------------------------------------------------

/// Filesystem storage backend rooted at a directory.
///
/// Object keys map to relative paths under the root; intermediate directories
/// are created on write. Content types are re-derived from the key's
/// extension on read (no sidecar metadata is kept).
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a key to an absolute path, rejecting traversal outside the root.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir));
        if escapes || key.is_empty() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("key `{key}` must be a relative path without `..` components"),
            )));
        }
        Ok(self.root.join(relative))
    }

    fn extension_of(key: &str) -> String {
        Path::new(key)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    /// Walk the tree under `root` and collect every file key with its size
    /// and modification time, relative to the root.
    async fn collect_keys(&self) -> Result<Vec<ObjectInfo>, StorageError> {
        let mut result = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // A missing root simply means nothing has been stored yet.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Io(e)),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative.to_string_lossy().replace('\\', "/");
                let last_modified: DateTime<Utc> = metadata
                    .modified()
                    .map(DateTime::from)
                    .unwrap_or_else(|_| Utc::now());
                result.push(ObjectInfo {
                    key,
                    size: metadata.len(),
                    last_modified,
                });
            }
        }

        result.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(result)
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put_object(
        &self,
        path: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &data).await?;
        debug!(path, size = data.len(), "local store write completed");
        Ok(())
    }

    async fn get_object(&self, path: &str) -> Result<GetObjectOutput, StorageError> {
        let target = self.resolve(path)?;
        let metadata = match tokio::fs::metadata(&target).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => {
                return Err(StorageError::NotFound {
                    path: path.to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    path: path.to_string(),
                })
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        let data = tokio::fs::read(&target).await?;
        let last_modified: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(GetObjectOutput {
            content_length: data.len() as u64,
            content_type: content_type_for_extension(&Self::extension_of(path)).to_string(),
            etag: format!("\"{}\"", data.len()),
            body: Bytes::from(data),
            last_modified,
        })
    }

    async fn object_exists(&self, path: &str) -> Result<bool, StorageError> {
        let target = self.resolve(path)?;
        match tokio::fs::metadata(&target).await {
            Ok(m) => Ok(m.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn delete_object(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StorageError> {
        let mut deleted = 0u64;
        for info in self.collect_keys().await? {
            if info.key.starts_with(prefix) {
                self.delete_object(&info.key).await?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        let keys = self.collect_keys().await?;
        Ok(keys
            .into_iter()
            .filter(|info| info.key.starts_with(prefix))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());

        store
            .put_object(
                "default/ab/cd/ref.png",
                Bytes::from(vec![1, 2, 3]),
                "image/png",
            )
            .await
            .unwrap();

        let output = store.get_object("default/ab/cd/ref.png").await.unwrap();
        assert_eq!(output.body.as_ref(), &[1, 2, 3]);
        assert_eq!(output.content_length, 3);
        assert_eq!(output.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());

        let result = store.get_object("missing/ref.bin").await;
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());

        store
            .put_object("a/b.txt", Bytes::from("hello"), "text/plain")
            .await
            .unwrap();
        assert!(store.object_exists("a/b.txt").await.unwrap());

        store.delete_object("a/b.txt").await.unwrap();
        assert!(!store.object_exists("a/b.txt").await.unwrap());

        // deleting again is a no-op
        store.delete_object("a/b.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_prefix_counts_removed_objects() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());

        for key in ["ctx/aa/one.bin", "ctx/aa/two.bin", "other/aa/three.bin"] {
            store
                .put_object(key, Bytes::from("x"), "application/octet-stream")
                .await
                .unwrap();
        }

        let deleted = store.delete_prefix("ctx/").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(store.object_exists("other/aa/three.bin").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_objects_under_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());

        store
            .put_object("ctx/aa/b.bin", Bytes::from("bb"), "application/octet-stream")
            .await
            .unwrap();
        store
            .put_object("ctx/aa/a.bin", Bytes::from("a"), "application/octet-stream")
            .await
            .unwrap();

        let objects = store.list_objects("ctx/").await.unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].key, "ctx/aa/a.bin");
        assert_eq!(objects[0].size, 1);
        assert_eq!(objects[1].key, "ctx/aa/b.bin");
    }

    #[tokio::test]
    async fn test_traversal_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path());

        let result = store
            .put_object("../escape.bin", Bytes::from("x"), "application/octet-stream")
            .await;
        assert!(result.is_err());

        let result = store.get_object("/etc/passwd").await;
        assert!(result.is_err());
    }
}
