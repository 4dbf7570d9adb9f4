use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::core::error::StorageError;

use super::{GetObjectOutput, MediaStore, ObjectInfo};

// ---------------------------------------------------------------------------
// InMemoryMediaStore
// ---------------------------------------------------------------------------

/// In-memory storage backend for unit and integration tests.
///
/// Stores all objects in a `HashMap<String, StoredObject>` behind a `RwLock`.
/// No external dependencies required.
pub struct InMemoryMediaStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    created_at: chrono::DateTime<Utc>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }
}

impl Default for InMemoryMediaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn put_object(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut objects = self.objects.write().await;
        objects.insert(
            path.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, path: &str) -> Result<GetObjectOutput, StorageError> {
        let objects = self.objects.read().await;
        let obj = objects.get(path).ok_or_else(|| StorageError::NotFound {
            path: path.to_string(),
        })?;

        Ok(GetObjectOutput {
            body: obj.data.clone(),
            content_length: obj.data.len() as u64,
            content_type: obj.content_type.clone(),
            last_modified: obj.created_at,
            etag: format!("\"{}\"", obj.data.len()),
        })
    }

    async fn object_exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.objects.read().await.contains_key(path))
    }

    async fn delete_object(&self, path: &str) -> Result<(), StorageError> {
        let mut objects = self.objects.write().await;
        objects.remove(path);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StorageError> {
        let mut objects = self.objects.write().await;
        let keys_to_delete: Vec<String> = objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        let count = keys_to_delete.len() as u64;
        for key in keys_to_delete {
            objects.remove(&key);
        }
        Ok(count)
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        let objects = self.objects.read().await;
        let mut result: Vec<ObjectInfo> = objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| ObjectInfo {
                key: k.clone(),
                size: v.data.len() as u64,
                last_modified: v.created_at,
            })
            .collect();
        result.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get_object() {
        let store = InMemoryMediaStore::new();
        let data = Bytes::from(vec![0xAA; 1000]);

        store
            .put_object("default/ab/cd/ref.png", data.clone(), "image/png")
            .await
            .unwrap();

        let output = store.get_object("default/ab/cd/ref.png").await.unwrap();
        assert_eq!(output.body, data);
        assert_eq!(output.content_type, "image/png");
        assert_eq!(output.content_length, 1000);
    }

    #[tokio::test]
    async fn test_get_nonexistent_returns_not_found() {
        let store = InMemoryMediaStore::new();
        let result = store.get_object("nonexistent").await;
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_put_overwrites_in_place() {
        let store = InMemoryMediaStore::new();
        store
            .put_object("key", Bytes::from("first"), "text/plain")
            .await
            .unwrap();
        store
            .put_object("key", Bytes::from("second"), "text/plain")
            .await
            .unwrap();

        let output = store.get_object("key").await.unwrap();
        assert_eq!(output.body, Bytes::from("second"));
        assert_eq!(store.object_count().await, 1);
    }

    #[tokio::test]
    async fn test_delete_object() {
        let store = InMemoryMediaStore::new();
        store
            .put_object("key", Bytes::from("data"), "text/plain")
            .await
            .unwrap();

        assert!(store.object_exists("key").await.unwrap());
        store.delete_object("key").await.unwrap();
        assert!(!store.object_exists("key").await.unwrap());

        // deleting a missing object is not an error
        store.delete_object("key").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let store = InMemoryMediaStore::new();
        store
            .put_object("default/aa/bb/one.png", Bytes::from("a"), "image/png")
            .await
            .unwrap();
        store
            .put_object("default/aa/bb/two.png", Bytes::from("b"), "image/png")
            .await
            .unwrap();
        store
            .put_object("gallery/aa/bb/three.png", Bytes::from("c"), "image/png")
            .await
            .unwrap();

        let deleted = store.delete_prefix("default/").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.object_count().await, 1);
    }

    #[tokio::test]
    async fn test_list_objects_sorted_by_key() {
        let store = InMemoryMediaStore::new();
        store
            .put_object("ctx/aa/bb/b.png", Bytes::from("b"), "image/png")
            .await
            .unwrap();
        store
            .put_object("ctx/aa/bb/a.png", Bytes::from("a"), "image/png")
            .await
            .unwrap();

        let objects = store.list_objects("ctx/").await.unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].key, "ctx/aa/bb/a.png");
        assert_eq!(objects[1].key, "ctx/aa/bb/b.png");
    }
}
