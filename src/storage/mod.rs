pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::StorageError;

// ---------------------------------------------------------------------------
// MediaStore trait
// ---------------------------------------------------------------------------

/// Trait-based abstraction over the storage backend.
///
/// Providers write and read media bytes exclusively through this port, keyed
/// by the path strings derived from `reference_key`. The production backends
/// are `LocalMediaStore` and `S3MediaStore`; tests use `InMemoryMediaStore`
/// without external dependencies.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Write an object to storage. Overwrites atomically: repeated calls with
    /// the same source leave the same stored bytes.
    async fn put_object(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Read an object from storage.
    async fn get_object(&self, path: &str) -> Result<GetObjectOutput, StorageError>;

    /// Check whether an object exists without downloading its body.
    async fn object_exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Delete a single object. Deleting a missing object is not an error.
    async fn delete_object(&self, path: &str) -> Result<(), StorageError>;

    /// Delete all objects under a prefix. Returns count of objects deleted.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StorageError>;

    /// List objects under a prefix, ordered by key.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError>;
}

// ---------------------------------------------------------------------------
// Storage types
// ---------------------------------------------------------------------------

/// Output from a GET object operation.
#[derive(Debug, Clone)]
pub struct GetObjectOutput {
    pub body: Bytes,
    pub content_length: u64,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
    pub etag: String,
}

/// Information about an object from a LIST operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Content type helpers
// ---------------------------------------------------------------------------

/// Determine content type from a lowercased file extension.
pub fn content_type_for_extension(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "aac" => "audio/aac",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
