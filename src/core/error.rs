use std::path::PathBuf;

use thiserror::Error;

use super::types::MediaId;

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

/// Errors raised by the provider pool itself.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unable to retrieve the provider named `{name}`")]
    ProviderNotFound { name: String },

    #[error("provider name must not be empty")]
    EmptyProviderName,
}

// ---------------------------------------------------------------------------
// Lifecycle errors
// ---------------------------------------------------------------------------

/// Errors raised while running a provider lifecycle hook.
///
/// All of these are fatal to the current lifecycle call; the host persistence
/// framework decides whether to abort its surrounding transaction. No hook
/// retries internally.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("binary content path does not exist: {path}")]
    InvalidBinaryContent { path: PathBuf },

    #[error("content type {content_type} is not accepted by provider `{provider}`")]
    UnsupportedContentType {
        provider: String,
        content_type: String,
    },

    #[error("unable to derive a name for media {media_id}")]
    MissingMediaName { media_id: MediaId },

    #[error("media {media_id} has no provider reference assigned")]
    ReferenceNotAssigned { media_id: MediaId },

    #[error("media {media_id} has no binary content to store")]
    MissingBinaryContent { media_id: MediaId },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("lifecycle I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// Errors originating from the storage port.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("PUT failed for path {path}: {reason}")]
    PutFailed { path: String, reason: String },

    #[error("GET failed for path {path}: {reason}")]
    GetFailed { path: String, reason: String },

    #[error("DELETE failed for path {path}: {reason}")]
    DeleteFailed { path: String, reason: String },

    #[error("object not found: {path}")]
    NotFound { path: String },

    #[error("retries exhausted for path {path}")]
    RetriesExhausted { path: String },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}
