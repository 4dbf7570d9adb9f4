use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::LifecycleError;
use crate::storage::content_type_for_extension;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique identifier for a media entity (UUIDv7 for time-sortability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaId(Uuid);

impl MediaId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MediaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Provider status
// ---------------------------------------------------------------------------

/// Outcome marker stamped on a media entity by its provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderStatus {
    /// Lifecycle creation completed.
    Ok,
    /// Entity created, no lifecycle hook has run yet.
    Pending,
    /// Unrecoverable failure occurred.
    Error,
}

impl ProviderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderStatus::Ok => "ok",
            ProviderStatus::Pending => "pending",
            ProviderStatus::Error => "error",
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Binary content
// ---------------------------------------------------------------------------

/// Transient binary input attached to a media entity.
///
/// Normalization (`fix_binary_content`) is total over this variant plus the
/// `None` case of `Media::binary_content`: a `Path` either resolves to an
/// existing file and becomes `Resolved`, or the lifecycle call fails.
#[derive(Debug, Clone)]
pub enum BinaryContent {
    /// A filesystem path that has not been validated yet.
    Path(PathBuf),
    /// A validated file handle carrying derived metadata.
    Resolved(FileHandle),
}

/// A resolved file on local disk, with the metadata the lifecycle needs.
#[derive(Debug, Clone)]
pub struct FileHandle {
    pub real_path: PathBuf,
    pub basename: String,
    /// Lowercased, without the leading dot. Empty for extensionless files.
    pub extension: String,
    pub mime_type: String,
    pub size: u64,
    /// Original filename supplied by the client, set only for user uploads.
    pub client_original_name: Option<String>,
}

impl FileHandle {
    /// Stat `path` and derive basename, extension, MIME type and size.
    ///
    /// Fails with `InvalidBinaryContent` when the path does not exist or is
    /// not a regular file.
    pub async fn resolve(path: &Path) -> Result<Self, LifecycleError> {
        let metadata = tokio::fs::metadata(path).await.map_err(|_| {
            LifecycleError::InvalidBinaryContent {
                path: path.to_path_buf(),
            }
        })?;

        if !metadata.is_file() {
            return Err(LifecycleError::InvalidBinaryContent {
                path: path.to_path_buf(),
            });
        }

        let basename = path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or_default()
            .to_string();
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mime_type = content_type_for_extension(&extension).to_string();

        Ok(Self {
            real_path: path.to_path_buf(),
            basename,
            extension,
            mime_type,
            size: metadata.len(),
            client_original_name: None,
        })
    }

    /// Mark this handle as a user upload carrying the client's filename.
    pub fn with_client_original_name(mut self, name: impl Into<String>) -> Self {
        self.client_original_name = Some(name.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Media entity
// ---------------------------------------------------------------------------

/// A media entity: one uploaded asset plus its metadata and lifecycle state.
///
/// The host persistence framework owns entity identity and serializes
/// lifecycle calls per entity; providers never retain a reference to a media
/// entity beyond a single hook invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub id: MediaId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: bool,
    /// Usage context this entity belongs to; namespaces its storage keys.
    pub context: String,
    /// Selects the provider at dispatch time. Set once, during creation.
    pub provider_name: String,
    pub provider_status: ProviderStatus,
    /// Stable storage key suffix, generated exactly once on first successful
    /// content normalization. Never regenerated: an update replaces the bytes
    /// at the same storage key, it never relocates them.
    pub provider_reference: Option<String>,
    /// Transient input, not stored state. Cleared once persisted.
    #[serde(skip)]
    pub binary_content: Option<BinaryContent>,
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub extension: Option<String>,
    pub cdn_is_flushable: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Media {
    pub fn new(context: impl Into<String>, provider_name: impl Into<String>) -> Self {
        Self {
            id: MediaId::new(),
            name: None,
            description: None,
            enabled: true,
            context: context.into(),
            provider_name: provider_name.into(),
            provider_status: ProviderStatus::Pending,
            provider_reference: None,
            binary_content: None,
            content_type: None,
            size: None,
            extension: None,
            cdn_is_flushable: false,
            created_at: None,
            updated_at: None,
        }
    }

    /// True once the entity carries a validated file handle.
    pub fn has_resolved_content(&self) -> bool {
        matches!(self.binary_content, Some(BinaryContent::Resolved(_)))
    }

    /// The resolved handle, if normalization has run.
    pub fn resolved_content(&self) -> Option<&FileHandle> {
        match &self.binary_content {
            Some(BinaryContent::Resolved(handle)) => Some(handle),
            _ => None,
        }
    }
}
