//! Derived-representation generation (thumbnails).
//!
//! Real image transformation is an external concern; the implementations here
//! either do nothing or materialize a passthrough copy per output format so
//! the rest of the pipeline (keys, URLs, cleanup) can be exercised end to end.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::error::StorageError;
use crate::core::types::Media;
use crate::provider::MediaProvider;
use crate::storage::MediaStore;

// ---------------------------------------------------------------------------
// ThumbnailGenerator trait
// ---------------------------------------------------------------------------

/// Generates and removes derived representations for a media entity.
///
/// Invoked by the providers from `post_persist`/`post_update`; failures there
/// are best-effort and never fatal to the lifecycle call.
#[async_trait]
pub trait ThumbnailGenerator: Send + Sync {
    async fn generate(
        &self,
        provider: &dyn MediaProvider,
        media: &Media,
    ) -> Result<(), StorageError>;

    async fn delete(
        &self,
        provider: &dyn MediaProvider,
        media: &Media,
    ) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// NoopThumbnailer
// ---------------------------------------------------------------------------

/// Generator that produces no renditions at all.
pub struct NoopThumbnailer;

#[async_trait]
impl ThumbnailGenerator for NoopThumbnailer {
    async fn generate(
        &self,
        _provider: &dyn MediaProvider,
        media: &Media,
    ) -> Result<(), StorageError> {
        debug!(media_id = %media.id, "thumbnail generation disabled");
        Ok(())
    }

    async fn delete(
        &self,
        _provider: &dyn MediaProvider,
        _media: &Media,
    ) -> Result<(), StorageError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FormatThumbnailer
// ---------------------------------------------------------------------------

/// Store-backed generator: writes one object per provider format.
///
/// The rendition bytes are a copy of the reference object — a stand-in until
/// a resize engine is plugged in. Keys come from the provider's
/// `thumbnail_key`, so providers without a rendition concept produce nothing.
pub struct FormatThumbnailer {
    store: Arc<dyn MediaStore>,
}

impl FormatThumbnailer {
    pub fn new(store: Arc<dyn MediaStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ThumbnailGenerator for FormatThumbnailer {
    async fn generate(
        &self,
        provider: &dyn MediaProvider,
        media: &Media,
    ) -> Result<(), StorageError> {
        if media.provider_reference.is_none() {
            return Ok(());
        }

        let keys: Vec<(String, String)> = provider
            .formats()
            .keys()
            .filter_map(|format| {
                provider
                    .thumbnail_key(media, format)
                    .map(|key| (format.clone(), key))
            })
            .collect();
        if keys.is_empty() {
            return Ok(());
        }

        let Ok(reference_key) = provider.reference_key(media) else {
            return Ok(());
        };
        let reference = self.store.get_object(&reference_key).await?;

        for (format, key) in keys {
            debug!(media_id = %media.id, format, key, "writing thumbnail rendition");
            self.store
                .put_object(&key, reference.body.clone(), &reference.content_type)
                .await?;
        }

        Ok(())
    }

    async fn delete(
        &self,
        provider: &dyn MediaProvider,
        media: &Media,
    ) -> Result<(), StorageError> {
        for format in provider.formats().keys() {
            if let Some(key) = provider.thumbnail_key(media, format) {
                self.store.delete_object(&key).await?;
            }
        }
        Ok(())
    }
}
