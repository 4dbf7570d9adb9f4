use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, warn};

use crate::cdn::Cdn;
use crate::core::config::ProviderConfig;
use crate::core::error::LifecycleError;
use crate::core::types::{BinaryContent, Media, ProviderStatus};
use crate::storage::MediaStore;
use crate::thumbnail::ThumbnailGenerator;

use super::{
    ensure_accepted_content, fix_binary_content, fix_filename, refresh_resolved_metadata, Format,
    MediaProvider,
};

// ---------------------------------------------------------------------------
// ImageProvider
// ---------------------------------------------------------------------------

/// Provider for image uploads.
///
/// Unlike plain files, images have real renditions: each configured format
/// gets its own thumbnail object next to the reference bytes, and public
/// URLs resolve to those renditions. Content is restricted to the configured
/// image extensions and MIME types.
pub struct ImageProvider {
    name: String,
    store: Arc<dyn MediaStore>,
    cdn: Arc<dyn Cdn>,
    thumbnailer: Arc<dyn ThumbnailGenerator>,
    allowed_extensions: Vec<String>,
    allowed_mime_types: Vec<String>,
    formats: BTreeMap<String, Format>,
}

impl ImageProvider {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn MediaStore>,
        cdn: Arc<dyn Cdn>,
        thumbnailer: Arc<dyn ThumbnailGenerator>,
        config: &ProviderConfig,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            cdn,
            thumbnailer,
            allowed_extensions: config.allowed_extensions.clone(),
            allowed_mime_types: config.allowed_mime_types.clone(),
            formats: BTreeMap::new(),
        }
    }

    /// Register an output format. Called during pool assembly only.
    pub fn add_format(&mut self, name: impl Into<String>, format: Format) {
        self.formats.insert(name.into(), format);
    }

    async fn persist_contents(&self, media: &mut Media) -> Result<(), LifecycleError> {
        self.set_file_contents(media, None).await?;

        if let Err(e) = self.thumbnailer.generate(self, media).await {
            warn!(media_id = %media.id, error = %e, "thumbnail generation failed");
        }

        media.binary_content = None;
        Ok(())
    }
}

#[async_trait]
impl MediaProvider for ImageProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn formats(&self) -> &BTreeMap<String, Format> {
        &self.formats
    }

    async fn pre_persist(&self, media: &mut Media) -> Result<(), LifecycleError> {
        fix_binary_content(media).await?;
        ensure_accepted_content(
            &self.name,
            &self.allowed_extensions,
            &self.allowed_mime_types,
            media,
        )?;

        media.provider_name = self.name.clone();
        media.provider_status = ProviderStatus::Ok;

        if !media.has_resolved_content() {
            return Ok(());
        }

        fix_filename(media)?;
        refresh_resolved_metadata(media);

        let now = Utc::now();
        media.created_at = Some(now);
        media.updated_at = Some(now);
        Ok(())
    }

    async fn post_persist(&self, media: &mut Media) -> Result<(), LifecycleError> {
        if media.binary_content.is_none() {
            return Ok(());
        }
        self.persist_contents(media).await
    }

    async fn pre_update(&self, media: &mut Media) -> Result<(), LifecycleError> {
        fix_binary_content(media).await?;
        ensure_accepted_content(
            &self.name,
            &self.allowed_extensions,
            &self.allowed_mime_types,
            media,
        )?;

        if !media.has_resolved_content() {
            return Ok(());
        }

        fix_filename(media)?;
        refresh_resolved_metadata(media);
        media.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn post_update(&self, media: &mut Media) -> Result<(), LifecycleError> {
        if !media.has_resolved_content() {
            return Ok(());
        }

        fix_binary_content(media).await?;
        self.persist_contents(media).await
    }

    async fn pre_remove(&self, _media: &mut Media) -> Result<(), LifecycleError> {
        Ok(())
    }

    async fn post_remove(&self, media: &mut Media) -> Result<(), LifecycleError> {
        // The reference bytes stay for external garbage collection, but the
        // renditions belong to this provider alone and go with the entity.
        if media.provider_reference.is_some() {
            if let Err(e) = self.thumbnailer.delete(self, media).await {
                warn!(media_id = %media.id, error = %e, "thumbnail cleanup failed");
            }
        }
        Ok(())
    }

    fn thumbnail_key(&self, media: &Media, format: &str) -> Option<String> {
        media.provider_reference.as_deref()?;
        let extension = media.extension.as_deref().filter(|e| !e.is_empty())?;
        Some(format!(
            "{}/thumb_{}_{}.{}",
            self.canonical_path(media),
            media.id,
            format,
            extension
        ))
    }

    async fn set_file_contents(
        &self,
        media: &Media,
        source: Option<&Path>,
    ) -> Result<(), LifecycleError> {
        let key = self.reference_key(media)?;

        let source_path: PathBuf = match source {
            Some(path) => path.to_path_buf(),
            None => match &media.binary_content {
                Some(BinaryContent::Resolved(handle)) => handle.real_path.clone(),
                _ => {
                    return Err(LifecycleError::MissingBinaryContent { media_id: media.id });
                }
            },
        };

        let data = tokio::fs::read(&source_path).await?;
        let content_type = media
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());

        debug!(media_id = %media.id, key, size = data.len(), "writing image contents");
        self.store
            .put_object(&key, Bytes::from(data), &content_type)
            .await?;
        Ok(())
    }

    fn generate_public_url(&self, media: &Media, format: &str) -> String {
        let relative = if format == "reference" {
            self.reference_key(media).unwrap_or_default()
        } else {
            self.thumbnail_key(media, format)
                .or_else(|| self.reference_key(media).ok())
                .unwrap_or_default()
        };
        self.cdn.get_path(&relative, media.cdn_is_flushable)
    }

    fn generate_private_url(&self, _media: &Media, _format: &str) -> Option<String> {
        None
    }

    fn helper_properties(
        &self,
        media: &Media,
        format: &str,
        overrides: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut properties = BTreeMap::new();
        properties.insert(
            "title".to_string(),
            media.name.clone().unwrap_or_default(),
        );
        if let Some(key) = self.thumbnail_key(media, format) {
            properties.insert("thumbnail".to_string(), key);
        }
        if let Ok(key) = self.reference_key(media) {
            properties.insert("file".to_string(), key);
        }
        for (key, value) in overrides {
            properties.insert(key.clone(), value.clone());
        }
        properties
    }
}
