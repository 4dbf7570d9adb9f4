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
use crate::storage::{content_type_for_extension, MediaStore};
use crate::thumbnail::ThumbnailGenerator;

use super::{
    ensure_accepted_content, fix_binary_content, fix_filename, refresh_resolved_metadata, Format,
    MediaProvider,
};

// ---------------------------------------------------------------------------
// FileProvider
// ---------------------------------------------------------------------------

/// Provider for arbitrary file uploads.
///
/// Files have no true renditions: public URLs point at a static placeholder
/// asset per format, and there is no private URL concept.
pub struct FileProvider {
    name: String,
    store: Arc<dyn MediaStore>,
    cdn: Arc<dyn Cdn>,
    thumbnailer: Arc<dyn ThumbnailGenerator>,
    allowed_extensions: Vec<String>,
    allowed_mime_types: Vec<String>,
    formats: BTreeMap<String, Format>,
}

impl FileProvider {
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

    /// Write the primary bytes and regenerate renditions, then drop the
    /// transient input. Thumbnail failures are best-effort.
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
impl MediaProvider for FileProvider {
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

        // An entity may exist with only metadata, no bytes yet.
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
        // Covers entities created without bytes that now receive their first
        // upload: the reference is minted here, and only here, once.
        refresh_resolved_metadata(media);
        media.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn post_update(&self, media: &mut Media) -> Result<(), LifecycleError> {
        // Unlike post_persist, raw unresolved input is skipped entirely.
        if !media.has_resolved_content() {
            return Ok(());
        }

        fix_binary_content(media).await?;
        self.persist_contents(media).await
    }

    async fn pre_remove(&self, _media: &mut Media) -> Result<(), LifecycleError> {
        // Byte cleanup is left to external storage garbage collection: the
        // stored bytes may still be referenced by other logical contexts.
        Ok(())
    }

    async fn post_remove(&self, _media: &mut Media) -> Result<(), LifecycleError> {
        Ok(())
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
        let content_type = media.content_type.clone().unwrap_or_else(|| {
            content_type_for_extension(media.extension.as_deref().unwrap_or_default()).to_string()
        });

        debug!(media_id = %media.id, key, size = data.len(), "writing media contents");
        self.store
            .put_object(&key, Bytes::from(data), &content_type)
            .await?;
        Ok(())
    }

    fn generate_public_url(&self, media: &Media, format: &str) -> String {
        // No rendition for plain files: a static placeholder per format.
        self.cdn.get_path(
            &format!("assets/files/{format}/file.png"),
            media.cdn_is_flushable,
        )
    }

    fn generate_private_url(&self, _media: &Media, _format: &str) -> Option<String> {
        None
    }

    fn helper_properties(
        &self,
        media: &Media,
        _format: &str,
        overrides: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut properties = BTreeMap::new();
        properties.insert(
            "title".to_string(),
            media.name.clone().unwrap_or_default(),
        );
        if let Ok(key) = self.reference_key(media) {
            properties.insert("thumbnail".to_string(), key.clone());
            properties.insert("file".to_string(), key);
        }
        for (key, value) in overrides {
            properties.insert(key.clone(), value.clone());
        }
        properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdn::ServerCdn;
    use crate::storage::memory::InMemoryMediaStore;
    use crate::thumbnail::NoopThumbnailer;

    fn file_provider(store: Arc<InMemoryMediaStore>) -> FileProvider {
        FileProvider::new(
            "file",
            store,
            Arc::new(ServerCdn::new("/uploads/media")),
            Arc::new(NoopThumbnailer),
            &ProviderConfig::default(),
        )
    }

    async fn fixture_file(dir: &tempfile::TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, data).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_pre_persist_without_content_stamps_metadata_only() {
        let store = Arc::new(InMemoryMediaStore::new());
        let provider = file_provider(store);

        let mut media = Media::new("default", "file");
        provider.pre_persist(&mut media).await.unwrap();

        assert_eq!(media.provider_name, "file");
        assert_eq!(media.provider_status, ProviderStatus::Ok);
        assert!(media.provider_reference.is_none());
        assert!(media.created_at.is_none());
    }

    #[tokio::test]
    async fn test_pre_persist_assigns_reference_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_file(&dir, "report.pdf", b"0123456789").await;
        let store = Arc::new(InMemoryMediaStore::new());
        let provider = file_provider(store);

        let mut media = Media::new("default", "file");
        media.binary_content = Some(BinaryContent::Path(path));
        provider.pre_persist(&mut media).await.unwrap();

        assert_eq!(media.name.as_deref(), Some("report.pdf"));
        assert_eq!(media.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(media.size, Some(10));
        assert_eq!(media.extension.as_deref(), Some("pdf"));
        assert_eq!(media.created_at, media.updated_at);
        assert!(media.created_at.is_some());

        let reference = media.provider_reference.as_deref().unwrap();
        assert!(reference.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_pre_persist_nonexistent_path_leaves_entity_untouched() {
        let store = Arc::new(InMemoryMediaStore::new());
        let provider = file_provider(store);

        let mut media = Media::new("default", "file");
        media.binary_content = Some(BinaryContent::Path(PathBuf::from("/no/such/upload.bin")));

        let result = provider.pre_persist(&mut media).await;
        assert!(matches!(
            result,
            Err(LifecycleError::InvalidBinaryContent { .. })
        ));
        assert!(media.provider_reference.is_none());
        assert_eq!(media.provider_status, ProviderStatus::Pending);
        assert!(media.created_at.is_none());
    }

    #[tokio::test]
    async fn test_create_flow_writes_bytes_at_reference_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_file(&dir, "payload.bin", b"0123456789").await;
        let store = Arc::new(InMemoryMediaStore::new());
        let provider = file_provider(store.clone());

        let mut media = Media::new("default", "file");
        media.binary_content = Some(BinaryContent::Path(path));
        provider.pre_persist(&mut media).await.unwrap();
        provider.post_persist(&mut media).await.unwrap();

        let key = provider.reference_key(&media).unwrap();
        let stored = store.get_object(&key).await.unwrap();
        assert_eq!(stored.content_length, 10);
        assert_eq!(media.provider_status, ProviderStatus::Ok);

        // transient input is dropped once persisted
        assert!(media.binary_content.is_none());
    }

    #[tokio::test]
    async fn test_set_file_contents_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_file(&dir, "payload.bin", b"0123456789").await;
        let store = Arc::new(InMemoryMediaStore::new());
        let provider = file_provider(store.clone());

        let mut media = Media::new("default", "file");
        media.binary_content = Some(BinaryContent::Path(path.clone()));
        provider.pre_persist(&mut media).await.unwrap();
        provider.post_persist(&mut media).await.unwrap();

        let key = provider.reference_key(&media).unwrap();
        let first = store.get_object(&key).await.unwrap();

        // repeat with the same source: same key, same bytes
        provider
            .set_file_contents(&media, Some(&path))
            .await
            .unwrap();
        let second = store.get_object(&key).await.unwrap();
        assert_eq!(first.body, second.body);
        assert_eq!(store.object_count().await, 1);
    }

    #[tokio::test]
    async fn test_set_file_contents_without_reference_fails() {
        let store = Arc::new(InMemoryMediaStore::new());
        let provider = file_provider(store);

        let media = Media::new("default", "file");
        let result = provider.set_file_contents(&media, None).await;
        assert!(matches!(
            result,
            Err(LifecycleError::ReferenceNotAssigned { .. })
        ));
    }

    #[tokio::test]
    async fn test_reference_survives_update_with_new_content() {
        let dir = tempfile::tempdir().unwrap();
        let first = fixture_file(&dir, "first.pdf", b"first contents").await;
        let second = fixture_file(&dir, "second.txt", b"x").await;
        let store = Arc::new(InMemoryMediaStore::new());
        let provider = file_provider(store.clone());

        let mut media = Media::new("default", "file");
        media.binary_content = Some(BinaryContent::Path(first));
        provider.pre_persist(&mut media).await.unwrap();
        provider.post_persist(&mut media).await.unwrap();
        let original_reference = media.provider_reference.clone().unwrap();
        let created_at = media.created_at;

        // replace the bytes with a different file of a different name
        media.binary_content = Some(BinaryContent::Path(second));
        provider.pre_update(&mut media).await.unwrap();
        provider.post_update(&mut media).await.unwrap();

        assert_eq!(media.provider_reference.as_deref(), Some(original_reference.as_str()));
        assert_eq!(media.created_at, created_at);
        assert!(media.updated_at >= created_at);

        // the update replaced the bytes at the same storage key
        let key = provider.reference_key(&media).unwrap();
        let stored = store.get_object(&key).await.unwrap();
        assert_eq!(stored.content_length, 1);
        assert_eq!(store.object_count().await, 1);

        // metadata reflects the new content while the key stays put
        assert_eq!(media.content_type.as_deref(), Some("text/plain"));
        assert_eq!(media.size, Some(1));
    }

    #[tokio::test]
    async fn test_pre_update_mints_reference_for_late_first_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_file(&dir, "late.bin", b"late").await;
        let store = Arc::new(InMemoryMediaStore::new());
        let provider = file_provider(store);

        // created without bytes
        let mut media = Media::new("default", "file");
        provider.pre_persist(&mut media).await.unwrap();
        provider.post_persist(&mut media).await.unwrap();
        assert!(media.provider_reference.is_none());

        // first upload arrives on update
        media.binary_content = Some(BinaryContent::Path(path));
        provider.pre_update(&mut media).await.unwrap();
        assert!(media.provider_reference.is_some());
        assert!(media.updated_at.is_some());
        assert!(media.created_at.is_none());
    }

    #[tokio::test]
    async fn test_pre_update_without_content_is_noop() {
        let store = Arc::new(InMemoryMediaStore::new());
        let provider = file_provider(store);

        let mut media = Media::new("default", "file");
        provider.pre_update(&mut media).await.unwrap();
        assert!(media.provider_reference.is_none());
        assert!(media.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_post_update_skips_unresolved_content() {
        let store = Arc::new(InMemoryMediaStore::new());
        let provider = file_provider(store.clone());

        let mut media = Media::new("default", "file");
        media.binary_content = Some(BinaryContent::Path(PathBuf::from("/tmp/never-fixed.bin")));

        // raw path input means pre_update never ran; post_update must not act
        provider.post_update(&mut media).await.unwrap();
        assert_eq!(store.object_count().await, 0);
        assert!(media.binary_content.is_some());
    }

    #[tokio::test]
    async fn test_generate_public_url_is_placeholder() {
        let store = Arc::new(InMemoryMediaStore::new());
        let provider = file_provider(store);

        let media = Media::new("default", "file");
        assert_eq!(
            provider.generate_public_url(&media, "small"),
            "/uploads/media/assets/files/small/file.png"
        );
    }

    #[tokio::test]
    async fn test_generate_private_url_has_no_concept() {
        let store = Arc::new(InMemoryMediaStore::new());
        let provider = file_provider(store);

        let media = Media::new("default", "file");
        assert!(provider.generate_private_url(&media, "small").is_none());
    }

    #[tokio::test]
    async fn test_helper_properties_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_file(&dir, "report.pdf", b"pdf").await;
        let store = Arc::new(InMemoryMediaStore::new());
        let provider = file_provider(store);

        let mut media = Media::new("default", "file");
        media.binary_content = Some(BinaryContent::Path(path));
        provider.pre_persist(&mut media).await.unwrap();

        let mut overrides = BTreeMap::new();
        overrides.insert("title".to_string(), "Quarterly report".to_string());

        let properties = provider.helper_properties(&media, "small", &overrides);
        assert_eq!(properties["title"], "Quarterly report");
        assert_eq!(
            properties["file"],
            provider.reference_key(&media).unwrap()
        );
        assert_eq!(properties["thumbnail"], properties["file"]);
    }
}
