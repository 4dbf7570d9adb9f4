pub mod file;
pub mod image;
pub mod pool;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::core::error::LifecycleError;
use crate::core::types::{BinaryContent, FileHandle, Media};

// ---------------------------------------------------------------------------
// Output formats
// ---------------------------------------------------------------------------

/// A named output format a provider can render a media entity into.
#[derive(Debug, Clone)]
pub struct Format {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: u8,
}

// ---------------------------------------------------------------------------
// MediaProvider trait (the lifecycle contract)
// ---------------------------------------------------------------------------

/// A named strategy implementing the media lifecycle for one kind of media.
///
/// Providers are stateless with respect to entities: they hold configuration
/// and collaborator handles, never per-entity state. The host persistence
/// framework serializes lifecycle calls per entity, so hooks take `&mut Media`
/// without further synchronization.
///
/// The hook protocol, per logical operation:
/// - create: `pre_persist` → host stores the entity → `post_persist`
/// - update: `pre_update` → host persists changed fields → `post_update`
/// - delete: `pre_remove` → host deletes the entity → `post_remove`
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Registered name of this provider; stamped onto entities it creates.
    fn name(&self) -> &str;

    /// Output formats configured for this provider, keyed `{context}_{format}`.
    fn formats(&self) -> &BTreeMap<String, Format>;

    async fn pre_persist(&self, media: &mut Media) -> Result<(), LifecycleError>;
    async fn post_persist(&self, media: &mut Media) -> Result<(), LifecycleError>;
    async fn pre_update(&self, media: &mut Media) -> Result<(), LifecycleError>;
    async fn post_update(&self, media: &mut Media) -> Result<(), LifecycleError>;
    async fn pre_remove(&self, media: &mut Media) -> Result<(), LifecycleError>;
    async fn post_remove(&self, media: &mut Media) -> Result<(), LifecycleError>;

    /// Deterministic per-entity key prefix. Pure: no side effects.
    ///
    /// The uuid's leading hex pairs bound directory fan-out to 256 entries
    /// per level.
    fn canonical_path(&self, media: &Media) -> String {
        canonical_path(media)
    }

    /// The storage key for the entity's primary bytes:
    /// `canonical_path + "/" + provider_reference`.
    fn reference_key(&self, media: &Media) -> Result<String, LifecycleError> {
        let reference = media.provider_reference.as_deref().ok_or(
            LifecycleError::ReferenceNotAssigned { media_id: media.id },
        )?;
        Ok(format!("{}/{}", self.canonical_path(media), reference))
    }

    /// Storage key of the rendition for `format`, if this provider has a
    /// rendition concept. Default: none.
    fn thumbnail_key(&self, _media: &Media, _format: &str) -> Option<String> {
        None
    }

    /// Overwrite the storage object at `reference_key` with the bytes read
    /// from `source` (default: the entity's resolved binary content).
    async fn set_file_contents(
        &self,
        media: &Media,
        source: Option<&Path>,
    ) -> Result<(), LifecycleError>;

    /// Public URL for the entity in the given format.
    fn generate_public_url(&self, media: &Media, format: &str) -> String;

    /// Private URL for the entity, or `None` when the provider has no private
    /// URL concept.
    fn generate_private_url(&self, media: &Media, format: &str) -> Option<String>;

    /// Display-oriented record (title, thumbnail key, file key) merged with
    /// caller-supplied overrides; overrides win on key collision.
    fn helper_properties(
        &self,
        media: &Media,
        format: &str,
        overrides: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String>;
}

// ---------------------------------------------------------------------------
// Shared normalization steps
// ---------------------------------------------------------------------------

/// Normalize the entity's binary content.
///
/// Total over the content variant: `None` and `Resolved` pass through
/// unchanged; a `Path` must point at an existing file and becomes a
/// `Resolved` handle, otherwise the call fails with `InvalidBinaryContent`
/// before any other entity state is touched.
pub async fn fix_binary_content(media: &mut Media) -> Result<(), LifecycleError> {
    if let Some(BinaryContent::Path(path)) = media.binary_content.clone() {
        let handle = FileHandle::resolve(&path).await?;
        media.binary_content = Some(BinaryContent::Resolved(handle));
    }
    Ok(())
}

/// Derive the entity's display name from its resolved content.
///
/// The client-supplied original name takes priority over the handle's
/// basename. An already-set entity name always wins over the candidate.
/// With neither, the call fails with `MissingMediaName`.
pub fn fix_filename(media: &mut Media) -> Result<(), LifecycleError> {
    let candidate = media.resolved_content().and_then(|handle| {
        handle
            .client_original_name
            .clone()
            .or_else(|| (!handle.basename.is_empty()).then(|| handle.basename.clone()))
    });

    let has_name = media.name.as_deref().is_some_and(|name| !name.is_empty());
    if has_name {
        return Ok(());
    }

    match candidate {
        Some(name) => {
            media.name = Some(name);
            Ok(())
        }
        None => Err(LifecycleError::MissingMediaName { media_id: media.id }),
    }
}

/// Generate the one-time storage reference for an entity.
///
/// The random salt keeps same-named uploads from colliding within the
/// provider's path namespace; no cryptographic strength is required.
pub(crate) fn generate_reference(name: &str, extension: &str) -> String {
    let salt: u32 = rand::random();
    let digest = Sha256::digest(format!("{name}{salt}"));
    let hash = hex::encode(digest);
    if extension.is_empty() {
        hash
    } else {
        format!("{hash}.{extension}")
    }
}

/// Deterministic per-entity key prefix: `{context}/{id[0..2]}/{id[2..4]}`.
pub(crate) fn canonical_path(media: &Media) -> String {
    let id = media.id.as_uuid().simple().to_string();
    format!("{}/{}/{}", media.context, &id[..2], &id[2..4])
}

/// Assign the one-time reference (if still unset) and refresh the derived
/// metadata fields from the resolved handle. No-op without resolved content.
pub(crate) fn refresh_resolved_metadata(media: &mut Media) {
    let Some(handle) = media.resolved_content().cloned() else {
        return;
    };

    if media.provider_reference.is_none() {
        let name = media.name.clone().unwrap_or_else(|| handle.basename.clone());
        let reference = generate_reference(&name, &handle.extension);
        info!(media_id = %media.id, reference, "assigned provider reference");
        media.provider_reference = Some(reference);
    }

    media.content_type = Some(handle.mime_type.clone());
    media.size = Some(handle.size);
    media.extension = Some(handle.extension);
}

/// Check the resolved content against a provider's acceptance rules.
/// Empty allow-lists accept everything.
pub(crate) fn ensure_accepted_content(
    provider: &str,
    allowed_extensions: &[String],
    allowed_mime_types: &[String],
    media: &Media,
) -> Result<(), LifecycleError> {
    let Some(handle) = media.resolved_content() else {
        return Ok(());
    };

    let extension_ok = allowed_extensions.is_empty()
        || allowed_extensions.iter().any(|e| e == &handle.extension);
    let mime_ok =
        allowed_mime_types.is_empty() || allowed_mime_types.iter().any(|m| m == &handle.mime_type);

    if !extension_ok || !mime_ok {
        return Err(LifecycleError::UnsupportedContentType {
            provider: provider.to_string(),
            content_type: handle.mime_type.clone(),
        });
    }
    Ok(())
}
