//! Pool assembly from configuration.
//!
//! Runs once at process startup: builds the storage backend, the CDN and
//! thumbnail collaborators, the providers with their per-context formats,
//! and the pool routing table. The returned pool is read-only from then on.

use std::sync::Arc;

use anyhow::{anyhow, bail};
use tracing::info;

use crate::cdn::{Cdn, ServerCdn};
use crate::core::config::{MediaConfig, StorageConfig};
use crate::provider::file::FileProvider;
use crate::provider::image::ImageProvider;
use crate::provider::pool::Pool;
use crate::provider::Format;
use crate::storage::local::LocalMediaStore;
use crate::storage::memory::InMemoryMediaStore;
use crate::storage::MediaStore;
use crate::thumbnail::{FormatThumbnailer, NoopThumbnailer, ThumbnailGenerator};

/// Everything a host needs to run the media lifecycle.
pub struct MediaRuntime {
    pub pool: Arc<Pool>,
    pub store: Arc<dyn MediaStore>,
}

/// Assemble a [`MediaRuntime`] from configuration.
///
/// Unknown backend, thumbnail mode, provider or format names fail fast here
/// rather than at first dispatch.
pub async fn build(config: &MediaConfig) -> anyhow::Result<MediaRuntime> {
    let store = build_store(&config.storage).await?;
    let cdn: Arc<dyn Cdn> = Arc::new(ServerCdn::new(&config.cdn.base_url));

    let thumbnailer: Arc<dyn ThumbnailGenerator> = match config.thumbnails.mode.as_str() {
        "noop" => Arc::new(NoopThumbnailer),
        "format" => Arc::new(FormatThumbnailer::new(store.clone())),
        other => bail!("unknown thumbnail mode `{other}` (expected `noop` or `format`)"),
    };

    let mut file = FileProvider::new(
        "file",
        store.clone(),
        cdn.clone(),
        thumbnailer.clone(),
        &config.providers.file,
    );
    let mut image = ImageProvider::new(
        "image",
        store.clone(),
        cdn.clone(),
        thumbnailer.clone(),
        &config.providers.image,
    );

    // Expand context/format pairs into provider-level formats, keyed
    // `{context}_{format}` so the same format name can differ per context.
    for context in &config.contexts {
        for format_name in &context.formats {
            let format_config = config.formats.get(format_name).ok_or_else(|| {
                anyhow!(
                    "context `{}` references unknown format `{}`",
                    context.name,
                    format_name
                )
            })?;
            let format = Format {
                width: format_config.width,
                height: format_config.height,
                quality: format_config.quality,
            };
            let key = format!("{}_{}", context.name, format_name);

            for provider_name in &context.providers {
                match provider_name.as_str() {
                    "file" => file.add_format(&key, format.clone()),
                    "image" => image.add_format(&key, format.clone()),
                    other => bail!(
                        "context `{}` references unknown provider `{}`",
                        context.name,
                        other
                    ),
                }
            }
        }
    }

    let mut pool = Pool::new();
    pool.add_provider("file", Arc::new(file))?;
    pool.add_provider("image", Arc::new(image))?;

    for context in &config.contexts {
        for provider_name in &context.providers {
            pool.get_provider(provider_name).map_err(|_| {
                anyhow!(
                    "context `{}` references unknown provider `{}`",
                    context.name,
                    provider_name
                )
            })?;
        }
        pool.add_context(
            context.name.clone(),
            context.providers.clone(),
            context.formats.clone(),
        );
    }

    info!(
        backend = %config.storage.backend,
        providers = pool.providers().len(),
        contexts = pool.contexts().len(),
        "media pool assembled"
    );

    Ok(MediaRuntime {
        pool: Arc::new(pool),
        store,
    })
}

async fn build_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn MediaStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryMediaStore::new())),
        "local" => {
            if config.local_root.is_empty() {
                bail!("storage backend `local` requires `local_root`");
            }
            Ok(Arc::new(LocalMediaStore::new(&config.local_root)))
        }
        #[cfg(feature = "s3")]
        "s3" => Ok(Arc::new(crate::storage::s3::S3MediaStore::new(config).await?)),
        #[cfg(not(feature = "s3"))]
        "s3" => bail!("storage backend `s3` requires the `s3` cargo feature"),
        other => bail!("unknown storage backend `{other}`"),
    }
}
