use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::core::error::{LifecycleError, RegistryError};
use crate::core::types::Media;

use super::MediaProvider;

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

/// A named grouping of providers and output formats for a usage scenario
/// (e.g. a "gallery" context allowing only image providers at given sizes).
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub providers: Vec<String>,
    pub formats: Vec<String>,
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// The provider registry.
///
/// Maps provider names to [`MediaProvider`] instances and context names to
/// provider/format groupings, and dispatches lifecycle calls from the host
/// persistence framework to the provider named on each media entity.
///
/// Assembled once at startup and effectively read-only afterward: all
/// steady-state access goes through `&self`, so a pool behind an `Arc` is
/// safe for concurrent readers.
#[derive(Default)]
pub struct Pool {
    providers: HashMap<String, Arc<dyn MediaProvider>>,
    contexts: HashMap<String, Context>,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    // -- provider registration and lookup -----------------------------------

    /// Register or replace a provider under `name`.
    pub fn add_provider(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn MediaProvider>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyProviderName);
        }
        debug!(provider = %name, "provider registered");
        self.providers.insert(name, provider);
        Ok(())
    }

    /// Replace the whole provider map.
    pub fn set_providers(&mut self, providers: HashMap<String, Arc<dyn MediaProvider>>) {
        self.providers = providers;
    }

    pub fn providers(&self) -> &HashMap<String, Arc<dyn MediaProvider>> {
        &self.providers
    }

    /// Look up a provider by name. The single dispatch point for every
    /// lifecycle forwarding call; a miss is always an error, never silent.
    pub fn get_provider(&self, name: &str) -> Result<Arc<dyn MediaProvider>, RegistryError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::ProviderNotFound {
                name: name.to_string(),
            })
    }

    /// Stable name→name enumeration of all registered providers, e.g. for
    /// presenting choices in a host UI.
    pub fn provider_list(&self) -> BTreeMap<String, String> {
        self.providers
            .keys()
            .map(|name| (name.clone(), name.clone()))
            .collect()
    }

    // -- contexts ------------------------------------------------------------

    /// Create the context if absent, then unconditionally overwrite its
    /// provider and format lists. Not additive: re-registration replaces.
    pub fn add_context(
        &mut self,
        name: impl Into<String>,
        providers: Vec<String>,
        formats: Vec<String>,
    ) {
        let context = self.contexts.entry(name.into()).or_default();
        context.providers = providers;
        context.formats = formats;
    }

    pub fn has_context(&self, name: &str) -> bool {
        self.contexts.contains_key(name)
    }

    pub fn get_context(&self, name: &str) -> Option<&Context> {
        self.contexts.get(name)
    }

    pub fn contexts(&self) -> &HashMap<String, Context> {
        &self.contexts
    }

    /// Provider names grouped under a context. `None` when the context does
    /// not exist — distinct from a context registered with an empty list.
    pub fn provider_names_by_context(&self, name: &str) -> Option<&[String]> {
        self.contexts.get(name).map(|c| c.providers.as_slice())
    }

    /// Format names grouped under a context; `None` when the context does
    /// not exist.
    pub fn format_names_by_context(&self, name: &str) -> Option<&[String]> {
        self.contexts.get(name).map(|c| c.formats.as_slice())
    }

    /// Resolve a context's providers, in order.
    ///
    /// An absent context yields an empty list rather than an error: context
    /// membership is advisory routing, not a hard dependency. Member names
    /// still resolve through [`Pool::get_provider`], so a context naming an
    /// unregistered provider does fail.
    pub fn providers_by_context(
        &self,
        name: &str,
    ) -> Result<Vec<Arc<dyn MediaProvider>>, RegistryError> {
        let Some(context) = self.contexts.get(name) else {
            return Ok(Vec::new());
        };
        context
            .providers
            .iter()
            .map(|provider_name| self.get_provider(provider_name))
            .collect()
    }

    // -- lifecycle dispatch --------------------------------------------------
    //
    // Pure forwarding: the pool resolves the provider named on the entity and
    // invokes the identically named hook, performing no normalization itself.

    pub async fn pre_persist(&self, media: &mut Media) -> Result<(), LifecycleError> {
        let provider = self.get_provider(&media.provider_name)?;
        provider.pre_persist(media).await
    }

    pub async fn post_persist(&self, media: &mut Media) -> Result<(), LifecycleError> {
        let provider = self.get_provider(&media.provider_name)?;
        provider.post_persist(media).await
    }

    pub async fn pre_update(&self, media: &mut Media) -> Result<(), LifecycleError> {
        let provider = self.get_provider(&media.provider_name)?;
        provider.pre_update(media).await
    }

    pub async fn post_update(&self, media: &mut Media) -> Result<(), LifecycleError> {
        let provider = self.get_provider(&media.provider_name)?;
        provider.post_update(media).await
    }

    pub async fn pre_remove(&self, media: &mut Media) -> Result<(), LifecycleError> {
        let provider = self.get_provider(&media.provider_name)?;
        provider.pre_remove(media).await
    }

    pub async fn post_remove(&self, media: &mut Media) -> Result<(), LifecycleError> {
        let provider = self.get_provider(&media.provider_name)?;
        provider.post_remove(media).await
    }
}
