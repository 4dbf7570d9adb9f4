//! Media provider pool.
//!
//! This crate manages the lifecycle of media entities: binary payloads are
//! validated and normalized, assigned a stable storage reference exactly once,
//! persisted through a pluggable object store, and exposed through derived
//! representations (thumbnails) and public/private URLs.
//!
//! The coordination layer is the [`provider::pool::Pool`]: a registry mapping
//! provider names to [`provider::MediaProvider`] implementations and context
//! names to provider/format groupings. The host persistence framework fires
//! the six lifecycle hooks on the pool around its own create/update/delete
//! operations; the pool dispatches each call to the provider named on the
//! media entity.

pub mod bootstrap;
pub mod cdn;
pub mod core;
pub mod provider;
pub mod storage;
pub mod thumbnail;

pub use crate::core::types::{BinaryContent, FileHandle, Media, MediaId, ProviderStatus};
pub use crate::provider::pool::Pool;
pub use crate::provider::MediaProvider;
pub use crate::storage::MediaStore;
