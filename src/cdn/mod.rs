//! CDN collaborator: turns relative asset paths into servable URLs.

// ---------------------------------------------------------------------------
// Cdn trait
// ---------------------------------------------------------------------------

/// URL construction for stored assets.
///
/// `is_flushable` hints whether the entity wants its edge cache invalidated
/// on change; backends that have no cache (like [`ServerCdn`]) ignore it.
pub trait Cdn: Send + Sync {
    /// Build the public URL for a relative asset path.
    fn get_path(&self, relative_path: &str, is_flushable: bool) -> String;

    /// Request invalidation of a cached path. Default: nothing to flush.
    fn flush(&self, _relative_path: &str) {}
}

// ---------------------------------------------------------------------------
// ServerCdn
// ---------------------------------------------------------------------------

/// "CDN" that simply serves assets from the host itself under a base URL.
pub struct ServerCdn {
    base_url: String,
}

impl ServerCdn {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Cdn for ServerCdn {
    fn get_path(&self, relative_path: &str, _is_flushable: bool) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            relative_path.trim_start_matches('/')
        )
    }
}
