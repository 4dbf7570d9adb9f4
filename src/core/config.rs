use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub storage: StorageConfig,
    pub cdn: CdnConfig,
    pub thumbnails: ThumbnailConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub formats: BTreeMap<String, FormatConfig>,
    #[serde(default, rename = "context")]
    pub contexts: Vec<ContextConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// One of `memory`, `local`, `s3`.
    pub backend: String,
    /// Root directory for the `local` backend.
    #[serde(default)]
    pub local_root: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub path_style: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdnConfig {
    /// Base URL prefixed to every relative asset path.
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    /// One of `noop`, `format`.
    pub mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub file: ProviderConfig,
    pub image: ProviderConfig,
}

/// Per-provider content acceptance rules. Empty lists accept everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
    #[serde(default)]
    pub allowed_mime_types: Vec<String>,
}

/// A named output format for derived representations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(default = "default_quality")]
    pub quality: u8,
}

fn default_quality() -> u8 {
    80
}

/// A usage context: which providers and output formats apply to a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    pub name: String,
    #[serde(default)]
    pub providers: Vec<String>,
    #[serde(default)]
    pub formats: Vec<String>,
}

impl MediaConfig {
    /// Load configuration with layered overrides:
    /// 1. config/default.toml
    /// 2. config/{env}.toml (based on MEDIAPOOL_ENV)
    /// 3. Environment variables (MEDIAPOOL_* prefix)
    pub fn load() -> anyhow::Result<Self> {
        let default_path = Path::new("config/default.toml");
        let default_content = std::fs::read_to_string(default_path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {}", default_path.display(), e))?;

        let mut config = Self::from_toml_str(&default_content)?;

        // Layer 2: environment-specific overrides
        let env_name =
            std::env::var("MEDIAPOOL_ENV").unwrap_or_else(|_| "development".to_string());
        let env_path = format!("config/{}.toml", env_name);
        if let Ok(env_content) = std::fs::read_to_string(&env_path) {
            config = toml::from_str(&env_content)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", env_path, e))?;
        }

        // Layer 3: environment variable overrides (selected keys)
        Self::apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Parse a configuration document from a TOML string.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("failed to parse config: {}", e))
    }

    fn apply_env_overrides(config: &mut MediaConfig) {
        if let Ok(v) = std::env::var("MEDIAPOOL_STORAGE_BACKEND") {
            config.storage.backend = v;
        }
        if let Ok(v) = std::env::var("MEDIAPOOL_STORAGE_LOCAL_ROOT") {
            config.storage.local_root = v;
        }
        if let Ok(v) = std::env::var("MEDIAPOOL_STORAGE_ENDPOINT") {
            config.storage.endpoint = v;
        }
        if let Ok(v) = std::env::var("MEDIAPOOL_STORAGE_BUCKET") {
            config.storage.bucket = v;
        }
        if let Ok(v) = std::env::var("MEDIAPOOL_STORAGE_ACCESS_KEY_ID") {
            config.storage.access_key_id = v;
        }
        if let Ok(v) = std::env::var("MEDIAPOOL_STORAGE_SECRET_ACCESS_KEY") {
            config.storage.secret_access_key = v;
        }
        if let Ok(v) = std::env::var("MEDIAPOOL_STORAGE_REGION") {
            config.storage.region = v;
        }
        if let Ok(v) = std::env::var("MEDIAPOOL_CDN_BASE_URL") {
            config.cdn.base_url = v;
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        let mut formats = BTreeMap::new();
        formats.insert(
            "small".to_string(),
            FormatConfig {
                width: Some(100),
                height: Some(70),
                quality: 80,
            },
        );
        formats.insert(
            "big".to_string(),
            FormatConfig {
                width: Some(500),
                height: Some(350),
                quality: 80,
            },
        );

        Self {
            storage: StorageConfig {
                backend: "memory".to_string(),
                local_root: "/var/lib/mediapool/media".to_string(),
                endpoint: String::new(),
                bucket: "mediapool-media".to_string(),
                access_key_id: String::new(),
                secret_access_key: String::new(),
                region: "us-east-1".to_string(),
                path_style: false,
                request_timeout_secs: 30,
            },
            cdn: CdnConfig {
                base_url: "/uploads/media".to_string(),
            },
            thumbnails: ThumbnailConfig {
                mode: "format".to_string(),
            },
            providers: ProvidersConfig {
                file: ProviderConfig::default(),
                image: ProviderConfig {
                    allowed_extensions: vec![
                        "jpg".to_string(),
                        "jpeg".to_string(),
                        "png".to_string(),
                        "gif".to_string(),
                        "webp".to_string(),
                    ],
                    allowed_mime_types: vec![
                        "image/jpeg".to_string(),
                        "image/png".to_string(),
                        "image/gif".to_string(),
                        "image/webp".to_string(),
                    ],
                },
            },
            formats,
            contexts: vec![ContextConfig {
                name: "default".to_string(),
                providers: vec!["file".to_string(), "image".to_string()],
                formats: vec!["small".to_string(), "big".to_string()],
            }],
        }
    }
}
