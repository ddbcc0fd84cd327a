//! Trip planner configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Collection name under the configured namespace
pub const PLANS_COLLECTION: &str = "plans";

/// Main trip planner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level override (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Remote document store configuration
    pub store: StoreConfig,

    /// Identity provider configuration
    pub identity: IdentityConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.store.namespace.trim().is_empty() {
            return Err(eyre::eyre!("store.namespace must not be empty"));
        }
        if self.store.namespace.contains(['.', '#', '$', '[', ']']) {
            return Err(eyre::eyre!(
                "store.namespace '{}' contains characters not allowed in a collection path",
                self.store.namespace
            ));
        }
        if self.store.backend == StoreBackend::Http && self.store.base_url.trim().is_empty() {
            return Err(eyre::eyre!("store.base-url is required for the http store backend"));
        }
        if self.identity.provider == IdentityBackend::Http && self.identity.base_url.trim().is_empty() {
            return Err(eyre::eyre!("identity.base-url is required for the http identity provider"));
        }
        Ok(())
    }

    /// Path of the shared plan collection: `{namespace}/plans`
    pub fn collection_path(&self) -> String {
        format!("{}/{}", self.store.namespace.trim_matches('/'), PLANS_COLLECTION)
    }

    /// Load configuration with fallback chain
    ///
    /// An explicit path must load. Otherwise the first candidate that loads
    /// wins, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let loaded = candidate_paths(None).into_iter().find_map(|path| match Self::load_from_file(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                None
            }
        });

        Ok(loaded.unwrap_or_else(|| {
            tracing::info!("No config file found, using defaults");
            Self::default()
        }))
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; full loading reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        candidate_paths(config_path)
            .into_iter()
            .find_map(|p| Self::load_from_file(&p).ok())
            .and_then(|c| c.log_level)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Existing config files in lookup order
///
/// An explicit path is the only candidate; otherwise `./.tripplanner.yml`
/// then `{config_dir}/tripplanner/tripplanner.yml`.
fn candidate_paths(config_path: Option<&PathBuf>) -> Vec<PathBuf> {
    match config_path {
        Some(path) => vec![path.clone()],
        None => std::iter::once(PathBuf::from(".tripplanner.yml"))
            .chain(dirs::config_dir().map(|d| d.join("tripplanner").join("tripplanner.yml")))
            .collect(),
    }
    .into_iter()
    .filter(|p| p.exists())
    .collect()
}

/// Which remote store implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// REST document store with server-sent-event streaming
    #[default]
    Http,
    /// In-process store (single process only, nothing shared)
    Memory,
}

/// Remote document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Database base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Namespace the plan collection lives under
    pub namespace: String,

    /// Request timeout in milliseconds (writes only; the stream has none)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Http,
            base_url: "http://localhost:9000".to_string(),
            namespace: "trip".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Which identity provider implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityBackend {
    /// Identity-toolkit style REST API
    #[default]
    Http,
    /// Random per-session identifier, no provider involved
    Local,
}

/// Identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub provider: IdentityBackend,

    /// Identity API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Public project API key passed as `?key=`
    #[serde(rename = "api-key")]
    pub api_key: String,

    /// Externally issued token exchanged for an identity instead of signing in anonymously
    #[serde(rename = "continuation-token")]
    pub continuation_token: Option<String>,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            provider: IdentityBackend::Http,
            base_url: "http://localhost:9099/identitytoolkit.googleapis.com".to_string(),
            api_key: String::new(),
            continuation_token: None,
            timeout_ms: 15_000,
        }
    }
}
