//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g. `APP_SEARCH__PER_PAGE`).
//! [`Settings`] is the typed, immutable view handed to the service and binaries.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Upper bound on member ids fetched per bucket when the request gives none.
pub const DEFAULT_MEMBER_ID_CAP: u32 = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendSettings,
    pub dts: DtsSettings,
    pub metadata: MetadataSettings,
    pub search: SearchSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub url: String,
    pub config_dir: String,
    pub document_index: String,
    pub collection_index: String,
    pub timeout_secs: u64,
    pub bulk_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DtsSettings {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    pub file_url: String,
    pub all_years: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub per_page: u32,
    pub content_field: String,
    pub member_id_cap: u32,
    pub lookup_concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub api_version: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            config_dir: "elasticsearch".to_string(),
            document_index: "encpos_document".to_string(),
            collection_index: "encpos_collection".to_string(),
            timeout_secs: 30,
            bulk_timeout_secs: 600,
        }
    }
}

impl Default for DtsSettings {
    fn default() -> Self { Self { url: "http://localhost:5000/api/dts".to_string() } }
}

impl Default for MetadataSettings {
    fn default() -> Self { Self { file_url: String::new(), all_years: "1849-2017".to_string() } }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { per_page: 10, content_field: "content".to_string(), member_id_cap: DEFAULT_MEMBER_ID_CAP, lookup_concurrency: 4 }
    }
}

impl Default for ServerSettings {
    fn default() -> Self { Self { host: "127.0.0.1".to_string(), port: 5003, api_version: "1.0".to_string() } }
}

impl BackendSettings {
    /// Both managed indexes, comma separated, as the admin commands expect them.
    pub fn all_indexes(&self) -> String { format!("{},{}", self.document_index, self.collection_index) }
}

pub struct Config {
    figment: Figment,
    base: PathBuf,
}

impl Config {
    /// Load from the working directory using `RUST_ENV` (default `dev`).
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base: dir.to_path_buf() };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed settings with `backend.config_dir` expanded and resolved against
    /// the directory the configuration was loaded from.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.backend.config_dir = resolve_with_base(&self.base, &settings.backend.config_dir).to_string_lossy().to_string();
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if settings.search.per_page == 0 {
            return Err(Error::InvalidConfig("search.per_page must be at least 1".to_string()).into());
        }
        if settings.search.lookup_concurrency == 0 {
            return Err(Error::InvalidConfig("search.lookup_concurrency must be at least 1".to_string()).into());
        }
        if settings.backend.url.trim().is_empty() {
            return Err(Error::InvalidConfig("backend.url is empty".to_string()).into());
        }
        if settings.backend.document_index.trim().is_empty() {
            return Err(Error::InvalidConfig("backend.document_index is empty".to_string()).into());
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
