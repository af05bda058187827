//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RETRIEVAL__TOP_K=8`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::Modality;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(SapConfig::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    /// Wrap an already assembled figment (tests, embedding applications).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(SapConfig::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// The full typed settings tree.
    pub fn settings(&self) -> Result<SapConfig> {
        self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SapConfig {
    pub stores: StoresConfig,
    pub retrieval: RetrievalConfig,
    pub providers: ProvidersConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

impl SapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into()));
        }
        if self.retrieval.k_rrf == 0 {
            return Err(Error::InvalidConfig("retrieval.k_rrf must be at least 1".into()));
        }
        if self.providers.timeout_secs == 0 || self.chat.timeout_secs == 0 {
            return Err(Error::InvalidConfig("provider timeouts must be non-zero".into()));
        }
        if !self.providers.use_fake && self.providers.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig("providers.base_url is empty".into()));
        }
        if self.chat.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig("chat.base_url is empty".into()));
        }
        Ok(())
    }
}

/// Where the three read-only vector stores live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoresConfig {
    pub base_dir: String,
    pub text_dir: String,
    pub caption_dir: String,
    pub image_dir: String,
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self {
            base_dir: "vector_stores".to_string(),
            text_dir: "text_faiss".to_string(),
            caption_dir: "caption_faiss".to_string(),
            image_dir: "image_faiss".to_string(),
        }
    }
}

impl StoresConfig {
    pub fn base_path(&self) -> PathBuf {
        expand_path(&self.base_dir)
    }

    /// Directory holding `index.faiss` + `metadata.json` for one modality.
    pub fn dir_for(&self, modality: Modality) -> PathBuf {
        let name = match modality {
            Modality::Text => &self.text_dir,
            Modality::Caption => &self.caption_dir,
            Modality::Image => &self.image_dir,
        };
        resolve_with_base(&self.base_path(), name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub k_rrf: u32,
    /// Fused items rendered into the chat context.
    pub context_items: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5, k_rrf: 60, context_items: 3 }
    }
}

/// Hosted model service providing text/image embeddings and captions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub base_url: String,
    pub embed_path: String,
    pub image_path: String,
    pub caption_path: String,
    pub timeout_secs: u64,
    /// L2-normalise returned vectors before searching inner-product indices.
    pub normalize: bool,
    pub use_fake: bool,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7860".to_string(),
            embed_path: "/embed".to_string(),
            image_path: "/dino".to_string(),
            caption_path: "/llava".to_string(),
            timeout_secs: 60,
            normalize: true,
            use_fake: false,
        }
    }
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.2,
            max_tokens: 300,
            timeout_secs: 60,
        }
    }
}

impl ChatConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "info".to_string() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
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
