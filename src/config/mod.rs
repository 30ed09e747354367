#[cfg(feature = "cli")]
pub mod cli;
pub mod env;
pub mod toml_config;

use crate::utils::error::Result;
use crate::utils::validation::{
    validate_api_key, validate_path, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
pub const DEFAULT_PERPLEXITY_MODEL: &str = "sonar-pro";
pub const DEFAULT_STATIC_MAP_URL: &str = "https://maps.googleapis.com/maps/api/staticmap";
pub const DEFAULT_MAPS_SDK_URL: &str = "https://maps.googleapis.com/maps/api/js";

/// Origin browsers send for pages opened straight from disk.
pub const FILE_ORIGIN: &str = "null";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub perplexity: PerplexityConfig,
    #[serde(default)]
    pub maps: MapsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: String,
    pub max_upload_bytes: usize,
    pub allowed_origins: Vec<String>,
    pub allowed_extensions: Vec<String>,
    pub session_cookie_secure: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            data_dir: "./instance".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            allowed_origins: default_allowed_origins(),
            allowed_extensions: ["png", "jpg", "jpeg", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            session_cookie_secure: false,
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://127.0.0.1:5500".to_string(),
        "http://localhost:5500".to_string(),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_timeout")]
    pub timeout_seconds: u64,
}

fn default_gemini_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_gemini_timeout() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerplexityConfig {
    pub api_key: String,
    #[serde(default = "default_perplexity_base_url")]
    pub base_url: String,
    #[serde(default = "default_perplexity_model")]
    pub model: String,
    #[serde(default = "default_perplexity_timeout")]
    pub timeout_seconds: u64,
}

fn default_perplexity_base_url() -> String {
    DEFAULT_PERPLEXITY_BASE_URL.to_string()
}

fn default_perplexity_model() -> String {
    DEFAULT_PERPLEXITY_MODEL.to_string()
}

fn default_perplexity_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapsConfig {
    pub api_key: Option<String>,
    pub static_map_url: String,
    pub sdk_url: String,
    pub timeout_seconds: u64,
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            static_map_url: DEFAULT_STATIC_MAP_URL.to_string(),
            sdk_url: DEFAULT_MAPS_SDK_URL.to_string(),
            timeout_seconds: 30,
        }
    }
}

impl GeminiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl PerplexityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl MapsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// The configured key, ignoring blank values.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Origins accepted for CORS. The file origin is always allowed.
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = self
            .allowed_origins
            .iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        if !origins.iter().any(|origin| origin == FILE_ORIGIN) {
            origins.push(FILE_ORIGIN.to_string());
        }
        origins
    }

    /// The frontend the results page links back to.
    pub fn frontend_origin(&self) -> Option<&str> {
        self.allowed_origins
            .iter()
            .map(|origin| origin.trim())
            .find(|origin| !origin.is_empty() && *origin != FILE_ORIGIN)
    }

    pub fn image_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("analysis_images")
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_api_key("gemini.api_key", &self.gemini.api_key)?;
        validate_api_key("perplexity.api_key", &self.perplexity.api_key)?;
        if let Some(key) = self.maps.api_key() {
            validate_api_key("maps.api_key", key)?;
        }

        validate_url("gemini.base_url", &self.gemini.base_url)?;
        validate_url("perplexity.base_url", &self.perplexity.base_url)?;
        validate_url("maps.static_map_url", &self.maps.static_map_url)?;
        validate_url("maps.sdk_url", &self.maps.sdk_url)?;
        for origin in &self.server.allowed_origins {
            if origin != FILE_ORIGIN {
                validate_url("server.allowed_origins", origin)?;
            }
        }

        validate_range("server.port", self.server.port, 1, u16::MAX)?;
        validate_range("server.max_upload_bytes", self.server.max_upload_bytes, 1024, usize::MAX)?;
        validate_path("server.data_dir", &self.server.data_dir)?;
        validate_range("gemini.timeout_seconds", self.gemini.timeout_seconds, 1, 3600)?;
        validate_range("perplexity.timeout_seconds", self.perplexity.timeout_seconds, 1, 3600)?;
        validate_range("maps.timeout_seconds", self.maps.timeout_seconds, 1, 3600)?;

        tracing::debug!("Configuration validation passed");
        Ok(())
    }
}
