use super::{AppConfig, GeminiConfig, MapsConfig, PerplexityConfig, ServerConfig};
use crate::utils::error::{GreenwardError, Result};
use std::str::FromStr;

impl AppConfig {
    /// Builds the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &str| {
            get(key).ok_or_else(|| GreenwardError::MissingConfigError {
                field: key.to_string(),
            })
        };

        let mut server = ServerConfig::default();
        if let Some(raw) = get("FRONTEND_ORIGIN") {
            server.allowed_origins = raw
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }
        if let Some(host) = get("HOST") {
            server.host = host;
        }
        if let Some(port) = get("PORT") {
            server.port = parse_value("PORT", &port)?;
        }
        if let Some(dir) = get("DATA_DIR") {
            server.data_dir = dir;
        }
        if let Some(limit) = get("MAX_CONTENT_LENGTH") {
            server.max_upload_bytes = parse_value("MAX_CONTENT_LENGTH", &limit)?;
        }
        if let Some(secure) = get("SESSION_COOKIE_SECURE") {
            server.session_cookie_secure = parse_flag("SESSION_COOKIE_SECURE", &secure)?;
        }

        let gemini = GeminiConfig {
            api_key: required("GEMINI_API_KEY")?,
            base_url: get("GEMINI_BASE_URL").unwrap_or_else(super::default_gemini_base_url),
            model: get("GEMINI_MODEL").unwrap_or_else(super::default_gemini_model),
            timeout_seconds: match get("GEMINI_TIMEOUT_SECONDS") {
                Some(raw) => parse_value("GEMINI_TIMEOUT_SECONDS", &raw)?,
                None => super::default_gemini_timeout(),
            },
        };

        let perplexity = PerplexityConfig {
            api_key: required("PERPLEXITY_API_KEY")?,
            base_url: get("PERPLEXITY_BASE_URL")
                .unwrap_or_else(super::default_perplexity_base_url),
            model: get("PERPLEXITY_MODEL").unwrap_or_else(super::default_perplexity_model),
            timeout_seconds: match get("PERPLEXITY_TIMEOUT_SECONDS") {
                Some(raw) => parse_value("PERPLEXITY_TIMEOUT_SECONDS", &raw)?,
                None => super::default_perplexity_timeout(),
            },
        };

        let mut maps = MapsConfig {
            api_key: get("GOOGLE_MAPS_API_KEY"),
            ..MapsConfig::default()
        };
        if let Some(url) = get("STATIC_MAP_BASE_URL") {
            maps.static_map_url = url;
        }

        Ok(Self {
            server,
            gemini,
            perplexity,
            maps,
        })
    }
}

fn parse_value<T: FromStr>(field: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| GreenwardError::InvalidConfigValueError {
            field: field.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn parse_flag(field: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(GreenwardError::InvalidConfigValueError {
            field: field.to_string(),
            value: raw.to_string(),
            reason: "Expected a boolean (true/false)".to_string(),
        }),
    }
}
