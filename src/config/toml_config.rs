use super::AppConfig;
use crate::utils::error::{GreenwardError, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static ENV_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid")
});

impl AppConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(GreenwardError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from a TOML string, substituting `${VAR}` references first.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| GreenwardError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }
}

/// Replaces `${VAR}` with the value of `VAR`; unset variables are left as-is.
pub fn substitute_env_vars(content: &str) -> String {
    ENV_PLACEHOLDER
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::Validate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_basic_toml_config() {
        let toml_content = r#"
[server]
port = 8088
allowed_origins = ["https://wards.example.org"]

[gemini]
api_key = "g-key"

[perplexity]
api_key = "p-key"
model = "sonar"

[maps]
api_key = "m-key"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.gemini.model, "gemini-2.5-pro");
        assert_eq!(config.perplexity.model, "sonar");
        assert_eq!(config.maps.api_key(), Some("m-key"));
        assert_eq!(config.server.frontend_origin(), Some("https://wards.example.org"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("GREENWARD_TEST_GEMINI_KEY", "from-env");

        let toml_content = r#"
[gemini]
api_key = "${GREENWARD_TEST_GEMINI_KEY}"

[perplexity]
api_key = "${GREENWARD_TEST_UNSET_KEY}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.gemini.api_key, "from-env");
        assert_eq!(config.perplexity.api_key, "${GREENWARD_TEST_UNSET_KEY}");

        // the unsubstituted placeholder must not pass validation
        assert!(config.validate().is_err());

        std::env::remove_var("GREENWARD_TEST_GEMINI_KEY");
    }

    #[test]
    fn test_missing_section_is_a_config_error() {
        let err = AppConfig::from_toml_str("[gemini]\napi_key = \"g\"\n").unwrap_err();
        assert!(matches!(err, GreenwardError::ConfigError { .. }));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[gemini]\napi_key = \"g\"\n[perplexity]\napi_key = \"p\"\n[server]\ndata_dir = \"/tmp/greenward\""
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.data_dir, "/tmp/greenward");
        assert!(config
            .server
            .image_dir()
            .ends_with("analysis_images"));
    }
}
