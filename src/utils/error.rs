use thiserror::Error;

#[derive(Error, Debug)]
pub enum GreenwardError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    TemplateError(#[from] tera::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("{message}")]
    ValidationError { message: String },

    #[error("{service} request failed with status {status}: {body}")]
    UpstreamError {
        service: String,
        status: u16,
        body: String,
    },

    #[error("{message}")]
    InvalidAiResponse { message: String },

    #[error("Not found: {what}")]
    NotFound { what: String },
}

pub type Result<T> = std::result::Result<T, GreenwardError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Upstream,
    Input,
    Storage,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl GreenwardError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn invalid_ai_response(message: impl Into<String>) -> Self {
        Self::InvalidAiResponse {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) => ErrorCategory::Network,
            Self::IoError(_) => ErrorCategory::Storage,
            Self::SerializationError(_) | Self::TemplateError(_) => ErrorCategory::Internal,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::ValidationError { .. } | Self::NotFound { .. } => ErrorCategory::Input,
            Self::UpstreamError { .. } | Self::InvalidAiResponse { .. } => ErrorCategory::Upstream,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Upstream => ErrorSeverity::Medium,
            ErrorCategory::Storage | ErrorCategory::Internal => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    /// True when the failure came from talking to a remote service over HTTP.
    pub fn is_upstream_http(&self) -> bool {
        matches!(self, Self::HttpError(_) | Self::UpstreamError { .. })
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::HttpError(_) => {
                "Check network connectivity and that the AI service endpoints are reachable".to_string()
            }
            Self::IoError(_) => "Check that the data directory exists and is writable".to_string(),
            Self::SerializationError(_) | Self::TemplateError(_) => {
                "This is a bug; please report it with the request that triggered it".to_string()
            }
            Self::ConfigError { .. } => "Review the configuration file or environment".to_string(),
            Self::MissingConfigError { field } => {
                format!("Set {} in the environment or the config file", field)
            }
            Self::InvalidConfigValueError { field, .. } => {
                format!("Correct the value of {}", field)
            }
            Self::ValidationError { .. } => "Correct the request and try again".to_string(),
            Self::UpstreamError { status, .. } if *status == 401 || *status == 403 => {
                "Verify the API key for the failing service".to_string()
            }
            Self::UpstreamError { status, .. } if *status == 429 => {
                "The service is rate limiting requests; wait and retry".to_string()
            }
            Self::UpstreamError { .. } => "Retry later; the AI service reported an error".to_string(),
            Self::InvalidAiResponse { .. } => {
                "Retry the analysis; the model returned an unusable answer".to_string()
            }
            Self::NotFound { .. } => "Check the requested resource identifier".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Could not reach a remote service: {}", self),
            ErrorCategory::Upstream => format!("AI service problem: {}", self),
            ErrorCategory::Input => self.to_string(),
            ErrorCategory::Storage => format!("Storage problem: {}", self),
            ErrorCategory::Internal => format!("Internal error: {}", self),
        }
    }
}
