use thiserror::Error;

/// Status used when the provider answered over HTTP but the payload was wrong.
pub const PROTOCOL_ERROR_STATUS: u16 = 502;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Provider error ({status}): {message}")]
    ProviderError { status: u16, message: String },
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("Response error: {0}")]
    ResponseError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Unauthorized")]
    Unauthorized,
}

impl GenerationError {
    pub fn validation(message: impl Into<String>) -> Self {
        GenerationError::ValidationError(message.into())
    }

    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        GenerationError::ProviderError {
            status,
            message: message.into(),
        }
    }

    /// Provider replied 2xx but the envelope was not what we expect.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::provider(PROTOCOL_ERROR_STATUS, message)
    }

    /// HTTP status the boundary layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            GenerationError::ValidationError(_) => 400,
            GenerationError::Unauthorized => 401,
            GenerationError::InvalidState(_) => 409,
            GenerationError::ProviderError { status, .. } => *status,
            GenerationError::ConfigError(_)
            | GenerationError::RequestError(_)
            | GenerationError::ResponseError(_)
            | GenerationError::SerializationError(_) => 500,
        }
    }

    /// Message without the category prefix, as rendered to API callers.
    pub fn message(&self) -> String {
        match self {
            GenerationError::ValidationError(msg)
            | GenerationError::ConfigError(msg)
            | GenerationError::RequestError(msg)
            | GenerationError::ResponseError(msg)
            | GenerationError::SerializationError(msg)
            | GenerationError::InvalidState(msg) => msg.clone(),
            GenerationError::ProviderError { message, .. } => message.clone(),
            GenerationError::Unauthorized => "Unauthorized".to_string(),
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        GenerationError::RequestError(e.to_string())
    }
}

impl From<serde_json::Error> for GenerationError {
    fn from(e: serde_json::Error) -> Self {
        GenerationError::SerializationError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;
