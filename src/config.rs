use crate::error::{GenerationError, Result};
use std::env;

pub const DEFAULT_KIE_BASE_URL: &str = "https://api.kie.ai";
pub const API_KEY_ENV: &str = "KIE_API_KEY";

#[derive(Debug, Clone)]
pub struct KieConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: Option<u16>,
    pub kie: KieConfig,
    pub secret_key: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<String>,
}

impl Default for KieConfig {
    fn default() -> Self {
        KieConfig {
            api_key: None,
            base_url: DEFAULT_KIE_BASE_URL.to_string(),
            callback_url: None,
        }
    }
}

impl KieConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let api_key = non_empty_var(API_KEY_ENV);
        let base_url =
            non_empty_var("KIE_BASE_URL").unwrap_or_else(|| DEFAULT_KIE_BASE_URL.to_string());
        let callback_url = non_empty_var("KIE_CALLBACK_URL");

        KieConfig {
            api_key,
            base_url,
            callback_url,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_callback_url(mut self, callback_url: impl Into<String>) -> Self {
        self.callback_url = Some(callback_url.into());
        self
    }

    /// The credential is checked before every provider call, not at startup,
    /// so a server without a key still serves validation errors.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(GenerationError::ConfigError(format!(
                "Missing env: {}",
                API_KEY_ENV
            ))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: None,
            kie: KieConfig::default(),
            secret_key: None,
            log_level: None,
            log_format: None,
            log_file: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let host = non_empty_var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = env::var("PORT").ok().and_then(|port| port.parse().ok());

        Config {
            host,
            port,
            kie: KieConfig::from_env(),
            secret_key: non_empty_var("SESSION_SECRET"),
            log_level: non_empty_var("LOG_LEVEL"),
            log_format: non_empty_var("LOG_FORMAT"),
            log_file: non_empty_var("LOG_FILE"),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_kie(mut self, config: KieConfig) -> Self {
        self.kie = config;
        self
    }

    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(8080)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = KieConfig::new();
        let err = config.require_api_key().unwrap_err();
        assert_eq!(
            err,
            GenerationError::ConfigError("Missing env: KIE_API_KEY".into())
        );
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn test_builders() {
        let kie = KieConfig::new()
            .with_api_key("sk-test")
            .with_base_url("http://localhost:9000/")
            .with_callback_url("https://example.com/hook");
        assert_eq!(kie.require_api_key().unwrap(), "sk-test");
        assert_eq!(kie.base_url, "http://localhost:9000");
        assert_eq!(kie.callback_url.as_deref(), Some("https://example.com/hook"));

        let config = Config::new().with_port(3000).with_kie(kie);
        assert_eq!(config.port_or_default(), 3000);
        assert_eq!(Config::new().port_or_default(), 8080);
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let kie = KieConfig::new().with_api_key("");
        assert!(matches!(
            kie.require_api_key(),
            Err(GenerationError::ConfigError(_))
        ));
    }
}
