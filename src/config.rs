use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::spec_filter::default_filter_paths;

/// Main configuration structure for the assistant backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub controller: ControllerConfig,
    pub llm: LlmConfig,
    pub retry: RetryConfig,
    pub chain: ChainConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub bind: String,
    /// When set, every route but `/health` requires `Authorization: Bearer <password>`
    #[serde(default)]
    pub access_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub docs_path: String,
    pub login_path: String,
    /// Path templates exposed to the language model
    pub allowed_paths: Vec<String>,
    /// Lab controllers usually run with self-signed certificates
    pub accept_invalid_certs: bool,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: i32,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_base: f64,
    pub jitter_factor: f64,
    pub max_total_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Controller responses longer than this are cut before being put in the summary prompt
    pub max_response_chars: usize,
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        let env_paths = ["../.env", ".env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::debug!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("ASSISTANT_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match Self::from_yaml(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path,
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::info!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from a key lookup (the process environment in production)
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(bind) = lookup("ASSISTANT_HTTP_BIND") {
            self.server.bind = bind;
        }
        if let Some(password) = lookup("ASSISTANT_ACCESS_PASSWORD") {
            self.server.access_password = Some(password).filter(|p| !p.is_empty());
        }

        // LLM overrides
        if let Some(api_key) = lookup("OPENAI_API_KEY").or_else(|| lookup("OPEN_API_KEY")) {
            self.llm.api_key = api_key;
        }
        if let Some(base_url) = lookup("ASSISTANT_LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(model) = lookup("ASSISTANT_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(temperature) = lookup("ASSISTANT_LLM_TEMPERATURE") {
            if let Ok(t) = temperature.parse() {
                self.llm.temperature = t;
            }
        }

        if let Some(timeout) = lookup("ASSISTANT_LLM_TIMEOUT_SECONDS") {
            if let Ok(secs) = timeout.parse() {
                self.llm.request_timeout_seconds = secs;
            }
        }

        // Controller overrides
        if let Some(accept) = lookup("APSTRA_ACCEPT_INVALID_CERTS") {
            self.controller.accept_invalid_certs =
                matches!(accept.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(timeout) = lookup("APSTRA_REQUEST_TIMEOUT_SECONDS") {
            if let Ok(secs) = timeout.parse() {
                self.controller.request_timeout_seconds = secs;
            }
        }

        // Retry overrides
        if let Some(attempts) = lookup("ASSISTANT_RETRY_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.retry.max_attempts = n;
            }
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("server.bind '{}' is not host:port", self.server.bind).into());
        }

        if self.llm.api_key.is_empty() {
            return Err("OPENAI_API_KEY environment variable must be set".into());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err("LLM temperature must be between 0.0 and 2.0".into());
        }

        if self.llm.request_timeout_seconds == 0 {
            return Err("LLM request timeout cannot be 0".into());
        }

        if self.controller.allowed_paths.is_empty() {
            return Err("controller.allowed_paths is empty - the model will see no API".into());
        }

        if self.retry.max_attempts == 0 {
            return Err("Retry max_attempts cannot be 0".into());
        }
        if self.retry.jitter_factor < 0.0 || self.retry.jitter_factor > 1.0 {
            return Err("Retry jitter factor must be between 0.0 and 1.0".into());
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.controller.request_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "apstra-assistant".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                bind: "127.0.0.1:8000".to_string(),
                access_password: None,
            },
            controller: ControllerConfig {
                docs_path: "api/docs".to_string(),
                login_path: "api/aaa/login".to_string(),
                allowed_paths: default_filter_paths(),
                accept_invalid_certs: false,
                request_timeout_seconds: 30,
            },
            llm: LlmConfig {
                api_key: String::new(),
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-3.5-turbo".to_string(),
                temperature: 0.0,
                max_tokens: 1024,
                request_timeout_seconds: 60,
            },
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 200,
                max_delay_ms: 30_000,
                backoff_base: 2.0,
                jitter_factor: 0.2,
                max_total_seconds: 300,
            },
            chain: ChainConfig {
                max_response_chars: 12_000,
            },
        }
    }
}
