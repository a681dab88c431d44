use crate::error::{ApiError, Result};
use crate::rate_limit::RateLimitConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Main application configuration
///
/// Every section has defaults, so an empty file (or no file at all) yields a
/// working service. Secrets can be supplied through the environment instead
/// of the file; see [`AppConfig::apply_env_overrides`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Token issuance configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Per-user rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Report backend configuration
    #[serde(default)]
    pub report: ReportConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Token issuance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing key. When absent a random key is generated at startup
    /// and previously issued tokens stop verifying after a restart.
    #[serde(default)]
    pub secret: Option<String>,
    /// Token lifetime in minutes
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,
}

/// Report backend (Google Gemini) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// API key; without it the analyze endpoint reports the backend as
    /// unavailable
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL of the generateContent endpoint
    #[serde(default = "default_report_base_url")]
    pub base_url: String,
    /// Model name
    #[serde(default = "default_report_model")]
    pub model: String,
    /// Request timeout in seconds
    #[serde(default = "default_report_timeout")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_ttl_minutes() -> u64 {
    30
}

fn default_report_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_report_model() -> String {
    "gemini-pro".to_string()
}

fn default_report_timeout() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_report_base_url(),
            model: default_report_model(),
            timeout_secs: default_report_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ApiError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ApiError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Overlay secrets and tunables from the environment.
    ///
    /// `JWT_SECRET_KEY`, `JWT_ACCESS_TOKEN_EXPIRE_MINUTES`, `GEMINI_API_KEY`
    /// and `GEMINI_MODEL_NAME` take precedence over file values when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = env::var("JWT_SECRET_KEY") {
            self.auth.secret = Some(secret);
        }
        if let Ok(minutes) = env::var("JWT_ACCESS_TOKEN_EXPIRE_MINUTES") {
            if let Ok(minutes) = minutes.parse() {
                self.auth.ttl_minutes = minutes;
            }
        }
        if let Ok(api_key) = env::var("GEMINI_API_KEY") {
            self.report.api_key = Some(api_key);
        }
        if let Ok(model) = env::var("GEMINI_MODEL_NAME") {
            self.report.model = model;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(ApiError::Config("Server host cannot be empty".to_string()));
        }

        if self.auth.ttl_minutes == 0 {
            return Err(ApiError::Config(
                "Token ttl_minutes must be > 0".to_string(),
            ));
        }

        // max_requests = 0 is legal and means "reject everything"; a zero
        // window is not.
        if self.rate_limit.window_secs == 0 {
            return Err(ApiError::Config(
                "Rate limit window must be > 0".to_string(),
            ));
        }

        if !self.report.base_url.starts_with("http://")
            && !self.report.base_url.starts_with("https://")
        {
            return Err(ApiError::Config(
                "Report base_url must start with http:// or https://".to_string(),
            ));
        }

        if self.report.timeout_secs == 0 {
            return Err(ApiError::Config(
                "Report timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
