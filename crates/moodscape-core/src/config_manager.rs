use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::security::{AuthConfig, DEFAULT_JWT_EXPIRY_HOURS, MIN_RECOMMENDED_SECRET_LEN};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "moodscape.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for the MoodScape backend
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MoodscapeConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub auth: AuthSettings,

    /// Groq / OpenAI-compatible chat completion settings
    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Built frontend to serve for non-API paths
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path; a `sqlite://` prefix is accepted
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
        }
    }
}

impl DatabaseConfig {
    pub fn path(&self) -> PathBuf {
        let url = self.url.as_str();
        let stripped = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        PathBuf::from(stripped)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    // Secrets are read from the file or env, never written back out.
    #[serde(default, skip_serializing)]
    pub jwt_secret: Option<SecretString>,

    #[serde(default = "default_jwt_expiry_hours")]
    pub jwt_expiry_hours: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiry_hours: default_jwt_expiry_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// No key means the AI features run on keyword fallbacks
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    #[serde(default = "default_ai_base_url")]
    pub base_url: String,

    #[serde(default = "default_ai_model")]
    pub model: String,

    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            timeout_secs: default_ai_timeout_secs(),
        }
    }
}

impl AiConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().trim().is_empty())
    }
}

/// General per-IP limiter. The login, chat and journal limits are fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_window_ms")]
    pub window_ms: u64,

    #[serde(default = "default_rate_limit_max")]
    pub max_requests: u32,

    /// Reverse proxies in front of the server. The client address is taken
    /// this many entries from the right of `X-Forwarded-For`; 0 ignores
    /// forwarding headers entirely.
    #[serde(default = "default_trusted_proxy_hops")]
    pub trusted_proxy_hops: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_rate_limit_window_ms(),
            max_requests: default_rate_limit_max(),
            trusted_proxy_hops: default_trusted_proxy_hops(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}
fn default_database_url() -> String {
    "moodscape.db".to_string()
}
fn default_pool_size() -> u32 {
    8
}
fn default_jwt_expiry_hours() -> u64 {
    DEFAULT_JWT_EXPIRY_HOURS
}
fn default_ai_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_ai_model() -> String {
    "openai/gpt-oss-20b".to_string()
}
fn default_ai_timeout_secs() -> u64 {
    10
}
fn default_rate_limit_window_ms() -> u64 {
    60_000
}
fn default_rate_limit_max() -> u32 {
    100
}
fn default_trusted_proxy_hops() -> usize {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct ConfigManager {
    config: MoodscapeConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load `.env`, then the TOML file (explicit path or `./moodscape.toml`),
    /// then environment overrides, and validate the result.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        info!("Loading MoodScape configuration");

        Self::load_dotenv();

        let (config, config_path) = Self::load_config_file(explicit_path)?;
        let config = Self::apply_env_overrides(config);

        Self::validate_config(&config)?;

        match &config_path {
            Some(path) => info!(config_file = %path.display(), "Configuration loaded"),
            None => info!("Configuration loaded (no config file, using defaults)"),
        }
        info!(
            port = config.server.port,
            database = %config.database.path().display(),
            ai_model = %config.ai.model,
            ai_enabled = config.ai.is_configured(),
            "Effective settings"
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn from_config(config: MoodscapeConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            } else {
                info!("Loaded .env file from current directory");
            }
        }
    }

    fn load_config_file(
        explicit_path: Option<&Path>,
    ) -> Result<(MoodscapeConfig, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            let config = Self::read_toml_file(path)?;
            return Ok((config, Some(path.to_path_buf())));
        }

        let local_config = Path::new(DEFAULT_CONFIG_FILE);
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        Ok((MoodscapeConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<MoodscapeConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(config: MoodscapeConfig) -> MoodscapeConfig {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(mut config: MoodscapeConfig, var: F) -> MoodscapeConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(port) = var("PORT").and_then(|v| v.parse().ok()) {
            config.server.port = port;
        }
        if let Some(origins) = var("CORS_ORIGINS") {
            config.server.cors_origins = parse_origins(&origins);
        }
        if let Some(dir) = var("STATIC_DIR") {
            config.server.static_dir = Some(PathBuf::from(dir));
        }

        // Database
        if let Some(url) = var("DATABASE_URL") {
            config.database.url = url;
        }
        if let Some(size) = var("DATABASE_POOL_SIZE").and_then(|v| v.parse().ok()) {
            config.database.pool_size = size;
        }

        // Auth
        if let Some(secret) = var("JWT_SECRET") {
            config.auth.jwt_secret = Some(SecretString::from(secret));
        }
        if let Some(hours) = var("JWT_EXPIRY_HOURS").and_then(|v| v.parse().ok()) {
            config.auth.jwt_expiry_hours = hours;
        }

        // AI
        if let Some(key) = var("GROQ_API_KEY") {
            config.ai.api_key = Some(SecretString::from(key));
        }
        if let Some(url) = var("GROQ_BASE_URL") {
            config.ai.base_url = url;
        }
        if let Some(model) = var("GROQ_MODEL") {
            config.ai.model = model;
        }
        if let Some(secs) = var("GROQ_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.ai.timeout_secs = secs;
        }

        // Rate limiting
        if let Some(window) = var("RATE_LIMIT_WINDOW").and_then(|v| v.parse().ok()) {
            config.rate_limit.window_ms = window;
        }
        if let Some(max) = var("RATE_LIMIT_MAX").and_then(|v| v.parse().ok()) {
            config.rate_limit.max_requests = max;
        }
        if let Some(hops) = var("TRUST_PROXY_HOPS").and_then(|v| v.parse().ok()) {
            config.rate_limit.trusted_proxy_hops = hops;
        }

        // Logging
        if let Some(level) = var("RUST_LOG") {
            config.logging.level = level;
        }

        config
    }

    fn validate_config(config: &MoodscapeConfig) -> Result<(), ConfigError> {
        if config.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Port must be non-zero".to_string(),
            ));
        }

        if config.database.pool_size == 0 {
            return Err(ConfigError::ValidationError(
                "Database pool size must be at least 1".to_string(),
            ));
        }

        match &config.auth.jwt_secret {
            Some(secret) if !secret.expose_secret().is_empty() => {
                if secret.expose_secret().len() < MIN_RECOMMENDED_SECRET_LEN {
                    warn!(
                        "JWT_SECRET is shorter than {} characters",
                        MIN_RECOMMENDED_SECRET_LEN
                    );
                }
            }
            _ => {
                return Err(ConfigError::ValidationError(
                    "JWT_SECRET must be set".to_string(),
                ))
            }
        }

        if config.rate_limit.window_ms == 0 || config.rate_limit.max_requests == 0 {
            return Err(ConfigError::ValidationError(
                "Rate limit window and max must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn config(&self) -> &MoodscapeConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn auth_config(&self) -> Result<AuthConfig, ConfigError> {
        let secret = self
            .config
            .auth
            .jwt_secret
            .clone()
            .ok_or_else(|| ConfigError::ValidationError("JWT_SECRET must be set".to_string()))?;

        AuthConfig::new(secret, self.config.auth.jwt_expiry_hours)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = MoodscapeConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}
