use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, WeatherChatError};

/// Main configuration structure for the weather chat service
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub workers_ai: WorkersAiConfig,
    pub weather_api: WeatherApiConfig,
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub redis: RedisConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersAiConfig {
    pub account_id: Option<String>,
    pub api_token: Option<String>,
    pub base_url: String,
    pub intent_model: String,
    pub limerick_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherApiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Upper bound for every outbound HTTP call
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub database: u8,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_size: usize,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Key under which the whole history blob is stored
    pub key: String,
    /// Upper bound for a single get/put against the store
    pub op_timeout_ms: u64,
}

/// The three upstream credentials, all present.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub account_id: String,
    pub api_token: String,
    pub weather_api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
        }
    }
}

impl Default for WorkersAiConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            api_token: None,
            base_url: "https://api.cloudflare.com/client/v4".to_string(),
            intent_model: "@cf/meta/llama-3-8b-instruct".to_string(),
            limerick_model: "@cf/meta/llama-3-8b-instruct".to_string(),
        }
    }
}

impl Default for WeatherApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "http://api.weatherapi.com/v1".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay_ms: 200,
            max_delay_ms: 2_000,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 6379,
            database: 0,
            pool: PoolConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            timeout_seconds: 2,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            key: "weather_chat:history".to_string(),
            op_timeout_ms: 2_000,
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::info!("Loaded .env from: {}", path.display()),
            Err(_) => tracing::debug!("No .env file found - continuing with env vars only"),
        }

        let config_path =
            env::var("WEATHER_CHAT_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
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

        // Validate configuration - log warnings but don't fail
        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = env::var("WEATHER_CHAT_BIND") {
            self.server.bind = bind;
        }

        // Credentials
        if let Ok(account_id) = env::var("CF_ACCOUNT_ID") {
            self.workers_ai.account_id = Some(account_id);
        }
        if let Ok(api_token) = env::var("CF_API_TOKEN") {
            self.workers_ai.api_token = Some(api_token);
        }
        if let Ok(api_key) = env::var("WEATHER_API_KEY") {
            self.weather_api.api_key = Some(api_key);
        }

        // Upstream endpoints
        if let Ok(url) = env::var("WORKERS_AI_BASE_URL") {
            self.workers_ai.base_url = url;
        }
        if let Ok(model) = env::var("WORKERS_AI_MODEL") {
            self.workers_ai.intent_model = model.clone();
            self.workers_ai.limerick_model = model;
        }
        if let Ok(url) = env::var("WEATHER_API_BASE_URL") {
            self.weather_api.base_url = url;
        }
        if let Ok(timeout) = env::var("HTTP_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.http.timeout_ms = ms;
            }
        }

        // Redis overrides
        if let Ok(enabled) = env::var("REDIS_ENABLED") {
            if let Ok(flag) = enabled.parse() {
                self.redis.enabled = flag;
            }
        }
        if let Ok(host) = env::var("REDIS_HOST") {
            self.redis.host = host;
        }
        if let Ok(port) = env::var("REDIS_PORT") {
            if let Ok(port_num) = port.parse() {
                self.redis.port = port_num;
            }
        }
        if let Ok(db) = env::var("REDIS_DB") {
            if let Ok(db_num) = db.parse() {
                self.redis.database = db_num;
            }
        }

        if let Ok(key) = env::var("HISTORY_KEY") {
            self.history.key = key;
        }
    }

    /// Validate configuration
    fn validate(&self) -> std::result::Result<(), String> {
        if self.http.timeout_ms == 0 {
            return Err("http.timeout_ms cannot be 0".into());
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts cannot be 0".into());
        }
        if self.redis.enabled && self.redis.port == 0 {
            return Err("Redis port cannot be 0".into());
        }
        if self.history.key.trim().is_empty() {
            return Err("history.key cannot be empty".into());
        }
        if self.credentials().is_err() {
            return Err("upstream credentials are incomplete; /chat will answer 500".into());
        }
        Ok(())
    }

    /// All upstream credentials, or a configuration error that does not say which one is missing.
    pub fn credentials(&self) -> Result<Credentials> {
        fn present(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        match (
            present(&self.workers_ai.account_id),
            present(&self.workers_ai.api_token),
            present(&self.weather_api.api_key),
        ) {
            (Some(account_id), Some(api_token), Some(weather_api_key)) => Ok(Credentials {
                account_id,
                api_token,
                weather_api_key,
            }),
            _ => Err(WeatherChatError::Configuration(
                "Missing API credentials".to_string(),
            )),
        }
    }

    pub fn get_redis_url(&self) -> String {
        format!(
            "redis://{}:{}/{}",
            self.redis.host, self.redis.port, self.redis.database
        )
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http.timeout_ms)
    }

    pub fn history_op_timeout(&self) -> Duration {
        Duration::from_millis(self.history.op_timeout_ms)
    }

    pub fn get_pool_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.timeout_seconds)
    }
}
