//! Configuration management for the ChemTrade CRM/PMS backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with CHEMTRADE_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT verification configuration (tokens are issued by the identity provider)
    pub auth: AuthConfig,

    /// Gemini AI provider configuration
    pub gemini: GeminiConfig,

    /// Web search provider configuration
    pub search: SearchConfig,

    /// Profile-refresh worker configuration
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Shared secret used to verify bearer tokens
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    /// Gemini API key
    pub api_key: String,

    /// Chat completion model
    pub chat_model: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Google Programmable Search Engine API key
    pub google_pse_api_key: String,

    /// Google Programmable Search Engine ID
    pub google_pse_cx: String,

    /// SerpAPI key
    pub serpapi_api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Whether the profile-refresh worker runs inside this process
    pub enabled: bool,

    /// Seconds between polls when the job queue is empty
    pub poll_interval_secs: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("CHEMTRADE_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("auth.jwt_secret", "development-secret-key")?
            .set_default("gemini.api_key", "")?
            .set_default("gemini.chat_model", "gemini-2.5-flash")?
            .set_default("search.google_pse_api_key", "")?
            .set_default("search.google_pse_cx", "")?
            .set_default("search.serpapi_api_key", "")?
            .set_default("worker.enabled", false)?
            .set_default("worker.poll_interval_secs", 15)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (CHEMTRADE_ prefix)
            .add_source(
                Environment::with_prefix("CHEMTRADE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
