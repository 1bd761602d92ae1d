use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    /// Enable only behind a reverse proxy that overwrites these headers.
    /// Default: false.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// Pool ceiling. Default: 20.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connections kept open while idle. Default: 2.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Log every SQL statement at debug level. Default: false.
    #[serde(default)]
    pub log_queries: bool,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            log_queries: false,
        }
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Lifetime of issued tokens and session cookies. Default: 7.
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
    /// Mark the session cookie `Secure`. Default: false.
    #[serde(default)]
    pub secure_cookies: bool,
}

fn default_token_ttl_days() -> i64 {
    7
}

/// Limits applied to record submissions.
#[derive(Debug, Deserialize, Clone)]
pub struct SubmissionConfig {
    /// Writes allowed per client per minute; 0 disables the check. Default: 30.
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
    /// Maximum serialized size of a record's data in bytes. Default: 64 KiB.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// Retrieval-code lookups allowed per client per minute; 0 disables
    /// the check. Default: 30.
    #[serde(default = "default_rate_limit_per_minute")]
    pub lookup_rate_limit_per_minute: u32,
}

fn default_rate_limit_per_minute() -> u32 {
    30
}

fn default_max_size() -> usize {
    64 * 1024
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: default_rate_limit_per_minute(),
            max_size: default_max_size(),
            lookup_rate_limit_per_minute: default_rate_limit_per_minute(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., OUTREACH__AUTH__JWT_SECRET)
            .add_source(
                Environment::with_prefix("OUTREACH")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors.allow_origins")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}
