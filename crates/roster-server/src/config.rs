//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Bearer-token settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Verification mail delivery. Absent means mail is disabled.
    #[serde(default)]
    pub mail: Option<MailConfig>,

    /// Notification broker. Absent means notifications stay in-process.
    #[serde(default)]
    pub broker: Option<BrokerConfig>,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Mounts `DELETE /internal/accounts`. Keep off on public listeners.
    #[serde(default)]
    pub enable_admin_routes: bool,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "roster_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Bearer-token configuration.
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret shared with the token issuer. Required.
    #[serde(default)]
    pub token_secret: String,

    /// Expected `iss` claim.
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

/// Transactional-email provider settings.
#[derive(Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_mail_api_url")]
    pub api_url: String,

    /// Sender address for verification mail.
    pub sender: String,

    /// Provider API key, sent as the `api-key` header.
    pub api_key: String,

    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

/// RabbitMQ management API settings.
#[derive(Clone, Deserialize)]
pub struct BrokerConfig {
    /// Base URL of the management API, e.g. `http://localhost:15672`.
    pub api_url: String,

    #[serde(default = "default_vhost")]
    pub vhost: String,

    #[serde(default = "default_exchange")]
    pub exchange: String,

    #[serde(default = "default_routing_key")]
    pub routing_key: String,

    #[serde(default = "default_broker_user")]
    pub username: String,

    #[serde(default = "default_broker_user")]
    pub password: String,

    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "roster.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_issuer() -> String {
    "roster".to_string()
}

fn default_mail_api_url() -> String {
    "https://api.brevo.com/v3/smtp/email".to_string()
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

fn default_vhost() -> String {
    "/".to_string()
}

/// Exchange the message service consumes notifications from.
pub fn default_exchange() -> String {
    "notifications.topic".to_string()
}

/// Routing key the message service binds to.
pub fn default_routing_key() -> String {
    "message-service.notification".to_string()
}

fn default_broker_user() -> String {
    "guest".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_admin_routes: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            issuer: default_issuer(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("api_url", &self.api_url)
            .field("sender", &self.sender)
            .field("api_key", &"[REDACTED]")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("api_url", &self.api_url)
            .field("vhost", &self.vhost)
            .field("exchange", &self.exchange)
            .field("routing_key", &self.routing_key)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but cannot be used.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `ROSTER_HOST` overrides `server.host`
/// - `ROSTER_PORT` overrides `server.port`
/// - `ROSTER_ENABLE_ADMIN_ROUTES` overrides `server.enable_admin_routes`
/// - `ROSTER_DB_PATH` overrides `database.path`
/// - `ROSTER_LOG_LEVEL` overrides `logging.level`
/// - `ROSTER_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `ROSTER_TOKEN_SECRET` overrides `auth.token_secret`
/// - `ROSTER_TOKEN_ISSUER` overrides `auth.issuer`
/// - `ROSTER_MAIL_SENDER` and `ROSTER_MAIL_API_KEY` enable mail when both are set
/// - `ROSTER_BROKER_URL` enables the broker, `ROSTER_BROKER_USERNAME` and
///   `ROSTER_BROKER_PASSWORD` set its credentials
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if the result fails [`validate`].
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Applies `ROSTER_*` overrides read through `var`.
fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("ROSTER_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("ROSTER_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(flag) = var("ROSTER_ENABLE_ADMIN_ROUTES") {
        config.server.enable_admin_routes = flag == "true" || flag == "1";
    }
    if let Some(db_path) = var("ROSTER_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("ROSTER_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("ROSTER_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(secret) = var("ROSTER_TOKEN_SECRET") {
        config.auth.token_secret = secret;
    }
    if let Some(issuer) = var("ROSTER_TOKEN_ISSUER") {
        config.auth.issuer = issuer;
    }

    match (var("ROSTER_MAIL_SENDER"), var("ROSTER_MAIL_API_KEY")) {
        (Some(sender), Some(api_key)) => {
            let mail = config.mail.get_or_insert_with(|| MailConfig {
                api_url: default_mail_api_url(),
                sender: String::new(),
                api_key: String::new(),
                timeout_ms: default_http_timeout_ms(),
            });
            mail.sender = sender;
            mail.api_key = api_key;
        }
        (sender, api_key) => {
            if let Some(mail) = config.mail.as_mut() {
                if let Some(sender) = sender {
                    mail.sender = sender;
                }
                if let Some(api_key) = api_key {
                    mail.api_key = api_key;
                }
            }
        }
    }

    if let Some(url) = var("ROSTER_BROKER_URL") {
        let broker = config.broker.get_or_insert_with(|| BrokerConfig {
            api_url: String::new(),
            vhost: default_vhost(),
            exchange: default_exchange(),
            routing_key: default_routing_key(),
            username: default_broker_user(),
            password: default_broker_user(),
            timeout_ms: default_http_timeout_ms(),
        });
        broker.api_url = url;
    }
    if let Some(broker) = config.broker.as_mut() {
        if let Some(username) = var("ROSTER_BROKER_USERNAME") {
            broker.username = username;
        }
        if let Some(password) = var("ROSTER_BROKER_PASSWORD") {
            broker.password = password;
        }
    }
}

/// Rejects configurations the server cannot start with.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.auth.token_secret.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "auth.token_secret must be set (or ROSTER_TOKEN_SECRET)".to_string(),
        ));
    }
    if config.database.pool_max_size == 0 {
        return Err(ConfigError::Invalid(
            "database.pool_max_size must be at least 1".to_string(),
        ));
    }
    if let Some(mail) = &config.mail {
        if mail.sender.trim().is_empty() || mail.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "mail.sender and mail.api_key are both required when [mail] is present"
                    .to_string(),
            ));
        }
    }
    if let Some(broker) = &config.broker {
        if broker.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "broker.api_url is required when [broker] is present".to_string(),
            ));
        }
    }
    Ok(())
}
