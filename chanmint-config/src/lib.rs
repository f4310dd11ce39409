//! # Chanmint Config
//!
//! Configuration management for the chanmint service.
//!
//! A [`ServiceConfig`] can be assembled with [`ServiceConfigBuilder`], read from
//! JSON or TOML files, or loaded from environment variables. Every loader runs
//! [`ServiceConfig::validate`] before handing the configuration back.
//!
//! ## Loading from environment variables
//!
//! ```no_run
//! use chanmint_config::ServiceConfig;
//!
//! // CHANMINT_APP_ID=demo-app
//! // CHANMINT_APP_CERTIFICATE_FILE=/run/secrets/app_key.pem
//! // CHANMINT_CHANNEL_TTL=3600
//! let config = ServiceConfig::from_env_or_file("CHANMINT")
//!     .expect("Failed to load configuration from environment");
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CHANNEL_TTL: i64 = 3600;
pub const DEFAULT_CHANNEL_PREFIX: &str = "channel_";
pub const DEFAULT_CHANNEL_NAME_MIN: u32 = 100_000;
pub const DEFAULT_CHANNEL_NAME_MAX: u32 = 999_999;
pub const DEFAULT_SWEEP_INTERVAL: u64 = 300;
pub const DEFAULT_APP_TOKEN_TTL: i64 = 3600;
pub const DEFAULT_IDENTITY_API_TIMEOUT: u64 = 10;

/// How a token expiry is chosen when the caller does not supply one.
///
/// Serialized as the string `"never"` or as a number of seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ExpiryPolicyRepr", into = "ExpiryPolicyRepr")]
pub enum ExpiryPolicy {
    /// The token carries no expiry at all.
    Never,
    /// The token expires the given number of seconds after issuance.
    Ttl(i64),
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        ExpiryPolicy::Ttl(DEFAULT_CHANNEL_TTL)
    }
}

impl ExpiryPolicy {
    /// Resolve the policy into an absolute expiry timestamp, saturating at `i64::MAX`.
    pub fn resolve(&self, now: i64) -> Option<i64> {
        match self {
            ExpiryPolicy::Never => None,
            ExpiryPolicy::Ttl(seconds) => Some(now.saturating_add(*seconds)),
        }
    }
}

impl fmt::Display for ExpiryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryPolicy::Never => write!(f, "never"),
            ExpiryPolicy::Ttl(seconds) => write!(f, "{}", seconds),
        }
    }
}

impl FromStr for ExpiryPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.eq_ignore_ascii_case("never") || value.eq_ignore_ascii_case("none") {
            return Ok(ExpiryPolicy::Never);
        }
        match value.parse::<i64>() {
            Ok(seconds) if seconds > 0 => Ok(ExpiryPolicy::Ttl(seconds)),
            _ => Err(ConfigError::InvalidExpiryPolicy(s.to_string())),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ExpiryPolicyRepr {
    Seconds(i64),
    Keyword(String),
}

impl TryFrom<ExpiryPolicyRepr> for ExpiryPolicy {
    type Error = ConfigError;

    fn try_from(repr: ExpiryPolicyRepr) -> Result<Self, Self::Error> {
        match repr {
            ExpiryPolicyRepr::Seconds(seconds) if seconds > 0 => Ok(ExpiryPolicy::Ttl(seconds)),
            ExpiryPolicyRepr::Seconds(seconds) => {
                Err(ConfigError::InvalidExpiryPolicy(seconds.to_string()))
            }
            ExpiryPolicyRepr::Keyword(keyword) => keyword.parse(),
        }
    }
}

impl From<ExpiryPolicy> for ExpiryPolicyRepr {
    fn from(policy: ExpiryPolicy) -> Self {
        match policy {
            ExpiryPolicy::Never => ExpiryPolicyRepr::Keyword("never".to_string()),
            ExpiryPolicy::Ttl(seconds) => ExpiryPolicyRepr::Seconds(seconds),
        }
    }
}

/// Connection settings for the remote identity provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityApiConfig {
    /// Base URL including the scheme, e.g. `https://chat.example.com/org/app`
    pub base_url: String,
    /// Static bearer token. When absent the service signs an app token per call.
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_identity_api_timeout")]
    pub timeout_secs: u64,
}

/// Configuration for the chanmint service
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub app_id: String,
    /// PEM encoded ed25519 private key used to sign every token
    pub app_certificate: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Lifetime of a minted channel in seconds
    #[serde(default = "default_channel_ttl")]
    pub channel_ttl: i64,
    #[serde(default = "default_channel_prefix")]
    pub channel_prefix: String,
    #[serde(default = "default_channel_name_min")]
    pub channel_name_min: u32,
    #[serde(default = "default_channel_name_max")]
    pub channel_name_max: u32,
    /// Seconds between background sweeps of expired channels, 0 disables the sweeper
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64,
    /// Expiry applied to join and identity tokens issued without an explicit one
    #[serde(default)]
    pub token_expiry: ExpiryPolicy,
    /// Lifetime of app tokens in seconds
    #[serde(default = "default_app_token_ttl")]
    pub app_token_ttl: i64,
    #[serde(default)]
    pub identity_api: Option<IdentityApiConfig>,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("app_id", &self.app_id)
            .field("app_certificate", &"<redacted>")
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("channel_ttl", &self.channel_ttl)
            .field("channel_prefix", &self.channel_prefix)
            .field("channel_name_min", &self.channel_name_min)
            .field("channel_name_max", &self.channel_name_max)
            .field("sweep_interval", &self.sweep_interval)
            .field("token_expiry", &self.token_expiry)
            .field("app_token_ttl", &self.app_token_ttl)
            .field(
                "identity_api",
                &self.identity_api.as_ref().map(|api| &api.base_url),
            )
            .finish()
    }
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_channel_ttl() -> i64 {
    DEFAULT_CHANNEL_TTL
}

fn default_channel_prefix() -> String {
    DEFAULT_CHANNEL_PREFIX.to_string()
}

fn default_channel_name_min() -> u32 {
    DEFAULT_CHANNEL_NAME_MIN
}

fn default_channel_name_max() -> u32 {
    DEFAULT_CHANNEL_NAME_MAX
}

fn default_sweep_interval() -> u64 {
    DEFAULT_SWEEP_INTERVAL
}

fn default_app_token_ttl() -> i64 {
    DEFAULT_APP_TOKEN_TTL
}

fn default_identity_api_timeout() -> u64 {
    DEFAULT_IDENTITY_API_TIMEOUT
}

/// Errors that can occur when working with chanmint configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("App ID is required but was not provided.")]
    MissingAppId,

    #[error("App certificate is required but was not provided. Please provide a PEM-encoded private key.")]
    MissingAppCertificate,

    #[error("Invalid certificate format: {0}. Please ensure the key is properly PEM-encoded.")]
    InvalidCertificate(String),

    #[error("Invalid port number. Port must be a valid number between 1-65535.")]
    InvalidPort,

    #[error("Invalid {0}: durations must be positive numbers of seconds.")]
    InvalidDuration(&'static str),

    #[error("Invalid channel name range: minimum {min} is greater than maximum {max}.")]
    InvalidNameRange { min: u32, max: u32 },

    #[error("Invalid token expiry policy '{0}'. Use 'never' or a positive number of seconds.")]
    InvalidExpiryPolicy(String),

    #[error("Invalid identity API URL '{0}'. The URL must start with http:// or https://.")]
    InvalidIdentityApiUrl(String),

    #[error("I/O error occurred while reading configuration: {0}. Please check file permissions and paths.")]
    IOError(String),

    #[error("Failed to parse configuration data: {0}. Please ensure the configuration format is correct.")]
    ParseError(String),

    #[error("Environment variable error: {0}. Please ensure all required environment variables are set correctly.")]
    EnvVarError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(error: std::io::Error) -> Self {
        ConfigError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

impl From<env::VarError> for ConfigError {
    fn from(error: env::VarError) -> Self {
        ConfigError::EnvVarError(error.to_string())
    }
}

/// Builder for ServiceConfig
///
/// ```no_run
/// # fn main() -> Result<(), chanmint_config::ConfigError> {
/// use chanmint_config::{ExpiryPolicy, ServiceConfigBuilder};
///
/// let config = ServiceConfigBuilder::new()
///     .app_id("demo-app")
///     .app_certificate(std::fs::read_to_string("app_key.pem")?)
///     .channel_ttl(1800)
///     .token_expiry(ExpiryPolicy::Never)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default, Debug)]
pub struct ServiceConfigBuilder {
    app_id: Option<String>,
    app_certificate: Option<String>,
    bind_address: Option<String>,
    port: Option<u16>,
    channel_ttl: Option<i64>,
    channel_prefix: Option<String>,
    channel_name_range: Option<(u32, u32)>,
    sweep_interval: Option<u64>,
    token_expiry: Option<ExpiryPolicy>,
    app_token_ttl: Option<i64>,
    identity_api: Option<IdentityApiConfig>,
}

impl ServiceConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder seeded from an existing configuration
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            app_id: Some(config.app_id.clone()),
            app_certificate: Some(config.app_certificate.clone()),
            bind_address: Some(config.bind_address.clone()),
            port: Some(config.port),
            channel_ttl: Some(config.channel_ttl),
            channel_prefix: Some(config.channel_prefix.clone()),
            channel_name_range: Some((config.channel_name_min, config.channel_name_max)),
            sweep_interval: Some(config.sweep_interval),
            token_expiry: Some(config.token_expiry),
            app_token_ttl: Some(config.app_token_ttl),
            identity_api: config.identity_api.clone(),
        }
    }

    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Set the PEM encoded signing key
    pub fn app_certificate(mut self, certificate: impl Into<String>) -> Self {
        self.app_certificate = Some(certificate.into());
        self
    }

    pub fn bind_address(mut self, bind_address: impl Into<String>) -> Self {
        self.bind_address = Some(bind_address.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn channel_ttl(mut self, seconds: i64) -> Self {
        self.channel_ttl = Some(seconds);
        self
    }

    pub fn channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.channel_prefix = Some(prefix.into());
        self
    }

    /// Set the inclusive range the numeric part of channel names is drawn from
    pub fn channel_name_range(mut self, min: u32, max: u32) -> Self {
        self.channel_name_range = Some((min, max));
        self
    }

    pub fn sweep_interval(mut self, seconds: u64) -> Self {
        self.sweep_interval = Some(seconds);
        self
    }

    pub fn token_expiry(mut self, policy: ExpiryPolicy) -> Self {
        self.token_expiry = Some(policy);
        self
    }

    pub fn app_token_ttl(mut self, seconds: i64) -> Self {
        self.app_token_ttl = Some(seconds);
        self
    }

    pub fn identity_api(mut self, identity_api: IdentityApiConfig) -> Self {
        self.identity_api = Some(identity_api);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ServiceConfig, ConfigError> {
        let (channel_name_min, channel_name_max) = self
            .channel_name_range
            .unwrap_or((DEFAULT_CHANNEL_NAME_MIN, DEFAULT_CHANNEL_NAME_MAX));

        let config = ServiceConfig {
            app_id: self.app_id.ok_or(ConfigError::MissingAppId)?,
            app_certificate: self
                .app_certificate
                .ok_or(ConfigError::MissingAppCertificate)?,
            bind_address: self.bind_address.unwrap_or_else(default_bind_address),
            port: self.port.unwrap_or(DEFAULT_PORT),
            channel_ttl: self.channel_ttl.unwrap_or(DEFAULT_CHANNEL_TTL),
            channel_prefix: self.channel_prefix.unwrap_or_else(default_channel_prefix),
            channel_name_min,
            channel_name_max,
            sweep_interval: self.sweep_interval.unwrap_or(DEFAULT_SWEEP_INTERVAL),
            token_expiry: self.token_expiry.unwrap_or_default(),
            app_token_ttl: self.app_token_ttl.unwrap_or(DEFAULT_APP_TOKEN_TTL),
            identity_api: self.identity_api,
        };

        config.validate()?;

        Ok(config)
    }
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::new()
    }

    /// Convert this configuration to a builder for modification
    pub fn to_builder(&self) -> ServiceConfigBuilder {
        ServiceConfigBuilder::from_config(self)
    }

    /// Address the HTTP listener binds to
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Create a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: ServiceConfig = serde_json::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration from a TOML file
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: ServiceConfig = toml::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON or TOML file, picking the format from the extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(path),
            _ => Self::from_file(path),
        }
    }

    /// Create a configuration from environment variables
    ///
    /// The variables are named with the given prefix followed by:
    /// - APP_ID
    /// - APP_CERTIFICATE: the PEM key content
    /// - BIND_ADDRESS, PORT (optional)
    /// - CHANNEL_TTL, CHANNEL_PREFIX, CHANNEL_NAME_MIN, CHANNEL_NAME_MAX (optional)
    /// - SWEEP_INTERVAL (optional)
    /// - TOKEN_EXPIRY: `never` or seconds (optional)
    /// - APP_TOKEN_TTL (optional)
    /// - IDENTITY_API_URL, IDENTITY_API_TOKEN, IDENTITY_API_TIMEOUT (optional)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        Self::load_env(prefix, false)
    }

    /// Like [`ServiceConfig::from_env`], but secrets may also be read from files.
    ///
    /// When `{prefix}_APP_CERTIFICATE_FILE` or `{prefix}_IDENTITY_API_TOKEN_FILE`
    /// is set, the file at that path is read instead of the inline variable.
    pub fn from_env_or_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::load_env(prefix, true)
    }

    fn load_env(prefix: &str, allow_files: bool) -> Result<Self, ConfigError> {
        let app_id = env_var(prefix, "APP_ID")?.ok_or(ConfigError::MissingAppId)?;
        let app_certificate = env_or_file(prefix, "APP_CERTIFICATE", allow_files)?
            .ok_or(ConfigError::MissingAppCertificate)?;

        let bind_address = env_var(prefix, "BIND_ADDRESS")?.unwrap_or_else(default_bind_address);
        let port = parse_env(prefix, "PORT", |_| ConfigError::InvalidPort)?.unwrap_or(DEFAULT_PORT);
        let channel_ttl = parse_env(prefix, "CHANNEL_TTL", |_| {
            ConfigError::InvalidDuration("channel_ttl")
        })?
        .unwrap_or(DEFAULT_CHANNEL_TTL);
        let channel_prefix =
            env_var(prefix, "CHANNEL_PREFIX")?.unwrap_or_else(default_channel_prefix);
        let channel_name_min = parse_env(prefix, "CHANNEL_NAME_MIN", ConfigError::ParseError)?
            .unwrap_or(DEFAULT_CHANNEL_NAME_MIN);
        let channel_name_max = parse_env(prefix, "CHANNEL_NAME_MAX", ConfigError::ParseError)?
            .unwrap_or(DEFAULT_CHANNEL_NAME_MAX);
        let sweep_interval = parse_env(prefix, "SWEEP_INTERVAL", |_| {
            ConfigError::InvalidDuration("sweep_interval")
        })?
        .unwrap_or(DEFAULT_SWEEP_INTERVAL);
        let token_expiry = match env_var(prefix, "TOKEN_EXPIRY")? {
            Some(value) => value.parse()?,
            None => ExpiryPolicy::default(),
        };
        let app_token_ttl = parse_env(prefix, "APP_TOKEN_TTL", |_| {
            ConfigError::InvalidDuration("app_token_ttl")
        })?
        .unwrap_or(DEFAULT_APP_TOKEN_TTL);

        let identity_api = match env_var(prefix, "IDENTITY_API_URL")? {
            Some(base_url) => Some(IdentityApiConfig {
                base_url,
                bearer_token: env_or_file(prefix, "IDENTITY_API_TOKEN", allow_files)?,
                timeout_secs: parse_env(prefix, "IDENTITY_API_TIMEOUT", |_| {
                    ConfigError::InvalidDuration("identity_api.timeout_secs")
                })?
                .unwrap_or(DEFAULT_IDENTITY_API_TIMEOUT),
            }),
            None => None,
        };

        let config = ServiceConfig {
            app_id,
            app_certificate,
            bind_address,
            port,
            channel_ttl,
            channel_prefix,
            channel_name_min,
            channel_name_max,
            sweep_interval,
            token_expiry,
            app_token_ttl,
            identity_api,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Checks that all required fields are present and that durations and
    /// ranges are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_id.trim().is_empty() {
            return Err(ConfigError::MissingAppId);
        }

        if self.app_certificate.trim().is_empty() {
            return Err(ConfigError::MissingAppCertificate);
        }

        if !self.app_certificate.contains("BEGIN") || !self.app_certificate.contains("PRIVATE KEY")
        {
            return Err(ConfigError::InvalidCertificate(
                "Key does not contain proper PEM markers".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if self.channel_ttl <= 0 {
            return Err(ConfigError::InvalidDuration("channel_ttl"));
        }

        if self.app_token_ttl <= 0 {
            return Err(ConfigError::InvalidDuration("app_token_ttl"));
        }

        if self.channel_name_min > self.channel_name_max {
            return Err(ConfigError::InvalidNameRange {
                min: self.channel_name_min,
                max: self.channel_name_max,
            });
        }

        if let ExpiryPolicy::Ttl(seconds) = self.token_expiry {
            if seconds <= 0 {
                return Err(ConfigError::InvalidExpiryPolicy(seconds.to_string()));
            }
        }

        if let Some(identity_api) = &self.identity_api {
            let url = identity_api.base_url.trim();
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidIdentityApiUrl(url.to_string()));
            }
            if identity_api.timeout_secs == 0 {
                return Err(ConfigError::InvalidDuration("identity_api.timeout_secs"));
            }
        }

        Ok(())
    }
}

fn env_var(prefix: &str, name: &str) -> Result<Option<String>, ConfigError> {
    match env::var(format!("{}_{}", prefix, name)) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn env_or_file(prefix: &str, name: &str, allow_files: bool) -> Result<Option<String>, ConfigError> {
    if allow_files {
        if let Some(path) = env_var(prefix, &format!("{}_FILE", name))? {
            let content = fs::read_to_string(&path).map_err(|e| {
                ConfigError::IOError(format!("Failed to read {} from {}: {}", name, path, e))
            })?;
            return Ok(Some(content.trim_end().to_string()));
        }
    }
    env_var(prefix, name)
}

fn parse_env<T, F>(prefix: &str, name: &str, on_error: F) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: FnOnce(String) -> ConfigError,
{
    match env_var(prefix, name)? {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| on_error(format!("{}_{}={}", prefix, name, raw))),
        None => Ok(None),
    }
}

fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(stripped) => dirs::home_dir().map(|home| home.join(stripped)),
        None => Some(PathBuf::from(path)),
    }
}

/// Try to load a configuration from standard locations
///
/// This function attempts to load a configuration from:
/// 1. Environment variables with the prefix "CHANMINT"
/// 2. A file at ./chanmint.json
/// 3. A file at ~/.chanmint/config.json
/// 4. A file at /etc/chanmint/config.json
/// 5. The TOML twins of those files
///
/// Returns None if no configuration could be found.
pub fn try_load_default_config() -> Option<ServiceConfig> {
    if let Ok(config) = ServiceConfig::from_env_or_file("CHANMINT") {
        return Some(config);
    }

    let paths = [
        "./chanmint.json",
        "~/.chanmint/config.json",
        "/etc/chanmint/config.json",
        "./chanmint.toml",
        "~/.chanmint/config.toml",
        "/etc/chanmint/config.toml",
    ];

    paths
        .iter()
        .filter_map(|path| expand_home(path))
        .filter(|path| path.exists())
        .find_map(|path| ServiceConfig::from_path(&path).ok())
}
