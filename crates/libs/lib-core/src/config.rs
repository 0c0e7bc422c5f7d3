//! # Application Configuration
//!
//! This module manages client configuration loaded from environment variables.
//! All configuration is validated on startup to fail fast if misconfigured.
//!
//! ## Global Config Access
//!
//! Use [`core_config()`] to access the global configuration instance:
//!
//! ```rust,no_run
//! use lib_core::config::core_config;
//!
//! let config = core_config();
//! let backend = &config.backend_url;
//! ```
//!
//! The config must be initialized once at application startup using [`init_config()`].
//! Libraries take the individual values they need as constructor arguments and
//! never read the global themselves.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use lib_utils::envs::{get_env, get_env_opt, get_env_parse_or};

use crate::error::{AppError, Result};

/// Client configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the backend-as-a-service (identity + REST endpoints)
    pub backend_url: String,

    /// Publishable (anon) API key sent with every request
    pub anon_key: String,

    /// File backing the durable client-side key/value store
    pub cache_path: PathBuf,

    /// Prefix for the durable auth cache slots (`<ns>_token`, `<ns>_user`, ...)
    pub cache_namespace: String,

    /// How long a cached auth record may be used for optimistic hydration
    ///
    /// Valid range: 1-720 hours (1 hour to 30 days)
    pub cache_max_age_hours: i64,

    /// Liveness ceiling for the initial session verification
    ///
    /// Valid range: 100-60000 ms
    pub verify_timeout_ms: u64,

    /// Landing URL for sign-up confirmation links
    pub email_redirect_to: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let backend_url = get_env("SUPABASE_URL")
            .map_err(|_| AppError::Config("SUPABASE_URL must be set in environment".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let anon_key = get_env("SUPABASE_ANON_KEY").map_err(|_| {
            AppError::Config("SUPABASE_ANON_KEY must be set in environment".to_string())
        })?;

        let cache_path = get_env_opt("AUTH_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/auth-store.json"));

        let cache_namespace =
            get_env_opt("AUTH_CACHE_NAMESPACE").unwrap_or_else(|| "tp_auth".to_string());

        let cache_max_age_hours = get_env_parse_or("AUTH_CACHE_MAX_AGE_HOURS", 24).map_err(|_| {
            AppError::Config("AUTH_CACHE_MAX_AGE_HOURS must be a valid number".to_string())
        })?;

        let verify_timeout_ms = get_env_parse_or("AUTH_VERIFY_TIMEOUT_MS", 2000).map_err(|_| {
            AppError::Config("AUTH_VERIFY_TIMEOUT_MS must be a valid number".to_string())
        })?;

        Ok(Self {
            backend_url,
            anon_key,
            cache_path,
            cache_namespace,
            cache_max_age_hours,
            verify_timeout_ms,
            email_redirect_to: get_env_opt("AUTH_EMAIL_REDIRECT_TO"),
        })
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if !(self.backend_url.starts_with("https://") || self.backend_url.starts_with("http://")) {
            return Err(AppError::Config(
                "SUPABASE_URL must start with http:// or https://".to_string(),
            ));
        }

        if self.anon_key.trim().is_empty() {
            return Err(AppError::Config("SUPABASE_ANON_KEY must not be empty".to_string()));
        }

        if self.cache_namespace.is_empty()
            || !self
                .cache_namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AppError::Config(
                "AUTH_CACHE_NAMESPACE may only contain letters, digits, '_' and '-'".to_string(),
            ));
        }

        if self.cache_max_age_hours < 1 || self.cache_max_age_hours > 720 {
            return Err(AppError::Config(
                "AUTH_CACHE_MAX_AGE_HOURS must be between 1 and 720 (30 days)".to_string(),
            ));
        }

        if self.verify_timeout_ms < 100 || self.verify_timeout_ms > 60_000 {
            return Err(AppError::Config(
                "AUTH_VERIFY_TIMEOUT_MS must be between 100 and 60000".to_string(),
            ));
        }

        Ok(())
    }

    /// Maximum age of a cached auth record.
    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_hours as u64 * 60 * 60)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }
}

/// Global configuration instance (initialized once at startup).
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Initialize the global configuration.
///
/// This should be called once at application startup, after `.env` has been
/// loaded and before any service that needs configuration is built.
///
/// # Errors
///
/// Returns an error if:
/// - Environment variables are missing or invalid
/// - Configuration validation fails
/// - Config has already been initialized
pub fn init_config() -> Result<&'static Config> {
    let config = Config::from_env()?;
    config.validate()?;

    tracing::debug!(
        backend_url = %config.backend_url,
        cache_path = %config.cache_path.display(),
        cache_namespace = %config.cache_namespace,
        cache_max_age_hours = config.cache_max_age_hours,
        verify_timeout_ms = config.verify_timeout_ms,
        "Configuration loaded"
    );

    CONFIG
        .set(config)
        .map_err(|_| AppError::Config("Config has already been initialized".to_string()))?;

    Ok(core_config())
}

/// Get a reference to the global configuration.
///
/// # Panics
///
/// Panics if [`init_config()`] has not been called yet.
pub fn core_config() -> &'static Config {
    CONFIG.get().expect("Config must be initialized with init_config() before use")
}
