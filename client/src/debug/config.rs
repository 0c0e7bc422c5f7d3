//! Logging configuration from environment variables

use std::path::PathBuf;

use lib_utils::get_env_opt;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "client=info,lib_auth=info,warn";

/// Daily-rotated file name prefix inside the log directory.
pub const LOG_FILE_NAME: &str = "client.log";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter (e.g., "client=debug,lib_auth=trace,info")
    pub log_level: String,
    /// Log directory (for rotation)
    pub log_dir: PathBuf,
    /// Mirror log output to stderr
    pub stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_FILTER.to_string(),
            log_dir: PathBuf::from("logs"),
            stderr: false,
        }
    }
}

impl LogConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            log_level: get_env_opt("RUST_LOG").unwrap_or(defaults.log_level),
            log_dir: get_env_opt("CLIENT_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            stderr: get_env_opt("CLIENT_LOG_STDERR")
                .map(|v| is_enabled(&v))
                .unwrap_or(defaults.stderr),
        }
    }

    /// Check if debug logging is enabled
    pub fn is_debug_enabled(&self) -> bool {
        self.log_level.contains("debug") || self.log_level.contains("trace")
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }
}

fn is_enabled(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
