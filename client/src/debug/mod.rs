//! # Logging Infrastructure
//!
//! Structured `tracing` output for the client binary.
//!
//! ## Features
//!
//! - **File-based logging**: `logs/client.log.<date>` with daily rotation
//! - **Stderr mirror**: compact console output when `CLIENT_LOG_STDERR=1`
//! - **Panic capture**: panics are written to the log before unwinding
//!
//! ## Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Log level filter (e.g., `client=debug,lib_auth=debug,info`)
//! - `CLIENT_LOG_DIR`: Log directory (default: `logs`)
//! - `CLIENT_LOG_STDERR`: Mirror logs to stderr (1=on, 0=off)

pub mod config;
pub mod logger;

pub use config::LogConfig;
pub use logger::init as init_logger;
