//! File-based logging initialization

use std::fs;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::config::{LogConfig, DEFAULT_FILTER, LOG_FILE_NAME};

/// Initialize the logging system
///
/// Sets up:
/// - Daily rotated log file in `log_dir` (non-blocking writes)
/// - Optional compact stderr output
/// - Panic hook that records panics in the log
///
/// Keep the returned guard alive for the lifetime of the program; dropping
/// it flushes and stops the file writer.
pub fn init(config: &LogConfig) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (file_layer, guard) = match fs::create_dir_all(&config.log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false); // No ANSI codes in log files

            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!(
                "Warning: Failed to create log directory {}: {}",
                config.log_dir.display(),
                e
            );
            (None, None)
        }
    };

    let stderr_layer = config.stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
    {
        eprintln!("Warning: Logging already initialized: {}", e);
    }

    tracing::info!(
        log_file = %config.log_file().display(),
        log_level = %config.log_level,
        stderr = config.stderr,
        "Logging initialized"
    );

    setup_panic_hook();
    guard
}

/// Log panics with their location before the default handler runs
fn setup_panic_hook() {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic message".to_string()
        };

        tracing::error!(location = %location, message = %message, "Application panic");

        default_panic(panic_info);
    }));
}
