//! # TradePrem Client
//!
//! Entry point: loads configuration, wires the durable store, API client
//! and session core together, and runs one command.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use client::cli::{render_state, Cli, Command};
use client::debug::{init_logger, LogConfig};
use client::services::api::ApiClient;
use lib_auth::{AuthCache, AuthService, FileStore, KeyValueStore, SessionManager, SessionOptions};
use lib_core::config::init_config;
use lib_core::AppError;
use shared::display_name;

/// Upper bound for `status` on top of the HTTP timeout.
const STATUS_WAIT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let _log_guard = init_logger(&LogConfig::from_env());

    let config = init_config().context("Failed to load configuration")?;

    let cache_path = cli
        .cache_path
        .clone()
        .unwrap_or_else(|| config.cache_path.clone());
    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(&cache_path)
            .with_context(|| format!("Failed to open auth store {}", cache_path.display()))?,
    );

    let cache = AuthCache::with_namespace(
        Arc::clone(&store),
        &config.cache_namespace,
        config.cache_max_age(),
    );
    let api = Arc::new(ApiClient::from_config(config, store)?);
    let service = AuthService::new(api.clone(), api.clone(), cache.clone())
        .with_email_redirect(config.email_redirect_to.clone());
    let options = SessionOptions {
        verify_timeout: config.verify_timeout(),
    };

    tracing::info!(command = cli.command.name(), "Running command");

    match &cli.command {
        Command::Login {
            email,
            phone,
            password,
        } => {
            let result = match (email, phone) {
                (Some(email), _) => service.login_with_email(email, password).await,
                (None, Some(phone)) => service.login_with_phone(phone, password).await,
                (None, None) => Err(AppError::Validation("Email is required".to_string())),
            };
            let user = result.map_err(user_error)?;
            println!("Signed in as {}", display_name(&user, None));
        }

        Command::Register { email, .. } => {
            let form = cli
                .command
                .registration()
                .context("Missing registration arguments")?;
            let result = match email {
                Some(_) => service.register_with_email(&form).await,
                None => service.register_with_phone(&form).await,
            };
            let user = result.map_err(user_error)?;

            if cache.is_valid() {
                println!("Account created; signed in as {}", display_name(&user, None));
            } else {
                println!(
                    "Account created for {}; confirm it from the link we sent",
                    display_name(&user, None)
                );
            }
        }

        Command::Resend { email } => {
            service
                .resend_confirmation_email(email)
                .await
                .map_err(user_error)?;
            println!("Confirmation email sent to {}", email);
        }

        Command::Logout => {
            service.logout().await.map_err(user_error)?;
            println!("Signed out");
        }

        Command::Status => {
            let manager = SessionManager::start(api.clone(), api.clone(), cache.clone(), options);
            let state = match tokio::time::timeout(STATUS_WAIT, manager.initial_verification()).await {
                Ok(state) => state,
                Err(_) => {
                    tracing::warn!("Session verification did not finish in time");
                    manager.snapshot()
                }
            };
            println!("{}", render_state(&state));
            if !state.phase.is_verified() {
                println!("Session not yet confirmed by the backend");
            }
            manager.teardown();
        }

        Command::Watch => {
            let manager = SessionManager::start(api.clone(), api.clone(), cache.clone(), options);
            let mut states = manager.subscribe();
            println!("{}", render_state(&states.borrow_and_update()));

            loop {
                tokio::select! {
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        println!("{}", render_state(&states.borrow_and_update()));
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            manager.teardown();
        }
    }

    Ok(())
}

/// Log the full error and surface only its user-facing message.
fn user_error(e: AppError) -> anyhow::Error {
    tracing::error!(error = %e, "Command failed");
    anyhow::anyhow!(e.user_message())
}
