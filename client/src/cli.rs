//! # Command Line Interface
//!
//! Argument definitions and state rendering for the `tradeprem` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lib_auth::AuthState;
use shared::{display_name, RegisterCredentials};

#[derive(Parser, Debug)]
#[command(name = "tradeprem", version, about = "TradePrem account session client")]
pub struct Cli {
    /// Override the auth store location (AUTH_CACHE_PATH)
    #[arg(long, global = true)]
    pub cache_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in with email or phone and password
    Login {
        #[arg(long, conflicts_with = "phone", required_unless_present = "phone")]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long, env = "TRADEPREM_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account; uses email when given, phone otherwise
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long, env = "TRADEPREM_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[arg(long)]
        invitation_code: Option<String>,
    },

    /// Resend the sign-up confirmation email
    Resend {
        #[arg(long)]
        email: String,
    },

    /// Sign out and clear the local session
    Logout,

    /// Verify the stored session and print who is logged in
    Status,

    /// Print every session state change until interrupted
    Watch,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login { .. } => "login",
            Command::Register { .. } => "register",
            Command::Resend { .. } => "resend",
            Command::Logout => "logout",
            Command::Status => "status",
            Command::Watch => "watch",
        }
    }

    /// Registration form for [`Command::Register`].
    pub fn registration(&self) -> Option<RegisterCredentials> {
        match self {
            Command::Register {
                name,
                email,
                phone,
                password,
                confirm_password,
                invitation_code,
            } => Some(RegisterCredentials {
                full_name: name.clone(),
                email: email.clone(),
                phone: phone.clone(),
                password: password.clone(),
                confirm_password: confirm_password.clone(),
                invitation_code: invitation_code.clone(),
            }),
            _ => None,
        }
    }
}

/// One-line summary of a published state.
pub fn render_state(state: &AuthState) -> String {
    let who = match &state.user {
        Some(user) => display_name(user, state.profile.as_ref()),
        None => "signed out".to_string(),
    };

    let mut line = format!("[{}] {}", state.phase, who);
    if let Some(profile) = &state.profile {
        line.push_str(&format!(
            " (kyc: {:?}, balance: {:.2})",
            profile.kyc_status, profile.trading_balance
        ));
    }
    if state.loading {
        line.push_str(" ...");
    }
    line
}
