//! # Wire Types
//!
//! Response bodies of the auth and REST endpoints, and their conversion
//! into the shared DTOs.

use serde::Deserialize;
use shared::{ProviderSession, SignUpOutcome, User};

/// Identity object returned by the auth endpoints.
///
/// The backend sends `""` for a contact field that is not set.
#[derive(Debug, Clone, Deserialize)]
pub struct WireUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl From<WireUser> for User {
    fn from(wire: WireUser) -> Self {
        Self {
            id: wire.id,
            email: wire.email.filter(|email| !email.is_empty()),
            phone: wire.phone.filter(|phone| !phone.is_empty()),
        }
    }
}

/// Body of a successful `/token` call (password grant or refresh).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Absolute expiry, Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: WireUser,
}

impl TokenResponse {
    /// Convert into a session, deriving `expires_at` from `expires_in` when absent.
    pub fn into_session(self, now_secs: i64) -> ProviderSession {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|lifetime| now_secs + lifetime));

        ProviderSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|token| !token.is_empty()),
            expires_at,
            user: self.user.into(),
        }
    }
}

/// `/signup` answers with a session when accounts are auto-confirmed and
/// with the bare user otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(TokenResponse),
    User(WireUser),
}

impl SignUpResponse {
    pub fn into_outcome(self, now_secs: i64) -> SignUpOutcome {
        match self {
            SignUpResponse::Session(token) => {
                let session = token.into_session(now_secs);
                SignUpOutcome {
                    user: session.user.clone(),
                    session: Some(session),
                }
            }
            SignUpResponse::User(user) => SignUpOutcome {
                user: user.into(),
                session: None,
            },
        }
    }
}

/// Error body. Auth endpoints use `error_description` or `msg`, REST uses `message`.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .filter(|message| !message.trim().is_empty())
    }
}
