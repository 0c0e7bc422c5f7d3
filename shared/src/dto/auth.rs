use serde::{Deserialize, Serialize};

/// Authenticated identity as known to the client.
///
/// This is the bare identity claim returned by the identity provider. Richer
/// account data lives in [`crate::dto::profile::Profile`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            phone: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// Password sign-in credentials. Exactly one of email or phone identifies the account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum LoginCredentials {
    Email { email: String, password: String },
    Phone { phone: String, password: String },
}

/// Registration form as submitted by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterCredentials {
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
    pub confirm_password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invitation_code: Option<String>,
}

/// Sign-up request forwarded to the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignUpRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
    /// User metadata stored alongside the identity (`name`, `phone`).
    pub data: SignUpMetadata,
    /// Where the confirmation link should land. Not part of the JSON body.
    #[serde(skip)]
    pub email_redirect_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignUpMetadata {
    pub name: String,
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invitation_code: Option<String>,
}

/// Result of a sign-up. `session` is present only when the backend
/// auto-confirms new accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub user: User,
    pub session: Option<ProviderSession>,
}

/// A session issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderSession {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access token expiry (Unix timestamp, seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl ProviderSession {
    /// Whether the access token expires within `leeway_secs` of `now_secs`.
    pub fn expires_within(&self, now_secs: i64, leeway_secs: i64) -> bool {
        self.expires_at
            .map(|expires_at| expires_at - now_secs <= leeway_secs)
            .unwrap_or(false)
    }
}

/// Kind of identity-provider session transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Notification emitted by the identity provider whenever its session changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub session: Option<ProviderSession>,
}

impl SessionChange {
    pub fn signed_in(session: ProviderSession) -> Self {
        Self {
            event: SessionEvent::SignedIn,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            event: SessionEvent::SignedOut,
            session: None,
        }
    }

    pub fn token_refreshed(session: ProviderSession) -> Self {
        Self {
            event: SessionEvent::TokenRefreshed,
            session: Some(session),
        }
    }
}
