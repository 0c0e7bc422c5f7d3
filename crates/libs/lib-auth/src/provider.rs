//! # Provider Traits
//!
//! Seams between the session core and the remote backend-as-a-service.
//! Production code plugs in the HTTP client; tests plug in hand-written mocks.
//!
//! ```rust,ignore
//! let identity: Arc<dyn IdentityProvider> = Arc::new(client::services::api::ApiClient::new(..));
//! let identity: Arc<dyn IdentityProvider> = Arc::new(MockIdentity::signed_in(user));
//! ```

use async_trait::async_trait;
use lib_core::Result;
use shared::{LoginCredentials, Profile, ProviderSession, SessionChange, SignUpOutcome, SignUpRequest, User};
use tokio::sync::broadcast;

/// Buffer size for session-change fan-out. Receivers that fall further
/// behind than this get a `Lagged` error and must resynchronize.
pub const SESSION_CHANNEL_CAPACITY: usize = 16;

/// Remote identity provider: who is logged in, and notifications when that changes.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The authenticated identity, or `None` if there is no valid session.
    async fn current_user(&self) -> Result<Option<User>>;

    /// Bearer token of the current session.
    async fn session_token(&self) -> Result<Option<String>>;

    /// Subscribe to session transitions. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;

    /// End the session with the provider.
    async fn sign_out(&self) -> Result<()>;
}

/// Keyed read of the denormalized account profile.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the profile row for `user_id`.
    ///
    /// Returns [`lib_core::AppError::NotFound`] when the row does not exist yet.
    async fn get_profile(&self, user_id: &str) -> Result<Profile>;
}

/// Credential flows: request/response calls that create sessions or accounts.
#[async_trait]
pub trait CredentialsApi: Send + Sync {
    async fn sign_in_with_password(&self, credentials: &LoginCredentials) -> Result<ProviderSession>;

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome>;

    async fn resend_signup_confirmation(&self, email: &str) -> Result<()>;
}
