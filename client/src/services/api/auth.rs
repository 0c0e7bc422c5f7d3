//! # Authentication Endpoints
//!
//! Identity and credential flows against `/auth/v1`.

use std::time::Instant;

use async_trait::async_trait;
use lib_auth::{CredentialsApi, IdentityProvider};
use lib_core::{AppError, Result};
use lib_utils::now_secs;
use reqwest::StatusCode;
use shared::{
    LoginCredentials, ProviderSession, SessionChange, SessionEvent, SignUpOutcome, SignUpRequest, User,
};
use tokio::sync::broadcast;

use super::client::{error_from, network_error, read_json, ApiClient};
use super::wire::{SignUpResponse, TokenResponse, WireUser};

#[async_trait]
impl IdentityProvider for ApiClient {
    /// Ask the backend who owns the current access token.
    ///
    /// A token the backend rejects ends the session and yields `None`.
    #[tracing::instrument(skip(self))]
    async fn current_user(&self) -> Result<Option<User>> {
        let Some(session) = self.valid_session().await? else {
            tracing::debug!("No provider session");
            return Ok(None);
        };
        let start = Instant::now();

        let response = self
            .client
            .get(self.url("/auth/v1/user"))
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| network_error(e, "Fetch user"))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::info!(status = status.as_u16(), "Provider rejected stored session");
            self.set_session(None, SessionEvent::SignedOut);
            return Ok(None);
        }

        let user: User = read_json::<WireUser>(response, "Fetch user").await?.into();
        tracing::debug!(
            user_id = %user.id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetched current user"
        );

        if user != session.user {
            let updated = ProviderSession {
                user: user.clone(),
                ..session
            };
            self.set_session(Some(updated), SessionEvent::UserUpdated);
        }

        Ok(Some(user))
    }

    async fn session_token(&self) -> Result<Option<String>> {
        Ok(self
            .valid_session()
            .await?
            .map(|session| session.access_token))
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes()
    }

    /// Revoke the session remotely, then drop it locally whatever the outcome.
    #[tracing::instrument(skip(self))]
    async fn sign_out(&self) -> Result<()> {
        let token = self.session().map(|session| session.access_token);

        let result = match token {
            Some(token) => self.revoke(&token).await,
            None => Ok(()),
        };

        self.set_session(None, SessionEvent::SignedOut);
        result
    }
}

impl ApiClient {
    async fn revoke(&self, access_token: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/auth/v1/logout"))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| network_error(e, "Sign out"))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            // Already gone on the backend
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(()),
            _ => Err(error_from(response, "Sign out").await),
        }
    }
}

#[async_trait]
impl CredentialsApi for ApiClient {
    #[tracing::instrument(skip_all)]
    async fn sign_in_with_password(&self, credentials: &LoginCredentials) -> Result<ProviderSession> {
        tracing::info!("Attempting sign in");
        let start = Instant::now();

        let response = self
            .client
            .post(self.url("/auth/v1/token"))
            .query(&[("grant_type", "password")])
            .json(credentials)
            .send()
            .await
            .map_err(|e| network_error(e, "Sign in"))?;

        let session = read_json::<TokenResponse>(response, "Sign in")
            .await?
            .into_session(now_secs());
        if session.access_token.is_empty() {
            return Err(AppError::Auth("Authentication failed".to_string()));
        }

        tracing::info!(
            user_id = %session.user.id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Sign in successful"
        );
        self.set_session(Some(session.clone()), SessionEvent::SignedIn);
        Ok(session)
    }

    #[tracing::instrument(skip_all)]
    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome> {
        let mut builder = self.client.post(self.url("/auth/v1/signup"));
        if let Some(redirect) = &request.email_redirect_to {
            builder = builder.query(&[("redirect_to", redirect.as_str())]);
        }

        let response = builder
            .json(request)
            .send()
            .await
            .map_err(|e| network_error(e, "Sign up"))?;

        let outcome = read_json::<SignUpResponse>(response, "Sign up")
            .await?
            .into_outcome(now_secs());

        if let Some(session) = &outcome.session {
            self.set_session(Some(session.clone()), SessionEvent::SignedIn);
        }
        Ok(outcome)
    }

    #[tracing::instrument(skip(self))]
    async fn resend_signup_confirmation(&self, email: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/auth/v1/resend"))
            .json(&serde_json::json!({ "type": "signup", "email": email }))
            .send()
            .await
            .map_err(|e| network_error(e, "Resend confirmation"))?;

        if response.status().is_success() {
            tracing::info!("Confirmation email resent");
            Ok(())
        } else {
            Err(error_from(response, "Resend confirmation").await)
        }
    }
}
