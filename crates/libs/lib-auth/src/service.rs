//! # Auth Flows
//!
//! Sign-in, sign-up, confirmation resend and sign-out as thin wrappers over
//! the provider traits. The only state they touch is the durable auth cache.

use std::sync::Arc;

use lib_core::{AppError, Result};
use lib_utils::{validate_email, validate_not_empty, validate_phone};
use shared::{LoginCredentials, ProviderSession, RegisterCredentials, SignUpMetadata, SignUpRequest, User};

use crate::cache::AuthCache;
use crate::provider::{CredentialsApi, IdentityProvider};

pub struct AuthService {
    credentials: Arc<dyn CredentialsApi>,
    identity: Arc<dyn IdentityProvider>,
    cache: AuthCache,
    email_redirect_to: Option<String>,
}

impl AuthService {
    pub fn new(
        credentials: Arc<dyn CredentialsApi>,
        identity: Arc<dyn IdentityProvider>,
        cache: AuthCache,
    ) -> Self {
        Self {
            credentials,
            identity,
            cache,
            email_redirect_to: None,
        }
    }

    /// Landing URL for the email confirmation link.
    pub fn with_email_redirect(mut self, url: Option<String>) -> Self {
        self.email_redirect_to = url;
        self
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn login_with_email(&self, email: &str, password: &str) -> Result<User> {
        let email = email.trim();
        validate_not_empty(email, "Email")?;
        validate_email(email)?;
        validate_not_empty(password, "Password")?;

        let credentials = LoginCredentials::Email {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.sign_in(&credentials).await
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn login_with_phone(&self, phone: &str, password: &str) -> Result<User> {
        let phone = phone.trim();
        validate_not_empty(phone, "Phone number")?;
        validate_phone(phone)?;
        validate_not_empty(password, "Password")?;

        let credentials = LoginCredentials::Phone {
            phone: phone.to_string(),
            password: password.to_string(),
        };
        self.sign_in(&credentials).await
    }

    async fn sign_in(&self, credentials: &LoginCredentials) -> Result<User> {
        let session = self.credentials.sign_in_with_password(credentials).await?;
        self.remember(&session);

        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session.user)
    }

    /// Create an account identified by email. The confirmation link lands on
    /// the configured redirect.
    #[tracing::instrument(skip_all)]
    pub async fn register_with_email(&self, form: &RegisterCredentials) -> Result<User> {
        check_passwords(form)?;
        let email = form
            .email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AppError::Validation("Email is required".to_string()))?;
        validate_email(email)?;

        let request = SignUpRequest {
            email: Some(email.to_string()),
            phone: None,
            password: form.password.clone(),
            data: SignUpMetadata {
                name: form.full_name.trim().to_string(),
                phone: non_blank(form.phone.as_deref()),
                invitation_code: non_blank(form.invitation_code.as_deref()),
            },
            email_redirect_to: self.email_redirect_to.clone(),
        };
        self.sign_up(&request).await
    }

    #[tracing::instrument(skip_all)]
    pub async fn register_with_phone(&self, form: &RegisterCredentials) -> Result<User> {
        check_passwords(form)?;
        let phone = non_blank(form.phone.as_deref())
            .ok_or_else(|| AppError::Validation("Phone number is required".to_string()))?;
        validate_phone(&phone)?;

        let request = SignUpRequest {
            email: None,
            phone: Some(phone.clone()),
            password: form.password.clone(),
            data: SignUpMetadata {
                name: form.full_name.trim().to_string(),
                phone: Some(phone),
                invitation_code: non_blank(form.invitation_code.as_deref()),
            },
            email_redirect_to: None,
        };
        self.sign_up(&request).await
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<User> {
        let outcome = self.credentials.sign_up(request).await?;

        match &outcome.session {
            Some(session) => {
                self.remember(session);
                tracing::info!(user_id = %outcome.user.id, "Registered and signed in");
            }
            None => tracing::info!(user_id = %outcome.user.id, "Registered; confirmation pending"),
        }
        Ok(outcome.user)
    }

    #[tracing::instrument(skip(self))]
    pub async fn resend_confirmation_email(&self, email: &str) -> Result<()> {
        let email = email.trim();
        validate_not_empty(email, "Email")?;
        validate_email(email)?;

        self.credentials.resend_signup_confirmation(email).await
    }

    /// End the provider session and clear the cache.
    ///
    /// The cache is cleared even when the provider call fails; that failure
    /// is still returned.
    pub async fn logout(&self) -> Result<()> {
        let result = self.identity.sign_out().await;
        self.cache.clear();

        match &result {
            Ok(()) => tracing::info!("Signed out"),
            Err(e) => tracing::warn!(error = %e, "Provider sign-out failed; local session cleared"),
        }
        result
    }

    fn remember(&self, session: &ProviderSession) {
        self.cache
            .write(Some(&session.access_token), Some(&session.user), None);
    }
}

fn check_passwords(form: &RegisterCredentials) -> Result<()> {
    if form.password != form.confirm_password {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }
    validate_not_empty(&form.password, "Password")?;
    Ok(())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
