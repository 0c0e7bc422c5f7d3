//! Hand-written provider doubles for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lib_core::{AppError, Result};
use parking_lot::Mutex;
use shared::{
    LoginCredentials, Profile, ProviderSession, SessionChange, SignUpOutcome, SignUpRequest, User,
};
use tokio::sync::{broadcast, Notify};

use crate::provider::{CredentialsApi, IdentityProvider, ProfileStore, SESSION_CHANNEL_CAPACITY};

pub fn session_for(user: &User, token: &str) -> ProviderSession {
    ProviderSession {
        access_token: token.to_string(),
        refresh_token: Some(format!("refresh-{token}")),
        expires_at: None,
        user: user.clone(),
    }
}

#[derive(Debug, Clone)]
pub enum IdentityReply {
    User(User),
    NoUser,
    Error,
    /// Never resolves.
    Hang,
}

pub struct MockIdentity {
    reply: Mutex<IdentityReply>,
    token: Mutex<Option<String>>,
    gate: Option<Arc<Notify>>,
    changes: broadcast::Sender<SessionChange>,
    pub current_user_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    fail_sign_out: bool,
}

impl MockIdentity {
    pub fn new(reply: IdentityReply) -> Self {
        let (changes, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
        let token = match &reply {
            IdentityReply::User(user) => Some(format!("token-{}", user.id)),
            _ => None,
        };
        Self {
            reply: Mutex::new(reply),
            token: Mutex::new(token),
            gate: None,
            changes,
            current_user_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            fail_sign_out: false,
        }
    }

    pub fn signed_in(user: User) -> Self {
        Self::new(IdentityReply::User(user))
    }

    pub fn signed_out() -> Self {
        Self::new(IdentityReply::NoUser)
    }

    /// `current_user` waits for [`MockIdentity::release`] before answering.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn without_token(self) -> Self {
        *self.token.lock() = None;
        self
    }

    pub fn failing_sign_out(mut self) -> Self {
        self.fail_sign_out = true;
        self
    }

    pub fn set_reply(&self, reply: IdentityReply) {
        *self.reply.lock() = reply;
    }

    pub fn emit(&self, change: SessionChange) {
        let _ = self.changes.send(change);
    }

    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    pub fn calls(&self) -> usize {
        self.current_user_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn current_user(&self) -> Result<Option<User>> {
        self.current_user_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let reply = self.reply.lock().clone();
        match reply {
            IdentityReply::User(user) => Ok(Some(user)),
            IdentityReply::NoUser => Ok(None),
            IdentityReply::Error => Err(AppError::Api("connection refused".to_string())),
            IdentityReply::Hang => std::future::pending().await,
        }
    }

    async fn session_token(&self) -> Result<Option<String>> {
        Ok(self.token.lock().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out {
            return Err(AppError::Api("sign out failed".to_string()));
        }
        *self.reply.lock() = IdentityReply::NoUser;
        *self.token.lock() = None;
        let _ = self.changes.send(SessionChange::signed_out());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum ProfileReply {
    Found(Profile),
    NotFound,
    Error,
}

#[derive(Default)]
pub struct MockProfiles {
    replies: Mutex<HashMap<String, ProfileReply>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    pub calls: AtomicUsize,
}

impl MockProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, user_id: &str, reply: ProfileReply) -> Self {
        self.replies.lock().insert(user_id.to_string(), reply);
        self
    }

    pub fn found(self, profile: Profile) -> Self {
        let id = profile.id.clone();
        self.with(&id, ProfileReply::Found(profile))
    }

    /// Fetches for `user_id` wait until the returned handle is notified.
    pub fn gate(&self, user_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(user_id.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for MockProfiles {
    async fn get_profile(&self, user_id: &str) -> Result<Profile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().get(user_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let reply = self.replies.lock().get(user_id).cloned();
        match reply {
            Some(ProfileReply::Found(profile)) => Ok(profile),
            Some(ProfileReply::Error) => Err(AppError::Api("profile store unavailable".to_string())),
            Some(ProfileReply::NotFound) | None => {
                Err(AppError::NotFound("User profile not found".to_string()))
            }
        }
    }
}

#[derive(Default)]
pub struct MockCredentials {
    pub session: Mutex<Option<ProviderSession>>,
    pub sign_up_outcome: Mutex<Option<SignUpOutcome>>,
    pub sign_ins: Mutex<Vec<LoginCredentials>>,
    pub sign_ups: Mutex<Vec<SignUpRequest>>,
    pub resent_to: Mutex<Vec<String>>,
}

impl MockCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepting(session: ProviderSession) -> Self {
        let mock = Self::default();
        *mock.session.lock() = Some(session);
        mock
    }

    pub fn with_sign_up(self, outcome: SignUpOutcome) -> Self {
        *self.sign_up_outcome.lock() = Some(outcome);
        self
    }
}

#[async_trait]
impl CredentialsApi for MockCredentials {
    async fn sign_in_with_password(&self, credentials: &LoginCredentials) -> Result<ProviderSession> {
        self.sign_ins.lock().push(credentials.clone());
        self.session
            .lock()
            .clone()
            .ok_or_else(|| AppError::Auth("Invalid login credentials".to_string()))
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome> {
        self.sign_ups.lock().push(request.clone());
        self.sign_up_outcome
            .lock()
            .clone()
            .ok_or_else(|| AppError::Auth("User already registered".to_string()))
    }

    async fn resend_signup_confirmation(&self, email: &str) -> Result<()> {
        self.resent_to.lock().push(email.to_string());
        Ok(())
    }
}
