//! # Session Manager
//!
//! Owns the client's belief about who is logged in and keeps it in step with
//! the identity provider and the durable auth cache.
//!
//! ## Lifecycle
//!
//! 1. [`SessionManager::start`] reads the cache synchronously. A fresh record
//!    is published at once with `loading = false` so the UI never waits on
//!    the network for a common restart.
//! 2. A background pass asks the provider who is logged in. Its answer always
//!    wins over the cache: no identity (or an error) clears state and cache,
//!    a confirmed identity is published, written to the cache, and then its
//!    profile is fetched.
//! 3. A liveness timer releases `loading` if the provider has not answered
//!    in time. It does not cancel the request.
//! 4. Provider session changes are applied in the order they are emitted.
//! 5. [`SessionManager::teardown`] (or drop) unsubscribes and aborts all tasks.
//!
//! ## Ordering
//!
//! Within one pass the user is published before the profile is requested.
//! A profile result is discarded if a different user (or nobody) is
//! published by the time it arrives, and the cache is only written for the
//! user that is currently published.

mod state;


pub use state::{AuthState, SessionPhase};

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use shared::{SessionChange, User};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::AuthCache;
use crate::provider::{IdentityProvider, ProfileStore};

/// Default liveness ceiling for the initial verification.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How long the first verification may keep the state in `loading`.
    pub verify_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
        }
    }
}

/// Reactive holder of the published [`AuthState`].
///
/// Construct one per application root and pass it by reference. Must be
/// started inside a tokio runtime.
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    cache: AuthCache,
    state: watch::Sender<AuthState>,
    /// Set once the provider has produced a terminal answer.
    settled: AtomicBool,
    /// Flipped to `true` when the initial verification pass, profile step included, is done.
    initial_pass: watch::Sender<bool>,
    torn_down: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionManager {
    /// Hydrate from the cache, subscribe to provider changes, and start the
    /// background verification and liveness timer.
    pub fn start(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        cache: AuthCache,
        options: SessionOptions,
    ) -> Self {
        let initial = hydrate(&cache);
        info!(
            phase = %initial.phase,
            user_id = initial.user_id().unwrap_or("-"),
            "Session manager starting"
        );

        let (state, _) = watch::channel(initial);
        let (initial_pass, _) = watch::channel(false);
        let changes = identity.subscribe();

        let inner = Arc::new(Inner {
            identity,
            profiles,
            cache,
            state,
            settled: AtomicBool::new(false),
            initial_pass,
            torn_down: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        });

        inner.spawn(Arc::clone(&inner).listen(changes));

        let verifier = Arc::clone(&inner);
        inner.spawn(async move {
            verifier.verify().await;
            verifier.initial_pass.send_replace(true);
        });

        inner.spawn(Arc::clone(&inner).enforce_liveness(options.verify_timeout));

        Self { inner }
    }

    /// Current published state.
    pub fn snapshot(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every subsequent publish.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Run a full verification pass now and wait for it, profile step included.
    pub async fn verify_now(&self) -> AuthState {
        self.inner.verify().await;
        self.snapshot()
    }

    /// Wait until the first state that is not `loading`.
    pub async fn wait_until_loaded(&self) -> AuthState {
        let mut rx = self.subscribe();
        let state = match rx.wait_for(|state| !state.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.snapshot(),
        };
        state
    }

    /// Wait until the verification pass started by [`SessionManager::start`] has finished.
    ///
    /// Returns at once after teardown.
    pub async fn initial_verification(&self) -> AuthState {
        let mut rx = self.inner.initial_pass.subscribe();
        let _ = rx.wait_for(|done| *done).await;
        self.snapshot()
    }

    /// Unsubscribe from the provider and abort the timer and in-flight work.
    ///
    /// Safe to call any number of times.
    pub fn teardown(&self) {
        self.inner.teardown();
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

/// Initial state from the cache: optimistic when fresh, otherwise waiting on the provider.
fn hydrate(cache: &AuthCache) -> AuthState {
    let Some(stored) = cache.load_valid() else {
        return AuthState::verifying();
    };
    let Some(user) = stored.user else {
        return AuthState::verifying();
    };

    let profile = stored.profile.filter(|profile| profile.id == user.id);
    AuthState::hydrated(user, profile)
}

impl Inner {
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        if self.torn_down.load(Ordering::SeqCst) {
            return;
        }
        tasks.retain(|handle| !handle.is_finished());
        tasks.push(tokio::spawn(task));
    }

    fn teardown(&self) {
        let handles = {
            let mut tasks = self.tasks.lock();
            if self.torn_down.swap(true, Ordering::SeqCst) {
                return;
            }
            std::mem::take(&mut *tasks)
        };

        for handle in &handles {
            handle.abort();
        }
        // The verifier may have been aborted before finishing
        self.initial_pass.send_replace(true);
        debug!(aborted = handles.len(), "Session manager torn down");
    }

    fn is_current_user(&self, user_id: &str) -> bool {
        self.state.borrow().user_id() == Some(user_id)
    }

    /// Ask the provider who is logged in and apply the answer.
    async fn verify(&self) {
        let started = Instant::now();

        match self.identity.current_user().await {
            Ok(Some(user)) => {
                info!(
                    user_id = %user.id,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Session verified"
                );
                self.publish_authenticated(&user);

                match self.identity.session_token().await {
                    Ok(Some(token)) if self.is_current_user(&user.id) => {
                        self.cache.write_identity(&token, &user);
                    }
                    Ok(Some(_)) => debug!(user_id = %user.id, "User superseded before cache write"),
                    Ok(None) => warn!(user_id = %user.id, "Provider confirmed user without a session token"),
                    Err(e) => warn!(user_id = %user.id, error = %e, "Failed to read session token"),
                }

                self.refresh_profile(user).await;
            }
            Ok(None) => {
                info!(
                    duration_ms = started.elapsed().as_millis() as u64,
                    "No active session"
                );
                self.publish_signed_out();
            }
            Err(e) => {
                warn!(error = %e, "Session verification failed; treating as signed out");
                self.publish_signed_out();
            }
        }
    }

    /// Fetch the profile for `user` and attach it, falling back to a matching cached copy.
    async fn refresh_profile(&self, user: User) {
        let fetched = match self.profiles.get_profile(&user.id).await {
            Ok(profile) if profile.id == user.id => Some(profile),
            Ok(profile) => {
                warn!(
                    user_id = %user.id,
                    profile_id = %profile.id,
                    "Profile store returned a row for another user"
                );
                None
            }
            Err(e) if e.is_not_found() => {
                debug!(user_id = %user.id, "Profile not materialized yet");
                None
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Profile fetch failed");
                None
            }
        };

        if !self.is_current_user(&user.id) {
            debug!(user_id = %user.id, "Discarding profile for superseded user");
            return;
        }

        let profile = match fetched {
            Some(profile) => {
                self.cache.write_profile(Some(&profile));
                Some(profile)
            }
            None => self.cache.read().profile_for(&user.id).cloned(),
        };

        let has_profile = profile.is_some();
        let applied = self.state.send_if_modified(|state| {
            if state.user_id() != Some(user.id.as_str()) {
                return false;
            }
            state.set_profile(profile);
            true
        });

        if applied {
            debug!(user_id = %user.id, has_profile, "Profile resolved");
        }
    }

    fn publish_authenticated(&self, user: &User) {
        self.settled.store(true, Ordering::SeqCst);
        self.state.send_modify(|state| {
            let profile = state.profile.take().filter(|profile| profile.id == user.id);
            *state = AuthState::authenticated(user.clone(), profile);
        });
    }

    fn publish_signed_out(&self) {
        self.settled.store(true, Ordering::SeqCst);
        self.state.send_modify(|state| *state = AuthState::signed_out());
        self.cache.clear();
    }

    fn handle_change(self: &Arc<Self>, change: SessionChange) {
        debug!(event = ?change.event, has_session = change.session.is_some(), "Provider session changed");

        match change.session {
            Some(session) => {
                let user = session.user;
                self.publish_authenticated(&user);
                self.cache.write_identity(&session.access_token, &user);

                let inner = Arc::clone(self);
                self.spawn(async move { inner.refresh_profile(user).await });
            }
            None => {
                info!(event = ?change.event, "Provider reported no session");
                self.publish_signed_out();
            }
        }
    }

    async fn listen(self: Arc<Self>, mut changes: broadcast::Receiver<SessionChange>) {
        loop {
            match changes.recv().await {
                Ok(change) => self.handle_change(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed provider session changes; re-verifying");
                    self.verify().await;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Provider closed its session change feed");
                    break;
                }
            }
        }
    }

    async fn enforce_liveness(self: Arc<Self>, timeout: Duration) {
        tokio::time::sleep(timeout).await;
        if self.settled.load(Ordering::SeqCst) {
            return;
        }

        let released = self.state.send_if_modified(|state| {
            if !state.loading {
                return false;
            }
            state.loading = false;
            true
        });

        if released {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Session verification still pending; releasing loading state"
            );
        }
    }
}
