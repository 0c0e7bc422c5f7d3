//! # Published Session State
//!
//! The single view of "who is logged in" that the rest of the client renders from.

use shared::{Profile, User};

/// Where the session manager is in its lifecycle.
///
/// ```text
/// Uninitialized ──► HydratedFromCache ──┐
///        │                              ├──► AuthenticatedNoProfile ──► AuthenticatedWithProfile
///        └──────► Verifying ────────────┤
///                                       └──► Unauthenticated
/// ```
///
/// The three terminal phases stay re-enterable through provider session changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No state published yet
    Uninitialized,
    /// Cached identity published optimistically; verification in flight
    HydratedFromCache,
    /// No usable cache; waiting on the provider
    Verifying,
    /// Provider confirmed the user; profile not (yet) available
    AuthenticatedNoProfile,
    /// Provider confirmed the user and a profile is attached
    AuthenticatedWithProfile,
    /// Provider reported no session (or could not be reached)
    Unauthenticated,
}

impl SessionPhase {
    /// Whether the provider has answered at least once for this state.
    pub fn is_verified(&self) -> bool {
        matches!(
            self,
            SessionPhase::AuthenticatedNoProfile
                | SessionPhase::AuthenticatedWithProfile
                | SessionPhase::Unauthenticated
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Uninitialized => "uninitialized",
            SessionPhase::HydratedFromCache => "hydrated_from_cache",
            SessionPhase::Verifying => "verifying",
            SessionPhase::AuthenticatedNoProfile => "authenticated_no_profile",
            SessionPhase::AuthenticatedWithProfile => "authenticated_with_profile",
            SessionPhase::Unauthenticated => "unauthenticated",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published auth state.
///
/// `is_authenticated` always equals `user.is_some()`; a missing profile
/// never makes the state unauthenticated.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub profile: Option<Profile>,
    pub is_authenticated: bool,
    pub loading: bool,
    pub phase: SessionPhase,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            profile: None,
            is_authenticated: false,
            loading: true,
            phase: SessionPhase::Uninitialized,
        }
    }
}

impl AuthState {
    pub(crate) fn verifying() -> Self {
        Self {
            phase: SessionPhase::Verifying,
            ..Self::default()
        }
    }

    pub(crate) fn hydrated(user: User, profile: Option<Profile>) -> Self {
        Self {
            user: Some(user),
            profile,
            is_authenticated: true,
            loading: false,
            phase: SessionPhase::HydratedFromCache,
        }
    }

    pub(crate) fn authenticated(user: User, profile: Option<Profile>) -> Self {
        let phase = if profile.is_some() {
            SessionPhase::AuthenticatedWithProfile
        } else {
            SessionPhase::AuthenticatedNoProfile
        };
        Self {
            user: Some(user),
            profile,
            is_authenticated: true,
            loading: false,
            phase,
        }
    }

    pub(crate) fn signed_out() -> Self {
        Self {
            user: None,
            profile: None,
            is_authenticated: false,
            loading: false,
            phase: SessionPhase::Unauthenticated,
        }
    }

    /// Id of the published user, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.id.as_str())
    }

    /// Attach (or detach) the profile of the already-published user.
    pub(crate) fn set_profile(&mut self, profile: Option<Profile>) {
        self.phase = if profile.is_some() {
            SessionPhase::AuthenticatedWithProfile
        } else {
            SessionPhase::AuthenticatedNoProfile
        };
        self.profile = profile;
    }
}
