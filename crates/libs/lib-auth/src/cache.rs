//! # Durable Auth Cache
//!
//! Persists the last known `{ token, user, profile }` in four namespaced
//! slots of a [`KeyValueStore`] so the client can render the logged-in state
//! on restart before the identity provider has answered.
//!
//! ## Slots
//!
//! ```text
//! <ns>_token      opaque bearer token
//! <ns>_user       User as JSON
//! <ns>_profile    Profile as JSON
//! <ns>_timestamp  write time, Unix milliseconds
//! ```
//!
//! ## Validity
//!
//! A record is usable only while `now - timestamp < max_age` (24h by default).
//! A token without a user (or the reverse) counts as no identity, and a slot
//! that fails to parse makes the whole record absent. None of these
//! conditions are reported to callers as errors.
//!
//! Storage failures on write are logged and absorbed: the cache is an
//! optimization and must never turn into an authentication failure.

use std::sync::Arc;
use std::time::Duration;

use lib_core::Result;
use lib_utils::time::{is_within_max_age, now_millis};
use shared::{Profile, User};

use crate::store::KeyValueStore;

/// Default slot prefix.
pub const DEFAULT_NAMESPACE: &str = "tp_auth";

/// Default validity window of a cached record.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Decoded contents of the auth cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredAuth {
    pub token: Option<String>,
    pub user: Option<User>,
    pub profile: Option<Profile>,
}

impl StoredAuth {
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.user.is_none() && self.profile.is_none()
    }

    /// The cached profile, only if it belongs to `user_id`.
    pub fn profile_for(&self, user_id: &str) -> Option<&Profile> {
        self.profile.as_ref().filter(|profile| profile.id == user_id)
    }
}

#[derive(Debug, Clone)]
struct SlotKeys {
    token: String,
    user: String,
    profile: String,
    timestamp: String,
}

impl SlotKeys {
    fn new(namespace: &str) -> Self {
        Self {
            token: format!("{namespace}_token"),
            user: format!("{namespace}_user"),
            profile: format!("{namespace}_profile"),
            timestamp: format!("{namespace}_timestamp"),
        }
    }

    fn all(&self) -> [&str; 4] {
        [&self.token, &self.user, &self.profile, &self.timestamp]
    }
}

/// Read/write helpers over the four auth slots.
#[derive(Clone)]
pub struct AuthCache {
    store: Arc<dyn KeyValueStore>,
    keys: SlotKeys,
    max_age: Duration,
}

impl AuthCache {
    /// Cache with the default namespace and 24h validity.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_namespace(store, DEFAULT_NAMESPACE, DEFAULT_MAX_AGE)
    }

    pub fn with_namespace(store: Arc<dyn KeyValueStore>, namespace: &str, max_age: Duration) -> Self {
        Self {
            store,
            keys: SlotKeys::new(namespace),
            max_age,
        }
    }

    /// Read the cached record without checking its age.
    pub fn read(&self) -> StoredAuth {
        match self.try_read() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unreadable auth cache");
                StoredAuth::default()
            }
        }
    }

    fn try_read(&self) -> Result<StoredAuth> {
        let token = self.store.get(&self.keys.token)?;
        let user = self
            .store
            .get(&self.keys.user)?
            .map(|raw| serde_json::from_str::<User>(&raw))
            .transpose()?;
        let profile = self
            .store
            .get(&self.keys.profile)?
            .map(|raw| serde_json::from_str::<Profile>(&raw))
            .transpose()?;

        let (token, user) = match (token, user) {
            (Some(token), Some(user)) => (Some(token), Some(user)),
            _ => (None, None),
        };

        Ok(StoredAuth {
            token,
            user,
            profile,
        })
    }

    /// Replace the whole record.
    ///
    /// Token, user and timestamp are written together when both token and
    /// user are given and removed together otherwise. The profile slot is
    /// written or removed independently.
    pub fn write(&self, token: Option<&str>, user: Option<&User>, profile: Option<&Profile>) {
        match (token, user) {
            (Some(token), Some(user)) => self.write_identity(token, user),
            _ => self.apply_slots(&[
                (self.keys.token.as_str(), None),
                (self.keys.user.as_str(), None),
                (self.keys.timestamp.as_str(), None),
            ]),
        }
        self.write_profile(profile);
    }

    /// Write token, user and a fresh timestamp. The profile slot is left untouched.
    pub fn write_identity(&self, token: &str, user: &User) {
        self.write_identity_at(token, user, now_millis());
    }

    pub(crate) fn write_identity_at(&self, token: &str, user: &User, written_at_ms: i64) {
        let user_json = match serde_json::to_string(user) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode user for auth cache");
                return;
            }
        };

        let timestamp = written_at_ms.to_string();
        self.apply_slots(&[
            (self.keys.token.as_str(), Some(token)),
            (self.keys.user.as_str(), Some(user_json.as_str())),
            (self.keys.timestamp.as_str(), Some(timestamp.as_str())),
        ]);
    }

    /// Write or remove the profile slot only.
    pub fn write_profile(&self, profile: Option<&Profile>) {
        let Some(profile) = profile else {
            self.remove_slot(&self.keys.profile);
            return;
        };

        match serde_json::to_string(profile) {
            Ok(json) => self.set_slot(&self.keys.profile, &json),
            Err(e) => tracing::warn!(error = %e, "Failed to encode profile for auth cache"),
        }
    }

    /// Remove all four slots. Idempotent.
    pub fn clear(&self) {
        let changes: [(&str, Option<&str>); 4] = self.keys.all().map(|key| (key, None));
        self.apply_slots(&changes);
    }

    /// Whether the record's write time is within the validity window.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_millis())
    }

    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        let written_at = match self.store.get(&self.keys.timestamp) {
            Ok(Some(raw)) => raw.trim().parse::<i64>().ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read auth cache timestamp");
                None
            }
        };

        let max_age_ms = i64::try_from(self.max_age.as_millis()).unwrap_or(i64::MAX);
        written_at.is_some_and(|written_at| is_within_max_age(written_at, now_ms, max_age_ms))
    }

    /// The cached record if it is fresh and carries a complete identity.
    pub fn load_valid(&self) -> Option<StoredAuth> {
        if !self.is_valid() {
            return None;
        }
        let stored = self.read();
        stored.user.is_some().then_some(stored)
    }

    fn set_slot(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            tracing::warn!(key, error = %e, "Failed to write auth cache slot");
        }
    }

    fn apply_slots(&self, changes: &[(&str, Option<&str>)]) {
        if let Err(e) = self.store.apply(changes) {
            tracing::warn!(slots = changes.len(), error = %e, "Failed to update auth cache");
        }
    }

    fn remove_slot(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            tracing::warn!(key, error = %e, "Failed to remove auth cache slot");
        }
    }
}
