//! Session binding for in-flight OAuth2 exchanges.
//!
//! A login spans two HTTP requests: the commence step that redirects the
//! browser to the provider, and the finish step the provider redirects back
//! to. The [`PendingStore`] correlates the two through a session key carried
//! in a cookie. Exactly one pending authorization may be current per session;
//! it is consumed (successfully or not) by the finish step, and abandoned
//! entries expire after a bounded TTL.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Opaque key binding an OAuth exchange to a browser session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Creates a session key from a string.
    #[must_use]
    pub fn new(key: String) -> Self {
        Self(key)
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Bearer credential obtained from the provider's token endpoint.
///
/// Lives only as long as the authenticated session; never written to
/// durable storage by the realm.
#[derive(Clone)]
pub struct BearerCredential {
    access_token: String,
    refresh_token: Option<String>,
    expires_in_seconds: Option<u64>,
}

impl BearerCredential {
    /// Wraps tokens returned by the provider.
    #[must_use]
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in_seconds: Option<u64>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_in_seconds,
        }
    }

    /// Returns the opaque access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the refresh token, if the provider issued one.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Returns the provider-reported token lifetime.
    #[must_use]
    pub fn expires_in_seconds(&self) -> Option<u64> {
        self.expires_in_seconds
    }
}

// Token values stay out of logs; only shape information is printed.
impl std::fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerCredential")
            .field("access_token_len", &self.access_token.len())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in_seconds", &self.expires_in_seconds)
            .finish()
    }
}

/// An in-flight OAuth2 exchange awaiting the provider callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    /// Unguessable state embedded in the authorization redirect.
    state: String,
    /// The raw `from` parameter of the originating request, if any.
    requested_from: Option<String>,
    /// Where the browser goes after a successful finish.
    redirect_on_finish: String,
    /// When the commence step created this entry.
    created_at: DateTime<Utc>,
}

impl PendingAuthorization {
    /// Records a freshly commenced exchange.
    #[must_use]
    pub fn new(state: String, requested_from: Option<String>, redirect_on_finish: String) -> Self {
        Self {
            state,
            requested_from,
            redirect_on_finish,
            created_at: Utc::now(),
        }
    }

    /// Returns the state value to verify against the provider callback.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Returns the originating request's `from` parameter.
    #[must_use]
    pub fn requested_from(&self) -> Option<&str> {
        self.requested_from.as_deref()
    }

    /// Returns the post-login redirect target.
    #[must_use]
    pub fn redirect_on_finish(&self) -> &str {
        &self.redirect_on_finish
    }

    /// Returns true once the entry has outlived the TTL.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        Utc::now() >= self.created_at + ttl
    }
}

#[derive(Default)]
struct PendingState {
    pending: HashMap<SessionKey, PendingAuthorization>,
    logging_out: HashMap<SessionKey, DateTime<Utc>>,
}

/// Keyed store of pending authorizations, one per session.
///
/// Also tracks sessions flagged as "logging out" by the logout hook, so a
/// post-logout request is not mistaken for a provider callback.
pub struct PendingStore {
    state: Mutex<PendingState>,
    ttl: Duration,
}

impl PendingStore {
    /// Creates a store whose entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(PendingState::default()),
            ttl,
        }
    }

    /// Makes `pending` the current authorization for the session, replacing
    /// any previous one.
    pub fn insert(&self, key: SessionKey, pending: PendingAuthorization) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.pending.insert(key, pending);
    }

    /// Removes and returns the session's pending authorization.
    ///
    /// Expired entries are dropped rather than returned, so a finish after
    /// the TTL behaves exactly like a stale session.
    pub fn take(&self, key: &SessionKey) -> Option<PendingAuthorization> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let pending = state.pending.remove(key)?;
        if pending.is_expired(self.ttl) {
            return None;
        }
        Some(pending)
    }

    /// Flags the session as logging out.
    pub fn mark_logging_out(&self, key: SessionKey) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.logging_out.insert(key, Utc::now());
    }

    /// Clears and reports the session's logging-out flag.
    pub fn take_logging_out(&self, key: &SessionKey) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.logging_out.remove(key).is_some()
    }

    /// Evicts expired pending entries and stale logging-out flags.
    ///
    /// Returns the number of pending authorizations removed.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = state.pending.len();
        let ttl = self.ttl;
        state.pending.retain(|_, pending| !pending.is_expired(ttl));
        state
            .logging_out
            .retain(|_, flagged_at| Utc::now() < *flagged_at + ttl);
        before - state.pending.len()
    }
}
