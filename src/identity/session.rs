use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{info, warn};
use crate::tprintln;

use super::profile::UserProfile;
use crate::tokens::{TokenChange, TokenStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated(UserProfile),
}

struct SessionInner {
    tokens: TokenStore,
    state: RwLock<SessionState>,
    // bumped on every teardown; observers drop anything cached for the old epoch
    reload: watch::Sender<u64>,
}

/// The single owner of session state for one client context. Cloning shares it.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

/// Non-owning handle used by background tasks.
#[derive(Clone)]
pub(crate) struct WeakSession(Weak<SessionInner>);

impl WeakSession {
    pub(crate) fn upgrade(&self) -> Option<Session> { self.0.upgrade().map(|inner| Session { inner }) }
}

impl Session {
    pub fn new(tokens: TokenStore) -> Self {
        let (reload, _) = watch::channel(0u64);
        Self { inner: Arc::new(SessionInner { tokens, state: RwLock::new(SessionState::Anonymous), reload }) }
    }

    pub fn tokens(&self) -> &TokenStore { &self.inner.tokens }

    pub(crate) fn downgrade(&self) -> WeakSession { WeakSession(Arc::downgrade(&self.inner)) }

    fn has_access_token(&self) -> bool {
        matches!(self.inner.tokens.access_token(), Ok(Some(_)))
    }

    /// Current state. A profile is only reported while an access token is stored.
    pub fn state(&self) -> SessionState {
        let st = self.inner.state.read().clone();
        match st {
            SessionState::Authenticated(_) if !self.has_access_token() => SessionState::Anonymous,
            other => other,
        }
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        match self.state() {
            SessionState::Authenticated(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool { self.current_user().is_some() }

    pub(crate) fn begin_authenticating(&self) { *self.inner.state.write() = SessionState::Authenticating; }

    pub(crate) fn set_authenticated(&self, profile: UserProfile) {
        info!(target: "coursehub::session", user = %profile.id, role = %profile.role, "session authenticated");
        *self.inner.state.write() = SessionState::Authenticated(profile);
    }

    /// Clear stored credentials and in-memory state, then signal a reload.
    pub fn teardown(&self, reason: &str) {
        if let Err(e) = self.inner.tokens.clear() {
            warn!(target: "coursehub::session", "failed to clear token storage during teardown: {}", e);
        }
        self.reset_local(reason);
    }

    /// Drop in-memory state without touching storage.
    fn reset_local(&self, reason: &str) {
        *self.inner.state.write() = SessionState::Anonymous;
        self.inner.reload.send_modify(|epoch| *epoch += 1);
        tprintln!("session.teardown reason={} epoch={}", reason, self.epoch());
        info!(target: "coursehub::session", reason, epoch = self.epoch(), "session torn down");
    }

    pub fn epoch(&self) -> u64 { *self.inner.reload.borrow() }

    /// Receiver that changes whenever client state must be reloaded.
    pub fn subscribe_reload(&self) -> watch::Receiver<u64> { self.inner.reload.subscribe() }

    /// React to a token change made by another context.
    pub fn apply_token_change(&self, change: TokenChange) {
        match change {
            TokenChange::Cleared => {
                if *self.inner.state.read() != SessionState::Anonymous {
                    self.reset_local("cleared by another context");
                }
            }
            TokenChange::Resync => {
                if !self.has_access_token() && *self.inner.state.read() != SessionState::Anonymous {
                    self.reset_local("resync found no access token");
                }
            }
            // rotation by another context; our profile is still valid
            TokenChange::Saved => {}
        }
    }
}
