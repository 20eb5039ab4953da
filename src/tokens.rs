//! Access/refresh token persistence with cross-context change notification.
//!
//! A `TokenStore` handle is bound to one *context* (think: one browser tab). Every
//! context created from the same root shares the durable storage and a broadcast
//! bus. Writes publish an event tagged with the writer's origin; subscribers only
//! see events produced by *other* contexts, matching storage-event semantics.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppResult;
use crate::storage::{DurableStorage, MemoryStorage};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

const BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenPair {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl TokenPair {
    pub fn is_empty(&self) -> bool { self.access.is_none() && self.refresh.is_none() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenChange {
    Saved,
    Cleared,
    /// Events were dropped; re-read the store to learn the current state.
    Resync,
}

#[derive(Debug, Clone)]
struct TokenEvent {
    origin: Uuid,
    change: TokenChange,
}

/// Handle over the shared token storage. `Clone` yields another handle on the
/// *same* context; use [`TokenStore::new_context`] for an independent one.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn DurableStorage>,
    bus: broadcast::Sender<TokenEvent>,
    origin: Uuid,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        Self { storage, bus, origin: Uuid::new_v4() }
    }

    pub fn in_memory() -> Self { Self::new(Arc::new(MemoryStorage::new())) }

    /// Another context over the same storage and notification bus.
    pub fn new_context(&self) -> Self {
        Self { storage: self.storage.clone(), bus: self.bus.clone(), origin: Uuid::new_v4() }
    }

    pub fn origin(&self) -> Uuid { self.origin }

    pub fn describe(&self) -> String { self.storage.describe() }

    /// Overwrite both tokens.
    pub fn save(&self, access: &str, refresh: &str) -> AppResult<()> {
        self.storage.set_many(&[(ACCESS_TOKEN_KEY, access), (REFRESH_TOKEN_KEY, refresh)])?;
        debug!(target: "coursehub::tokens", origin = %self.origin, "tokens saved");
        self.publish(TokenChange::Saved);
        Ok(())
    }

    pub fn read(&self) -> AppResult<TokenPair> {
        Ok(TokenPair {
            access: self.storage.get(ACCESS_TOKEN_KEY)?.filter(|s| !s.is_empty()),
            refresh: self.storage.get(REFRESH_TOKEN_KEY)?.filter(|s| !s.is_empty()),
        })
    }

    pub fn access_token(&self) -> AppResult<Option<String>> { Ok(self.read()?.access) }

    /// Remove both tokens and notify other contexts.
    pub fn clear(&self) -> AppResult<()> {
        self.storage.remove_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])?;
        debug!(target: "coursehub::tokens", origin = %self.origin, "tokens cleared");
        self.publish(TokenChange::Cleared);
        Ok(())
    }

    fn publish(&self, change: TokenChange) {
        // no receivers is fine
        let _ = self.bus.send(TokenEvent { origin: self.origin, change });
    }

    /// Subscribe to changes made by other contexts.
    pub fn subscribe(&self) -> TokenSubscription {
        TokenSubscription { rx: self.bus.subscribe(), origin: self.origin }
    }
}

pub struct TokenSubscription {
    rx: broadcast::Receiver<TokenEvent>,
    origin: Uuid,
}

impl TokenSubscription {
    /// Wait for the next foreign change. `None` once every store handle is gone.
    pub async fn recv(&mut self) -> Option<TokenChange> {
        loop {
            match self.rx.recv().await {
                Ok(ev) if ev.origin == self.origin => continue,
                Ok(ev) => return Some(ev.change),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(target: "coursehub::tokens", skipped = n, "token events lagged");
                    return Some(TokenChange::Resync);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<TokenChange> {
        loop {
            match self.rx.try_recv() {
                Ok(ev) if ev.origin == self.origin => continue,
                Ok(ev) => return Some(ev.change),
                Err(broadcast::error::TryRecvError::Lagged(_)) => return Some(TokenChange::Resync),
                Err(_) => return None,
            }
        }
    }
}
