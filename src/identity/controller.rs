use std::sync::Arc;

use reqwest::Method;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::profile::UserProfile;
use super::provider::{AuthResponse, LoginRequest, MeResponse, RegisterRequest};
use super::session::{Session, SessionState};
use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::error::{AppError, AppResult};
use crate::storage::{DurableStorage, FileStorage, MemoryStorage};
use crate::tokens::{TokenStore, TokenSubscription};

/// Drives session transitions: login, registration, logout and "who am I".
#[derive(Clone)]
pub struct SessionController {
    api: ApiClient,
}

impl SessionController {
    pub fn new(api: ApiClient) -> Self { Self { api } }

    /// Build the token store, session and client described by `config`.
    pub fn open(config: ClientConfig) -> AppResult<Self> {
        let storage: Arc<dyn DurableStorage> = match &config.token_file {
            Some(path) => Arc::new(FileStorage::new(path)),
            None => Arc::new(MemoryStorage::new()),
        };
        let tokens = TokenStore::new(storage);
        info!(target: "coursehub::session", base = %config.base_url, storage = %tokens.describe(), "session client opened");
        let api = ApiClient::new(config, Session::new(tokens))?;
        Ok(Self { api })
    }

    /// A second context (tab) over the same token storage, with its own session.
    pub fn new_context(&self) -> AppResult<Self> {
        let tokens = self.session().tokens().new_context();
        let api = ApiClient::new(self.api.config().clone(), Session::new(tokens))?;
        Ok(Self { api })
    }

    pub fn api(&self) -> &ApiClient { &self.api }

    pub fn session(&self) -> &Session { self.api.session() }

    pub fn state(&self) -> SessionState { self.session().state() }

    pub fn current_user(&self) -> Option<UserProfile> { self.session().current_user() }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<UserProfile> {
        let body = serde_json::to_value(LoginRequest { email: email.trim().to_string(), password: password.to_string() })?;
        let path = self.api.config().endpoints.login.clone();
        self.authenticate(&path, body).await
    }

    pub async fn register(&self, fields: &RegisterRequest) -> AppResult<UserProfile> {
        fields.validate()?;
        let body = serde_json::to_value(fields)?;
        let path = self.api.config().endpoints.register.clone();
        self.authenticate(&path, body).await
    }

    async fn authenticate(&self, path: &str, body: serde_json::Value) -> AppResult<UserProfile> {
        let session = self.session();
        session.begin_authenticating();
        let resp = match self.api.send_public(Method::POST, path, Some(&body)).await {
            Ok(r) => r,
            Err(e) => {
                session.teardown("authentication rejected");
                return Err(as_credential_error(e));
            }
        };
        let auth: AuthResponse = match resp.json() {
            Ok(a) => a,
            Err(e) => {
                session.teardown("malformed authentication response");
                return Err(e);
            }
        };
        if let Err(e) = session.tokens().save(&auth.access_token, &auth.refresh_token) {
            session.teardown("token storage unwritable");
            return Err(e);
        }
        match self.fetch_profile().await {
            Ok(profile) => {
                session.set_authenticated(profile.clone());
                Ok(profile)
            }
            Err(e) => {
                session.teardown("profile fetch failed after authentication");
                Err(e)
            }
        }
    }

    async fn fetch_profile(&self) -> AppResult<UserProfile> {
        let me: MeResponse = self.api.get_json(&self.api.config().endpoints.me).await?;
        Ok(me.into_profile())
    }

    /// Best-effort server logout, then unconditional local teardown.
    pub async fn logout(&self) {
        let session = self.session();
        let refresh = session.tokens().read().ok().and_then(|t| t.refresh);
        if let Some(refresh_token) = refresh {
            let body = serde_json::json!({ "refreshToken": refresh_token });
            let path = self.api.config().endpoints.logout.clone();
            if let Err(e) = self.api.send_once(Method::POST, &path, Some(&body)).await {
                warn!(target: "coursehub::session", "server logout failed (ignored): {}", e);
            }
        }
        session.teardown("logout");
    }

    /// Load the profile for stored credentials. Any failure tears the session down.
    pub async fn resolve_current_user(&self) -> AppResult<Option<UserProfile>> {
        let session = self.session();
        let access = match session.tokens().access_token() {
            Ok(a) => a,
            Err(e) => {
                session.teardown("token storage unreadable");
                return Err(e);
            }
        };
        if access.is_none() {
            return Ok(None);
        }
        match self.fetch_profile().await {
            Ok(profile) => {
                session.set_authenticated(profile.clone());
                Ok(Some(profile))
            }
            Err(e) => {
                session.teardown("current user could not be resolved");
                Err(e)
            }
        }
    }

    /// Apply every pending change made by other contexts. Returns how many were seen.
    pub fn sync_storage_events(&self, sub: &mut TokenSubscription) -> usize {
        let mut n = 0;
        while let Some(change) = sub.try_recv() {
            self.session().apply_token_change(change);
            n += 1;
        }
        n
    }

    /// Follow changes made by other contexts. The task holds no strong reference
    /// to the session and stops once the session is dropped or the bus closes.
    pub fn watch_storage(&self) -> JoinHandle<()> {
        let session = self.session().downgrade();
        let mut sub = self.session().tokens().subscribe();
        // the reload sender lives inside the session, so this errs when it is dropped
        let mut reload = self.session().subscribe_reload();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    change = sub.recv() => {
                        let Some(change) = change else { break };
                        let Some(session) = session.upgrade() else { break };
                        session.apply_token_change(change);
                    }
                    res = reload.changed() => {
                        if res.is_err() { break; }
                    }
                }
            }
            info!(target: "coursehub::session", "token storage watcher stopped");
        })
    }
}

// Rejected credentials surface as Credential errors carrying the server message.
fn as_credential_error(e: AppError) -> AppError {
    match e {
        AppError::Unauthorized { message, .. } | AppError::UserInput { message, .. } | AppError::NotFound { message, .. } => {
            AppError::Credential { code: "invalid_credentials".into(), message }
        }
        AppError::Conflict { message, .. } => AppError::Credential { code: "account_exists".into(), message },
        other => other,
    }
}
