//!
//! coursehub API client
//! --------------------
//! Authenticated HTTP access to the marketplace API.
//!
//! Every call attaches the stored access token as a bearer credential. A 401 on
//! the first attempt triggers one refresh through the refresh endpoint followed by
//! exactly one retry; there is never a second refresh for the same call. When the
//! refresh cannot happen (no refresh token, transport error, timeout, rejected
//! refresh) the session is torn down and the original 401 is returned.
//!
//! With `coalesce_refresh` enabled, refreshes are serialized: a caller that waited
//! on another caller's refresh re-reads the store and retries with the rotated
//! access token instead of refreshing a second time.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{server_message, AppError, AppResult};
use crate::identity::{RefreshRequest, Session, TokenResponse};

/// A completed 2xx response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    /// Decode the body; an empty body decodes as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> AppResult<T> {
        let text = if self.body.trim().is_empty() { "null" } else { self.body.as_str() };
        Ok(serde_json::from_str(text)?)
    }

    pub fn value(&self) -> AppResult<Value> { self.json() }
}

struct ClientInner {
    config: ClientConfig,
    http: reqwest::Client,
    session: Session,
    refresh_lock: tokio::sync::Mutex<()>,
}

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, session: Session) -> AppResult<Self> {
        let http = reqwest::Client::builder().user_agent(config.user_agent.clone()).build()?;
        Ok(Self { inner: Arc::new(ClientInner { config, http, session, refresh_lock: tokio::sync::Mutex::new(()) }) })
    }

    pub fn config(&self) -> &ClientConfig { &self.inner.config }

    pub fn session(&self) -> &Session { &self.inner.session }

    /// Perform one authenticated call, recovering once from an expired access token.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>, headers: Option<HeaderMap>) -> AppResult<ApiResponse> {
        let url = self.inner.config.url_for(path)?;
        let sent_access = self.inner.session.tokens().access_token()?;
        let timeout = self.inner.config.request_timeout;
        let resp = self.dispatch(&method, &url, body, headers.as_ref(), sent_access.as_deref(), timeout).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return finish(resp).await;
        }
        let original = match finish(resp).await { Ok(r) => return Ok(r), Err(e) => e };
        debug!(target: "coursehub::api", %method, path, "access token rejected; attempting refresh");
        let Some(access) = self.recover(sent_access.as_deref()).await else {
            return Err(original);
        };
        let retried = self.dispatch(&method, &url, body, headers.as_ref(), Some(&access), timeout).await?;
        debug!(target: "coursehub::api", %method, path, status = retried.status().as_u16(), "retried after refresh");
        finish(retried).await
    }

    /// Send with the stored bearer credential but without refresh recovery.
    pub async fn send_once(&self, method: Method, path: &str, body: Option<&Value>) -> AppResult<ApiResponse> {
        let url = self.inner.config.url_for(path)?;
        let access = self.inner.session.tokens().access_token()?;
        let resp = self.dispatch(&method, &url, body, None, access.as_deref(), self.inner.config.request_timeout).await?;
        finish(resp).await
    }

    /// Send without any credential (login, registration).
    pub async fn send_public(&self, method: Method, path: &str, body: Option<&Value>) -> AppResult<ApiResponse> {
        let url = self.inner.config.url_for(path)?;
        let resp = self.dispatch(&method, &url, body, None, None, self.inner.config.request_timeout).await?;
        finish(resp).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        self.request(Method::GET, path, None, None).await?.json()
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> AppResult<T> {
        let v = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(&v), None).await?.json()
    }

    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> AppResult<T> {
        let v = serde_json::to_value(body)?;
        self.request(Method::PUT, path, Some(&v), None).await?.json()
    }

    pub async fn delete(&self, path: &str) -> AppResult<()> {
        self.request(Method::DELETE, path, None, None).await.map(|_| ())
    }

    async fn dispatch(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
        headers: Option<&HeaderMap>,
        bearer: Option<&str>,
        timeout: Option<Duration>,
    ) -> AppResult<reqwest::Response> {
        let mut req = self.inner.http.request(method.clone(), url.clone());
        if let Some(h) = headers { req = req.headers(h.clone()); }
        if let Some(token) = bearer { req = req.bearer_auth(token); }
        if let Some(b) = body { req = req.json(b); }
        if let Some(t) = timeout { req = req.timeout(t); }
        let resp = req.send().await?;
        debug!(target: "coursehub::api", %method, url = %url, status = resp.status().as_u16(), "response");
        Ok(resp)
    }

    /// Obtain a usable access token after a 401, or tear the session down.
    async fn recover(&self, failed_access: Option<&str>) -> Option<String> {
        let coalesce = self.inner.config.coalesce_refresh;
        let _guard = if coalesce { Some(self.inner.refresh_lock.lock().await) } else { None };
        let session = &self.inner.session;
        let current = match session.tokens().read() {
            Ok(t) => t,
            Err(e) => {
                warn!(target: "coursehub::api", "cannot read tokens for refresh: {}", e);
                session.teardown("token storage unreadable");
                return None;
            }
        };
        if coalesce {
            if let Some(access) = current.access.as_deref() {
                if Some(access) != failed_access {
                    debug!(target: "coursehub::api", "tokens already rotated by a concurrent refresh");
                    return Some(access.to_string());
                }
            }
        }
        let Some(refresh) = current.refresh else {
            warn!(target: "coursehub::api", "no refresh token available");
            session.teardown("missing refresh token");
            return None;
        };
        let pair = match self.call_refresh(&refresh).await {
            Ok(p) => p,
            Err(e) => {
                warn!(target: "coursehub::api", "token refresh failed: {}", e);
                session.teardown("refresh failed");
                return None;
            }
        };
        if let Err(e) = session.tokens().save(&pair.access_token, &pair.refresh_token) {
            warn!(target: "coursehub::api", "cannot persist refreshed tokens: {}", e);
            session.teardown("token storage unwritable");
            return None;
        }
        debug!(target: "coursehub::api", "tokens refreshed");
        Some(pair.access_token)
    }

    async fn call_refresh(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        let url = self.inner.config.url_for(&self.inner.config.endpoints.refresh)?;
        let body = serde_json::to_value(RefreshRequest { refresh_token })?;
        let resp = self.dispatch(&Method::POST, &url, Some(&body), None, None, Some(self.inner.config.refresh_timeout)).await?;
        finish(resp).await?.json()
    }
}

async fn finish(resp: reqwest::Response) -> AppResult<ApiResponse> {
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.text().await?;
    if status.is_success() {
        return Ok(ApiResponse { status: status.as_u16(), headers, body });
    }
    Err(AppError::from_status(status.as_u16(), server_message(&body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(body: &str) -> ApiResponse { ApiResponse { status: 200, headers: HeaderMap::new(), body: body.to_string() } }

    #[test]
    fn empty_body_decodes_as_null() {
        let r = resp("");
        r.json::<()>().unwrap();
        assert_eq!(r.value().unwrap(), Value::Null);
        let opt: Option<u32> = resp("  ").json().unwrap();
        assert_eq!(opt, None);
    }

    #[test]
    fn invalid_body_is_decode_error() {
        let err = resp("<html>").json::<Value>().unwrap_err();
        assert_eq!(err.code_str(), "decode");
    }
}
