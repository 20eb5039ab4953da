//! In-process mock of the marketplace API used by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use coursehub::{ClientConfig, SessionController};

pub const EMAIL: &str = "a@b.com";
pub const PASSWORD: &str = "secret123";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Rotate,
    Reject,
    Hang,
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    profile: Value,
}

pub struct MockInner {
    accounts: HashMap<String, Account>,
    /// access token -> email
    access: HashMap<String, String>,
    /// refresh token -> email
    refresh: HashMap<String, String>,
    issued: usize,
    pub refresh_mode: RefreshMode,
    pub logout_fails: bool,
    pub courses_always_unauthorized: bool,
    pub requests: usize,
    pub refresh_calls: usize,
    pub logout_calls: usize,
    pub wishlist: Vec<String>,
}

#[derive(Clone)]
pub struct MockApi {
    inner: Arc<Mutex<MockInner>>,
}

impl MockApi {
    pub fn new() -> Self {
        let mut accounts = HashMap::new();
        accounts.insert(EMAIL.to_string(), Account {
            password: PASSWORD.to_string(),
            profile: json!({"id": "u1", "email": EMAIL, "firstName": "Ada", "lastName": "Byron", "role": "learner"}),
        });
        Self {
            inner: Arc::new(Mutex::new(MockInner {
                accounts,
                access: HashMap::new(),
                refresh: HashMap::new(),
                issued: 0,
                refresh_mode: RefreshMode::Rotate,
                logout_fails: false,
                courses_always_unauthorized: false,
                requests: 0,
                refresh_calls: 0,
                logout_calls: 0,
                wishlist: Vec::new(),
            })),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockInner) -> R) -> R { f(&mut self.inner.lock()) }

    /// Invalidate every issued access token; refresh tokens stay valid.
    pub fn expire_access_tokens(&self) { self.inner.lock().access.clear(); }

    pub fn requests(&self) -> usize { self.inner.lock().requests }
    pub fn refresh_calls(&self) -> usize { self.inner.lock().refresh_calls }
    pub fn logout_calls(&self) -> usize { self.inner.lock().logout_calls }

    pub async fn spawn(&self) -> String {
        let app = router(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock api");
        let addr = listener.local_addr().expect("mock addr");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await { eprintln!("mock api error: {e:?}"); }
        });
        format!("http://{}/api", addr)
    }
}

impl MockInner {
    fn issue(&mut self, email: &str) -> (String, String) {
        self.issued += 1;
        let pair = (format!("at{}", self.issued), format!("rt{}", self.issued));
        self.access.insert(pair.0.clone(), email.to_string());
        self.refresh.insert(pair.1.clone(), email.to_string());
        pair
    }

    fn caller(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers.get("authorization")?.to_str().ok()?.strip_prefix("Bearer ")?;
        self.access.get(token).cloned()
    }
}

fn err(status: StatusCode, message: &str) -> Response { (status, Json(json!({ "message": message }))).into_response() }

fn router(api: MockApi) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route("/api/courses", get(courses))
        .route("/api/courses/{id}", get(course))
        .route("/api/enrollments", post(enroll))
        .route("/api/enrollments/{id}/progress", put(progress))
        .route("/api/wishlist", get(wishlist).post(wishlist_add))
        .route("/api/wishlist/{id}", delete(wishlist_remove))
        .with_state(api)
}

async fn login(State(api): State<MockApi>, Json(body): Json<Value>) -> Response {
    let mut st = api.inner.lock();
    st.requests += 1;
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default();
    let Some(acct) = st.accounts.get(&email).cloned() else { return err(StatusCode::UNAUTHORIZED, "Invalid email or password") };
    if acct.password != password { return err(StatusCode::UNAUTHORIZED, "Invalid email or password"); }
    let (at, rt) = st.issue(&email);
    Json(json!({ "accessToken": at, "refreshToken": rt, "user": acct.profile })).into_response()
}

async fn register(State(api): State<MockApi>, Json(body): Json<Value>) -> Response {
    let mut st = api.inner.lock();
    st.requests += 1;
    let email = body["email"].as_str().unwrap_or_default().to_string();
    if st.accounts.contains_key(&email) { return err(StatusCode::CONFLICT, "Email already registered"); }
    let id = format!("u{}", st.accounts.len() + 1);
    let profile = json!({
        "id": id, "email": email, "firstName": body["firstName"], "lastName": body["lastName"], "role": body["role"]
    });
    let password = body["password"].as_str().unwrap_or_default().to_string();
    st.accounts.insert(email.clone(), Account { password, profile: profile.clone() });
    let (at, rt) = st.issue(&email);
    (StatusCode::CREATED, Json(json!({ "accessToken": at, "refreshToken": rt, "user": profile }))).into_response()
}

async fn refresh(State(api): State<MockApi>, Json(body): Json<Value>) -> Response {
    let mode = {
        let mut st = api.inner.lock();
        st.requests += 1;
        st.refresh_calls += 1;
        st.refresh_mode
    };
    match mode {
        RefreshMode::Reject => return err(StatusCode::UNAUTHORIZED, "Refresh token expired"),
        RefreshMode::Hang => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            return err(StatusCode::GATEWAY_TIMEOUT, "too late");
        }
        RefreshMode::Rotate => {}
    }
    let mut st = api.inner.lock();
    let presented = body["refreshToken"].as_str().unwrap_or_default().to_string();
    let Some(email) = st.refresh.remove(&presented) else { return err(StatusCode::UNAUTHORIZED, "Invalid refresh token") };
    let (at, rt) = st.issue(&email);
    Json(json!({ "accessToken": at, "refreshToken": rt })).into_response()
}

async fn logout(State(api): State<MockApi>, Json(body): Json<Value>) -> Response {
    let mut st = api.inner.lock();
    st.requests += 1;
    st.logout_calls += 1;
    if st.logout_fails { return err(StatusCode::INTERNAL_SERVER_ERROR, "logout exploded"); }
    if let Some(rt) = body["refreshToken"].as_str() { st.refresh.remove(rt); }
    StatusCode::NO_CONTENT.into_response()
}

async fn me(State(api): State<MockApi>, headers: HeaderMap) -> Response {
    let mut st = api.inner.lock();
    st.requests += 1;
    let Some(email) = st.caller(&headers) else { return err(StatusCode::UNAUTHORIZED, "jwt expired") };
    let profile = st.accounts[&email].profile.clone();
    Json(json!({ "user": profile })).into_response()
}

fn catalogue() -> Vec<Value> {
    vec![
        json!({"_id": "c1", "title": "Rust for Beginners", "price": 19.5, "category": "programming", "published": true}),
        json!({"_id": "c2", "title": "Watercolour Basics", "price": 0, "category": "art", "published": true}),
    ]
}

async fn courses(State(api): State<MockApi>, headers: HeaderMap, uri: axum::http::Uri) -> Response {
    let mut st = api.inner.lock();
    st.requests += 1;
    if st.courses_always_unauthorized || st.caller(&headers).is_none() { return err(StatusCode::UNAUTHORIZED, "jwt expired"); }
    let search = uri.query().and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("search="))).map(|s| s.replace("%20", " ").to_lowercase());
    let list: Vec<Value> = catalogue()
        .into_iter()
        .filter(|c| search.as_deref().map_or(true, |s| c["title"].as_str().unwrap_or_default().to_lowercase().contains(s)))
        .collect();
    Json(json!({ "courses": list })).into_response()
}

async fn course(State(api): State<MockApi>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let mut st = api.inner.lock();
    st.requests += 1;
    if st.caller(&headers).is_none() { return err(StatusCode::UNAUTHORIZED, "jwt expired"); }
    match catalogue().into_iter().find(|c| c["_id"] == id.as_str()) {
        Some(c) => Json(c).into_response(),
        None => err(StatusCode::NOT_FOUND, "Course not found"),
    }
}

async fn enroll(State(api): State<MockApi>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let mut st = api.inner.lock();
    st.requests += 1;
    if st.caller(&headers).is_none() { return err(StatusCode::UNAUTHORIZED, "jwt expired"); }
    (StatusCode::CREATED, Json(json!({"id": "e1", "courseId": body["courseId"], "progress": 0}))).into_response()
}

async fn progress(State(api): State<MockApi>, headers: HeaderMap, Path(id): Path<String>, Json(body): Json<Value>) -> Response {
    let mut st = api.inner.lock();
    st.requests += 1;
    if st.caller(&headers).is_none() { return err(StatusCode::UNAUTHORIZED, "jwt expired"); }
    let done: Vec<Value> = if body["completed"] == true { vec![body["lessonId"].clone()] } else { vec![] };
    Json(json!({"id": id, "courseId": "c1", "progress": 50, "completedLessons": done})).into_response()
}

async fn wishlist(State(api): State<MockApi>, headers: HeaderMap) -> Response {
    let mut st = api.inner.lock();
    st.requests += 1;
    if st.caller(&headers).is_none() { return err(StatusCode::UNAUTHORIZED, "jwt expired"); }
    let ids = st.wishlist.clone();
    let list: Vec<Value> = catalogue().into_iter().filter(|c| ids.iter().any(|id| c["_id"] == id.as_str())).collect();
    Json(list).into_response()
}

async fn wishlist_add(State(api): State<MockApi>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let mut st = api.inner.lock();
    st.requests += 1;
    if st.caller(&headers).is_none() { return err(StatusCode::UNAUTHORIZED, "jwt expired"); }
    if let Some(id) = body["courseId"].as_str() { st.wishlist.push(id.to_string()); }
    Json(json!({"ok": true})).into_response()
}

async fn wishlist_remove(State(api): State<MockApi>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let mut st = api.inner.lock();
    st.requests += 1;
    if st.caller(&headers).is_none() { return err(StatusCode::UNAUTHORIZED, "jwt expired"); }
    st.wishlist.retain(|c| c != &id);
    StatusCode::NO_CONTENT.into_response()
}

/// A controller pointed at `base` with in-memory tokens.
pub fn controller(base: &str) -> SessionController {
    let cfg = ClientConfig::new(base).expect("config").with_refresh_timeout(Duration::from_millis(300));
    SessionController::open(cfg).expect("controller")
}

/// Base URL on which nothing is listening.
pub fn dead_base() -> String {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}/api", port)
}
