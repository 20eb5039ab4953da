use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::profile::{Role, UserProfile};
use crate::error::{AppError, AppResult};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email regex"));

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl RegisterRequest {
    /// Local checks run before anything is sent.
    pub fn validate(&self) -> AppResult<()> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(AppError::user("invalid_name", "first and last name are required"));
        }
        if !EMAIL_RE.is_match(self.email.trim()) {
            return Err(AppError::user("invalid_email".to_string(), format!("'{}' is not a valid email address", self.email)));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::user("weak_password".to_string(), format!("password must be at least {} characters", MIN_PASSWORD_LEN)));
        }
        Ok(())
    }
}

/// Successful login/registration body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(alias = "token")]
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(alias = "token")]
    pub access_token: String,
    pub refresh_token: String,
}

/// "who am I" accepts either a bare profile or one wrapped in `{user: ...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MeResponse {
    Wrapped { user: UserProfile },
    Bare(UserProfile),
}

impl MeResponse {
    pub fn into_profile(self) -> UserProfile {
        match self { MeResponse::Wrapped { user } | MeResponse::Bare(user) => user }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg() -> RegisterRequest {
        RegisterRequest { email: "a@b.com".into(), password: "secret123".into(), first_name: "A".into(), last_name: "B".into(), role: Role::Learner }
    }

    #[test]
    fn register_validation() {
        assert!(reg().validate().is_ok());
        assert_eq!(RegisterRequest { email: "nope".into(), ..reg() }.validate().unwrap_err().code_str(), "invalid_email");
        assert_eq!(RegisterRequest { password: "123".into(), ..reg() }.validate().unwrap_err().code_str(), "weak_password");
        assert_eq!(RegisterRequest { first_name: " ".into(), ..reg() }.validate().unwrap_err().code_str(), "invalid_name");
        // role policy belongs to the server
        assert!(RegisterRequest { role: Role::Admin, ..reg() }.validate().is_ok());
    }

    #[test]
    fn register_wire_shape() {
        let v = serde_json::to_value(reg()).unwrap();
        assert_eq!(v["firstName"], "A");
        assert_eq!(v["role"], "learner");
    }

    #[test]
    fn me_response_both_shapes() {
        let user = serde_json::json!({"id":"1","email":"a@b.com","firstName":"A","lastName":"B","role":"admin"});
        let bare: MeResponse = serde_json::from_value(user.clone()).unwrap();
        let wrapped: MeResponse = serde_json::from_value(serde_json::json!({"user": user})).unwrap();
        assert_eq!(bare.into_profile(), wrapped.into_profile());
    }

    #[test]
    fn auth_response_accepts_token_alias() {
        let r: AuthResponse = serde_json::from_value(serde_json::json!({"token":"at","refreshToken":"rt"})).unwrap();
        assert_eq!(r.access_token, "at");
        assert!(r.user.is_none());
    }
}
