//! Session state shared between the bootstrap and the auth interceptor.

mod bootstrap;

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Result, bail};
use serde_json::Value;

use crate::http::{RequestSpec, ResponseResult, mask};

pub use bootstrap::{
    BootstrapError, BootstrapStep, DEFAULT_CONFIG_URL, RuntimeConfig, SchoolConnection,
    SessionBootstrap, TenantSession, UserIdentity,
};

/// Name of the header carrying the session token on tenant requests.
pub const TOKEN_HEADER: &str = "Token";

/// Credentials and token of the logged-in user.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub school_code: String,
    pub user_type: String,
    pub user_id: String,
    pub credential_hash: String,
    pub session_token: String,
}

impl Session {
    /// The login call that yields a fresh token for this user.
    pub fn login_request(&self) -> RequestSpec {
        login_request(
            &self.school_code,
            &self.user_type,
            &self.user_id,
            &self.credential_hash,
        )
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("school_code", &self.school_code)
            .field("user_type", &self.user_type)
            .field("user_id", &self.user_id)
            .field("credential_hash", &mask(&self.credential_hash))
            .field("session_token", &mask(&self.session_token))
            .finish()
    }
}

/// Handle to the one session of a tenant client.
///
/// Empty until login succeeds. Cloning shares the same slot.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<Option<Session>>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Session> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, session: Session) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    /// Replaces the token of the current session. No-op without a session.
    pub fn update_token(&self, token: &str) {
        if let Some(session) = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            session.session_token = token.to_string();
        }
    }

    pub fn token(&self) -> Option<String> {
        self.get().map(|session| session.session_token)
    }
}

/// `POST User/Login` with the credentials in the query.
pub fn login_request(
    school_code: &str,
    user_type: &str,
    user_id: &str,
    credential_hash: &str,
) -> RequestSpec {
    RequestSpec::post("User/Login")
        .query("schoolCode", school_code)
        .query("userType", user_type)
        .query("userId", user_id)
        .query("password", credential_hash)
}

/// Extracts the session token from a login response.
///
/// The token is the whole body: a JSON string, or bare text when the body is
/// not JSON.
pub fn parse_session_token(response: ResponseResult) -> Result<String> {
    let raw_text = response.raw_text.clone();
    let token = match response.into_json()? {
        Value::String(token) => token,
        _ => raw_text.trim().to_string(),
    };

    if token.is_empty() {
        bail!("Login returned an empty session token");
    }

    Ok(token)
}

/// Renders an identifier that may arrive as a JSON number or string.
pub(crate) fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
