use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AssistantError, Result};

/// Header names are case-insensitive; `HeaderName` only stores the lowercase form
pub const AUTH_TOKEN_HEADER: &str = "authtoken";

#[derive(Serialize)]
struct LoginPayload<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

/// Headers sent with every controller API call on behalf of the user
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    token: String,
}

impl AuthHeaders {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn to_header_map(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut token = HeaderValue::from_str(&self.token).map_err(|e| {
            AssistantError::AuthenticationFailed(format!("token is not a valid header value: {e}"))
        })?;
        token.set_sensitive(true);
        headers.insert(HeaderName::from_static(AUTH_TOKEN_HEADER), token);
        Ok(headers)
    }
}

impl fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHeaders")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Posts credentials to the controller login endpoint and returns the auth headers.
/// The controller answers a successful login with 201 Created.
pub async fn login(
    http: &Client,
    login_url: &str,
    username: &str,
    password: &str,
) -> Result<AuthHeaders> {
    let resp = http
        .post(login_url)
        .json(&LoginPayload { username, password })
        .send()
        .await
        .map_err(|e| {
            tracing::warn!(url = login_url, error = %e, "Failed to authenticate");
            AssistantError::AuthenticationFailed(e.to_string())
        })?;

    let status = resp.status();
    if status != StatusCode::CREATED {
        tracing::warn!(url = login_url, %status, "Failed to authenticate");
        return Err(AssistantError::AuthenticationFailed(format!(
            "login returned status code {status}"
        )));
    }

    let body: LoginResponse = resp
        .json()
        .await
        .map_err(|e| AssistantError::AuthenticationFailed(format!("unreadable login response: {e}")))?;

    match body.token.filter(|t| !t.is_empty()) {
        Some(token) => {
            tracing::info!(url = login_url, "Successfully authenticated");
            Ok(AuthHeaders::new(token))
        }
        None => Err(AssistantError::AuthenticationFailed(
            "login response carried no token".to_string(),
        )),
    }
}
