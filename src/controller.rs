use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

#[cfg(test)]
use mockall::automock;

use crate::auth::{self, AuthHeaders};
use crate::config::ControllerConfig;
use crate::error::{AssistantError, Result};
use crate::spec_filter::filter_openapi_spec;

pub fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// `base` and `path` joined with exactly one slash between them
pub fn controller_url(base: &str, path: &str) -> String {
    format!(
        "{}{}",
        ensure_trailing_slash(base),
        path.trim_start_matches('/')
    )
}

/// GET access to the controller REST API on behalf of an authenticated user
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ApiRequester: Send + Sync {
    /// Returns the response body whatever the status code; only transport failures are errors.
    async fn get(&self, url: &str, auth: &AuthHeaders) -> Result<String>;
}

/// HTTP client for one or more Apstra controllers
#[derive(Clone)]
pub struct ControllerClient {
    http: Client,
    docs_path: String,
    login_path: String,
    allowed_paths: Vec<String>,
}

impl ControllerClient {
    pub fn new(cfg: &ControllerConfig, timeout: std::time::Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(cfg.accept_invalid_certs)
            .build()?;
        Ok(Self {
            http,
            docs_path: cfg.docs_path.clone(),
            login_path: cfg.login_path.clone(),
            allowed_paths: cfg.allowed_paths.clone(),
        })
    }

    /// Downloads the controller API docs, points them at `base`, and filters them to the
    /// allow-listed paths.
    pub async fn fetch_api_docs(&self, base: &str) -> Result<Value> {
        let base = ensure_trailing_slash(base);
        let url = controller_url(&base, &self.docs_path);
        tracing::debug!(%url, "Fetching controller API docs");

        let resp = self.http.get(&url).send().await.map_err(|e| {
            AssistantError::DocsUnavailable(format!("request to {url} failed: {e}"))
        })?;
        if resp.status() != StatusCode::OK {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(%url, %status, "Controller refused API docs request");
            return Err(AssistantError::DocsUnavailable(text));
        }

        let mut docs: Value = resp
            .json()
            .await
            .map_err(|e| AssistantError::DocsUnavailable(format!("docs are not JSON: {e}")))?;
        let doc = docs.as_object_mut().ok_or_else(|| {
            AssistantError::InvalidSpec("API docs are not a JSON object".to_string())
        })?;
        doc.insert("host".to_string(), json!(base));
        doc.insert(
            "servers".to_string(),
            json!([{"url": base, "description": "Apstra Server"}]),
        );

        filter_openapi_spec(self.allowed_paths.as_slice(), &docs)
    }

    pub async fn login(&self, base: &str, username: &str, password: &str) -> Result<AuthHeaders> {
        auth::login(
            &self.http,
            &controller_url(base, &self.login_path),
            username,
            password,
        )
        .await
    }
}

#[async_trait]
impl ApiRequester for ControllerClient {
    async fn get(&self, url: &str, auth: &AuthHeaders) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .headers(auth.to_header_map()?)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(%url, %status, "Controller API call returned an error status");
        }
        Ok(resp.text().await?)
    }
}
