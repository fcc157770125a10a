use thiserror::Error;

/// Errors raised while answering a chat request.
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid API spec: {0}")]
    InvalidSpec(String),

    #[error("Failed to get Apstra API Docs. Error: {0}")]
    DocsUnavailable(String),

    #[error("Authentication failed. {0}")]
    AuthenticationFailed(String),

    #[error("URL not allowed: {0}")]
    DisallowedUrl(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AssistantError>;

impl AssistantError {
    /// True for failures caused by the controller rather than the caller or the server.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AssistantError::DocsUnavailable(_) | AssistantError::AuthenticationFailed(_)
        )
    }
}
