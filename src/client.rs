//! Terminal chat client for the assistant backend.

use colored::Colorize;
use reqwest::Client;

use crate::models::{ChatReply, ChatRequest, ChatResponse};

pub const NO_RESPONSE: &str = "No response from server";

/// Controller the user is asking about, and the credentials to reach it
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    pub apstra_url: String,
    pub username: String,
    pub password: String,
}

/// One exchange as shown to the user
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    Reply { message: String, answer: String },
    Failure(String),
}

impl Turn {
    pub fn render(&self) -> String {
        match self {
            Turn::Reply { message, answer } => format!(
                "{} {}\n{} {}",
                "You:".bold(),
                message,
                "Apstra Assistant:".bold().green(),
                answer
            ),
            Turn::Failure(detail) => format!("{} {}", "Error:".bold().red(), detail),
        }
    }
}

pub struct ChatClient {
    http: Client,
    backend: String,
    access_password: Option<String>,
}

impl ChatClient {
    pub fn new(backend: &str, access_password: Option<String>) -> Self {
        Self {
            http: Client::new(),
            backend: backend.trim_end_matches('/').to_string(),
            access_password: access_password.filter(|p| !p.is_empty()),
        }
    }

    /// Names of the required settings that are empty
    pub fn missing_fields(&self, session: &ChatSession) -> Vec<&'static str> {
        [
            ("backend URL", self.backend.as_str()),
            ("Apstra URL", session.apstra_url.as_str()),
            ("Apstra username", session.username.as_str()),
            ("Apstra password", session.password.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Sends one message; failures come back as a `Turn::Failure` to print.
    pub async fn send(&self, session: &ChatSession, message: &str) -> Turn {
        let payload = ChatRequest {
            apstra_url: session.apstra_url.clone(),
            username: session.username.clone(),
            password: session.password.clone(),
            message: message.to_string(),
        };

        let mut request = self
            .http
            .post(format!("{}/chat", self.backend))
            .json(&payload);
        if let Some(password) = &self.access_password {
            request = request.bearer_auth(password);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Turn::Failure(e.to_string()),
        };

        let status = response.status();
        if status.as_u16() != 200 {
            let body = response.text().await.unwrap_or_default();
            return Turn::Failure(format!("{} - {}", status.as_u16(), body));
        }

        let answer = match response.json::<ChatResponse>().await {
            Ok(ChatResponse {
                response: ChatReply::Answer(output),
            }) => output.output,
            Ok(ChatResponse {
                response: ChatReply::Error(error),
            }) => error,
            Err(e) => {
                tracing::debug!(error = %e, "Unreadable chat response");
                NO_RESPONSE.to_string()
            }
        };

        Turn::Reply {
            message: message.to_string(),
            answer,
        }
    }
}
