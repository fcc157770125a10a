use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};

use crate::config::LlmConfig;
use crate::error::{AssistantError, Result};
use crate::models::{CompletionRequest, CompletionResponse};
use crate::retry::RetryPolicy;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn chat(&self, req: &CompletionRequest) -> Result<CompletionResponse>;
}

/// Client for an OpenAI-compatible chat completions endpoint
pub struct OpenAiTransport {
    client: Client,
    endpoint: String,
    api_key: String,
    retry: RetryPolicy,
}

impl OpenAiTransport {
    pub fn new(cfg: &LlmConfig, retry: RetryPolicy) -> Result<Self> {
        if cfg.api_key.is_empty() {
            return Err(AssistantError::Config(
                "OPENAI_API_KEY is not set".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            api_key: cfg.api_key.clone(),
            retry,
        })
    }

    fn budget_exceeded(&self) -> AssistantError {
        AssistantError::Llm(format!(
            "request timed out after {} seconds (max retry duration exceeded)",
            self.retry.max_total.as_secs()
        ))
    }
}

#[async_trait]
impl Transport for OpenAiTransport {
    async fn chat(&self, req: &CompletionRequest) -> Result<CompletionResponse> {
        let start_time = Instant::now();
        let max_attempts = self.retry.max_attempts;
        let mut attempts = 0;

        while attempts < max_attempts {
            let remaining = self.retry.max_total.saturating_sub(start_time.elapsed());
            if remaining.is_zero() {
                return Err(self.budget_exceeded());
            }

            attempts += 1;

            let sent = timeout(
                remaining,
                self.client
                    .post(&self.endpoint)
                    .bearer_auth(&self.api_key)
                    .json(req)
                    .send(),
            )
            .await
            .map_err(|_| self.budget_exceeded())?;

            match sent {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json().await.map_err(|e| {
                            AssistantError::Llm(format!("Failed to parse LLM API response: {e}"))
                        });
                    }

                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    // Client errors other than rate limiting will not improve on retry
                    if status.is_client_error() && status.as_u16() != 429 {
                        return Err(AssistantError::Llm(format!("LLM API error {status}: {body}")));
                    }
                    if attempts >= max_attempts {
                        return Err(AssistantError::Llm(format!(
                            "LLM API error after {attempts} attempts: {status} {body}"
                        )));
                    }
                    tracing::warn!(%status, attempt = attempts, "LLM API call failed, retrying");
                }
                Err(e) => {
                    if attempts >= max_attempts {
                        return Err(AssistantError::Llm(format!(
                            "Failed to send request to LLM API after {attempts} attempts: {e}"
                        )));
                    }
                    tracing::warn!(error = %e, attempt = attempts, "LLM API unreachable, retrying");
                }
            }

            sleep(self.retry.delay_for(attempts)).await;
        }

        Err(AssistantError::Llm(format!(
            "LLM API request failed after {max_attempts} attempts"
        )))
    }
}
