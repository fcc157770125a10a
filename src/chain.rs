//! The call-chain: ask the model which controller URL answers the question, call it, then ask
//! the model to summarize the response.

use reqwest::Url;
use std::sync::Arc;

use crate::auth::AuthHeaders;
use crate::config::{ChainConfig, LlmConfig};
use crate::controller::ApiRequester;
use crate::error::{AssistantError, Result};
use crate::models::{ChainOutput, ChatMessage, CompletionRequest};
use crate::transport::Transport;

pub const API_URL_TEMPLATE: &str = r#"
Given the following API Documentation for the Apstra API: {api_docs}
Your task is to construct the most efficient API URL to answer the user's question, ensuring the
call is optimized to include only necessary information.
Question: {question}
API URL:
"#;

pub const API_RESPONSE_TEMPLATE: &str = r#"
With the API Documentation for the Apstra API: {api_docs}
and the specific user question: {question} in mind,
and given this API URL: {api_url} for querying, here is the
response from the Apstra API: {api_response}.
Please provide a summary that directly addresses the user's question,
omitting technical details like response format, and
focusing on delivering the answer with clarity and conciseness,
as if Apstra itself is providing this information.
Summary:
"#;

/// Substitutes `{name}` placeholders in one pass over the template, so braces inside the
/// substituted values (path templates in the API docs) are left alone.
pub fn render_prompt(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match replaced {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Reduces the model's answer to a bare URL: drops code fences, an `API URL:` label,
/// surrounding quotes and backticks.
pub fn clean_api_url(raw: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("```"))
        .unwrap_or("");
    let line = match line.get(..8) {
        Some(prefix) if prefix.eq_ignore_ascii_case("api url:") => line[8..].trim(),
        _ => line,
    };
    line.trim_matches(|c: char| c == '`' || c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// Resolves the model's URL against the controller base and refuses any other origin.
pub fn resolve_api_url(candidate: &str, base: &str) -> Result<Url> {
    let base = Url::parse(base)
        .map_err(|e| AssistantError::Validation(format!("invalid controller URL '{base}': {e}")))?;
    let url = if candidate.starts_with("http://") || candidate.starts_with("https://") {
        Url::parse(candidate)
    } else {
        base.join(candidate)
    }
    .map_err(|e| AssistantError::DisallowedUrl(format!("'{candidate}' is not a URL: {e}")))?;

    if url.origin() != base.origin() {
        return Err(AssistantError::DisallowedUrl(format!(
            "{url} is outside {}",
            base.origin().ascii_serialization()
        )));
    }
    Ok(url)
}

/// Cuts `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_response(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}... (truncated)", &text[..idx]),
        None => text.to_string(),
    }
}

pub struct ApiChain {
    tx: Arc<dyn Transport>,
    requester: Arc<dyn ApiRequester>,
    model: String,
    temperature: f32,
    max_tokens: i32,
    max_response_chars: usize,
}

impl ApiChain {
    pub fn new(
        tx: Arc<dyn Transport>,
        requester: Arc<dyn ApiRequester>,
        llm: &LlmConfig,
        chain: &ChainConfig,
    ) -> Self {
        Self {
            tx,
            requester,
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            max_response_chars: chain.max_response_chars,
        }
    }

    /// Answers `question` by calling at most one controller URL under `controller_base`.
    pub async fn run(
        &self,
        api_docs: &str,
        question: &str,
        auth: &AuthHeaders,
        controller_base: &str,
    ) -> Result<ChainOutput> {
        let url_prompt = render_prompt(
            API_URL_TEMPLATE,
            &[("api_docs", api_docs), ("question", question)],
        );
        let raw_url = self.complete(url_prompt).await?;
        let candidate = clean_api_url(&raw_url);
        if candidate.is_empty() {
            return Err(AssistantError::Llm(
                "model did not return an API URL".to_string(),
            ));
        }

        let api_url = resolve_api_url(&candidate, controller_base)?;
        tracing::info!(api_url = %api_url, "Calling controller API chosen by the model");

        let api_response = self.requester.get(api_url.as_str(), auth).await?;
        let api_response = truncate_response(&api_response, self.max_response_chars);

        let summary_prompt = render_prompt(
            API_RESPONSE_TEMPLATE,
            &[
                ("api_docs", api_docs),
                ("question", question),
                ("api_url", api_url.as_str()),
                ("api_response", api_response.as_str()),
            ],
        );
        let output = self.complete(summary_prompt).await?;

        Ok(ChainOutput {
            question: question.to_string(),
            output: output.trim().to_string(),
        })
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self.tx.chat(&request).await?;
        response
            .first_content()
            .map(str::to_string)
            .ok_or_else(|| AssistantError::Llm("LLM API returned empty choices".to_string()))
    }
}
