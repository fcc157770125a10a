use serde::{Deserialize, Serialize};

/// Body of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub apstra_url: String,
    pub username: String,
    pub password: String,
    pub message: String,
}

/// What the call-chain produced for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainOutput {
    pub question: String,
    pub output: String,
}

/// Either the chain output or the text of the error that stopped the chain.
/// A failed chain is still a successful chat round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatReply {
    Answer(ChainOutput),
    Error(String),
}

/// Body returned by `POST /chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: ChatReply,
}

// OpenAI-compatible chat message format
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

// Chat completions request format
#[derive(Debug, Serialize, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: i32,
}

// Chat completions response format
#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
}

impl CompletionResponse {
    /// Content of the first choice, if the model returned any
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}
