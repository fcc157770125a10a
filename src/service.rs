use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::chain::ApiChain;
use crate::config::Config;
use crate::controller::{ApiRequester, ControllerClient, ensure_trailing_slash};
use crate::error::{AssistantError, Result};
use crate::models::{ChatReply, ChatRequest, ChatResponse};
use crate::retry::RetryPolicy;
use crate::transport::{OpenAiTransport, Transport};

/// Answers chat messages about a controller. Holds no per-user state: every request carries
/// the controller URL and credentials it should use.
pub struct AssistantService {
    controller: Arc<ControllerClient>,
    chain: ApiChain,
}

impl AssistantService {
    pub fn new(config: &Config) -> Result<Self> {
        let transport = Arc::new(OpenAiTransport::new(
            &config.llm,
            RetryPolicy::from_config(&config.retry),
        )?);
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        tracing::info!("Service::new() - Creating controller client");
        let controller = Arc::new(ControllerClient::new(
            &config.controller,
            config.request_timeout(),
        )?);

        let chain = ApiChain::new(
            transport,
            Arc::clone(&controller) as Arc<dyn ApiRequester>,
            &config.llm,
            &config.chain,
        );
        tracing::info!(
            model = %config.llm.model,
            paths = config.controller.allowed_paths.len(),
            "Service::new() - Service initialization complete"
        );

        Ok(Self { controller, chain })
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AssistantError::Validation("message is empty".to_string()));
        }
        let apstra_url = request.apstra_url.trim();
        if apstra_url.is_empty() {
            return Err(AssistantError::Validation("apstra_url is empty".to_string()));
        }
        let base = ensure_trailing_slash(apstra_url);

        let span = tracing::info_span!("chat", request_id = %Uuid::new_v4(), controller = %base);
        async {
            let docs = self.controller.fetch_api_docs(&base).await?;
            tracing::info!("Built filtered API docs");

            let auth = self
                .controller
                .login(&base, &request.username, &request.password)
                .await
                .map_err(|e| {
                    tracing::warn!(error = %e, "Controller login failed");
                    AssistantError::AuthenticationFailed(
                        "Cannot proceed without a valid token.".to_string(),
                    )
                })?;

            let api_docs = serde_json::to_string(&docs)?;
            let response = match self.chain.run(&api_docs, message, &auth, &base).await {
                Ok(output) => ChatReply::Answer(output),
                Err(e) => {
                    tracing::error!(error = %e, "Chain failed");
                    ChatReply::Error(format!("Error running chain: {e}"))
                }
            };
            Ok::<_, AssistantError>(ChatResponse { response })
        }
        .instrument(span)
        .await
    }
}
