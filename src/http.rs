use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AssistantError;
use crate::models::{ChatRequest, ChatResponse};
use crate::service::AssistantService;

pub const GREETING: &str = "Hello I am your Apstra Assistant";

/// Error body returned by the backend routes
pub struct ApiError(AssistantError);

impl From<AssistantError> for ApiError {
    fn from(e: AssistantError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AssistantError::Validation(_) => StatusCode::BAD_REQUEST,
            e if e.is_upstream() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("chat error: {}", self.0);
        }
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

/// Backend routes; `access_password` enables bearer auth on everything but `/health`
pub fn router(service: Arc<AssistantService>, access_password: Option<&str>) -> Router {
    let mut router = Router::new()
        .route("/", get(read_root))
        .route("/chat", post(chat))
        .with_state(service);

    if let Some(expected) = access_password {
        let expected = Arc::new(digest(expected));
        router = router.layer(middleware::from_fn_with_state(expected, require_bearer));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .route("/health", get(|| async { "ok" }))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn read_root() -> Json<serde_json::Value> {
    Json(json!({"response": GREETING}))
}

async fn chat(
    State(service): State<Arc<AssistantService>>,
    request: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) =
        request.map_err(|rejection| AssistantError::Validation(rejection.body_text()))?;
    Ok(Json(service.chat(request).await?))
}

fn digest(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

async fn require_bearer(
    State(expected): State<Arc<[u8; 32]>>,
    req: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let headers: &HeaderMap = req.headers();
    let authorized = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| digest(token) == *expected);
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    next.run(req).await
}
