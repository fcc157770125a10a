use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use apstra_assistant::error::{AssistantError, Result};
use apstra_assistant::models::{ChatMessage, Choice, CompletionRequest, CompletionResponse};
use apstra_assistant::transport::Transport;
use apstra_assistant::{AssistantService, Config, http};

/// Plays back canned model answers in order
struct ScriptedTransport {
    answers: Mutex<VecDeque<String>>,
}

impl ScriptedTransport {
    fn new(answers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
        })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn chat(&self, _req: &CompletionRequest) -> Result<CompletionResponse> {
        let content = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AssistantError::Llm("No more scripted answers".to_string()))?;
        Ok(CompletionResponse {
            choices: vec![Choice {
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content,
                },
            }],
        })
    }
}

fn fake_controller(with_docs: bool) -> Router {
    let mut router = Router::new()
        .route(
            "/api/aaa/login",
            post(|Json(body): Json<Value>| async move {
                if body["password"] == "secret" {
                    (StatusCode::CREATED, Json(json!({"token": "tok-42"})))
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({"errors": "invalid credentials"})))
                }
            }),
        )
        .route(
            "/api/blueprints",
            get(|headers: HeaderMap| async move {
                if headers.get("authtoken").and_then(|v| v.to_str().ok()) == Some("tok-42") {
                    (
                        StatusCode::OK,
                        Json(json!({"items": [{"id": "bp-1", "label": "dc1"}]})),
                    )
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({"errors": "no token"})))
                }
            }),
        );
    if with_docs {
        router = router.route(
            "/api/docs",
            get(|| async {
                Json(json!({
                    "swagger": "2.0",
                    "paths": {
                        "/api/blueprints": {
                            "get": {
                                "responses": {
                                    "200": {"schema": {"$ref": "#/definitions/BlueprintList"}}
                                }
                            }
                        },
                        "/api/users": {"get": {"responses": {}}}
                    },
                    "definitions": {
                        "BlueprintList": {"type": "object"},
                        "User": {"type": "object"}
                    }
                }))
            }),
        );
    }
    router
}

async fn spawn_controller(with_docs: bool) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().unwrap();
    let router = fake_controller(with_docs);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn backend(answers: &[&str], access_password: Option<&str>) -> Router {
    let config = Config::default();
    let service = AssistantService::with_transport(&config, ScriptedTransport::new(answers))
        .expect("service");
    http::router(Arc::new(service), access_password)
}

fn chat_request(apstra_url: &str, password: &str, message: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "apstra_url": apstra_url,
                "username": "admin",
                "password": password,
                "message": message
            })
            .to_string(),
        ))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn root_greets() {
    let response = backend(&[], None)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"response": "Hello I am your Apstra Assistant"})
    );
}

#[tokio::test]
async fn chat_answers_from_controller_api() {
    let controller = spawn_controller(true).await;
    let router = backend(&["/api/blueprints", "There is one blueprint, dc1."], None);

    let response = router
        .oneshot(chat_request(&controller, "secret", "  How many blueprints?  "))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"response": {
            "question": "How many blueprints?",
            "output": "There is one blueprint, dc1."
        }})
    );
}

#[tokio::test]
async fn chain_failures_are_reported_in_the_reply() {
    let controller = spawn_controller(true).await;
    let router = backend(&["https://elsewhere.example.com/api/blueprints"], None);

    let response = router
        .oneshot(chat_request(&controller, "secret", "How many blueprints?"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let text = body["response"].as_str().expect("error string");
    assert!(text.starts_with("Error running chain: "), "got {text}");
}

#[tokio::test]
async fn bad_credentials_are_a_gateway_error() {
    let controller = spawn_controller(true).await;
    let router = backend(&[], None);

    let response = router
        .oneshot(chat_request(&controller, "wrong", "How many blueprints?"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Authentication failed. Cannot proceed without a valid token."})
    );
}

#[tokio::test]
async fn missing_docs_are_a_gateway_error() {
    let controller = spawn_controller(false).await;
    let router = backend(&[], None);

    let response = router
        .oneshot(chat_request(&controller, "secret", "How many blueprints?"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to get Apstra API Docs")
    );
}

#[tokio::test]
async fn blank_messages_are_rejected() {
    let router = backend(&[], None);

    let response = router
        .oneshot(chat_request("https://apstra.example.com", "secret", "   "))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn incomplete_chat_bodies_are_bad_requests() {
    let router = backend(&[], None);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .header("content-type", "application/json")
                .body(Body::from(json!({"apstra_url": "https://a.b"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    let error = body["error"].as_str().expect("error message");
    assert!(error.contains("username"), "got {error}");
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let router = backend(&[], None);

    let response = router
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/chat")
                .header("origin", "https://ui.example.com")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn access_password_guards_everything_but_health() {
    let router = backend(&[], Some("letmein"));

    let denied = router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let wrong = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/")
                .header("authorization", "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let allowed = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/")
                .header("authorization", "Bearer letmein")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);

    let health = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}
