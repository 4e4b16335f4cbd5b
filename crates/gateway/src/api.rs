//! Request handlers and DTOs for the agent and retrieval endpoints.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use ragent_agent::AgentError;
use ragent_core::{ContextDocument, Event, ToolDefinition};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::SharedState;

pub const MISSING_FIELDS: &str = "Missing message or session_id in the body";
pub const LOOP_EXHAUSTED: &str = "Something went wrong the ai call is in a loop";
pub const MISSING_QUERY: &str = "missing query in body";

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDefinition>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Oversized bodies keep their 413; every other rejection is a 400.
fn rejection_error(rejection: JsonRejection, message: &str) -> ApiError {
    let status = rejection.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        api_error(status, rejection.body_text())
    } else {
        api_error(StatusCode::BAD_REQUEST, message)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ── Handlers ──────────────────────────────────────────────────────────────

pub(crate) async fn message_handler(
    State(state): State<SharedState>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(payload) = payload.map_err(|r| rejection_error(r, MISSING_FIELDS))?;
    let (Some(message), Some(session_id)) =
        (non_blank(payload.message), non_blank(payload.session_id))
    else {
        return Err(api_error(StatusCode::BAD_REQUEST, MISSING_FIELDS));
    };

    info!(session_id = %session_id, message_len = message.len(), "Agent message received");

    match state.agent.process(&session_id, &message).await {
        Ok(outcome) => Ok(Json(MessageResponse {
            content: outcome.content,
        })),
        Err(e) => Err(agent_error(e)),
    }
}

fn agent_error(err: AgentError) -> ApiError {
    match err {
        AgentError::InvalidInput(_) => api_error(StatusCode::BAD_REQUEST, MISSING_FIELDS),
        AgentError::IterationExhausted { iterations } => {
            warn!(iterations, "Turn failed: model did not converge");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, LOOP_EXHAUSTED)
        }
        AgentError::Timeout { secs } => api_error(
            StatusCode::GATEWAY_TIMEOUT,
            format!("The agent did not answer within {secs} seconds"),
        ),
        AgentError::Gateway(_) | AgentError::Prompt(_) => {
            error!(error = %err, "Turn failed");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate a response",
            )
        }
    }
}

pub(crate) async fn list_tools_handler(State(state): State<SharedState>) -> Json<ToolListResponse> {
    let tools = state.agent.tools().definitions().to_vec();
    Json(ToolListResponse {
        count: tools.len(),
        tools,
    })
}

pub(crate) async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Json<SessionResponse> {
    let events = state.agent.sessions().events(&id);
    Json(SessionResponse {
        session_id: id,
        events,
    })
}

pub(crate) async fn clear_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> StatusCode {
    state.agent.clear_session(&id).await;
    info!(session_id = %id, "Session cleared");
    StatusCode::NO_CONTENT
}

pub(crate) async fn semantic_search_handler(
    State(state): State<SharedState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<Vec<ContextDocument>>, ApiError> {
    let Json(payload) = payload.map_err(|r| rejection_error(r, MISSING_QUERY))?;
    let Some(query) = non_blank(payload.query) else {
        return Err(api_error(StatusCode::BAD_REQUEST, MISSING_QUERY));
    };
    let top_k = payload.top_k.unwrap_or(state.top_k).max(1);

    state
        .retriever
        .search(&query, top_k)
        .await
        .map(Json)
        .map_err(|e| {
            warn!(retriever = state.retriever.name(), "Semantic search failed: {e}");
            api_error(StatusCode::BAD_GATEWAY, format!("Semantic search failed: {e}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GatewayState, build_router};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use ragent_agent::AgentLoop;
    use ragent_core::{GatewayError, ModelGateway, ModelReply, PluginRegistry, Retriever, ToolCallRequest};
    use ragent_memory::{InMemoryRetriever, SessionStore};
    use ragent_tools::MathPlugin;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    enum Behaviour {
        Answer(&'static str),
        AlwaysTools,
        Fail,
        Hang,
    }

    struct StubGateway(Behaviour);

    #[async_trait]
    impl ModelGateway for StubGateway {
        fn name(&self) -> &str {
            "stub"
        }

        async fn generate(&self, _prompt: &str) -> Result<ModelReply, GatewayError> {
            match self.0 {
                Behaviour::Answer(text) => Ok(ModelReply::response(text)),
                Behaviour::AlwaysTools => Ok(ModelReply::tool_calls(vec![ToolCallRequest::new(
                    "math_tool",
                    json!({"expression": "1+1"}),
                )])),
                Behaviour::Fail => Err(GatewayError::Malformed("not json".into())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(600)).await;
                    Ok(ModelReply::response("late"))
                }
            }
        }
    }

    fn app_with(behaviour: Behaviour, timeout: Option<Duration>) -> axum::Router {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(MathPlugin));
        let retriever: Arc<dyn Retriever> = Arc::new(InMemoryRetriever::with_documents([
            "Opening hours are nine to five.",
            "Returns are accepted within thirty days.",
        ]));
        let agent = AgentLoop::new(
            Arc::new(StubGateway(behaviour)),
            Arc::new(registry),
            Arc::new(SessionStore::new(10)),
            "system",
        )
        .with_retriever(retriever.clone())
        .with_turn_timeout(timeout);

        build_router(
            Arc::new(GatewayState {
                agent: Arc::new(agent),
                retriever,
                top_k: 3,
            }),
            1024,
        )
    }

    fn app(behaviour: Behaviour) -> axum::Router {
        app_with(behaviour, None)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn message_returns_content() {
        let response = app(Behaviour::Answer("Hello!"))
            .oneshot(post_json(
                "/agent/message",
                json!({"message": "Hi", "session_id": "abc"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"content": "Hello!"}));
    }

    #[tokio::test]
    async fn missing_session_id_is_bad_request() {
        let response = app(Behaviour::Answer("unused"))
            .oneshot(post_json("/agent/message", json!({"message": "Hi"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], MISSING_FIELDS);
    }

    #[tokio::test]
    async fn blank_message_is_bad_request() {
        let response = app(Behaviour::Answer("unused"))
            .oneshot(post_json(
                "/agent/message",
                json!({"message": "  ", "session_id": "abc"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let req = Request::builder()
            .method("POST")
            .uri("/agent/message")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app(Behaviour::Answer("unused")).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], MISSING_FIELDS);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let response = app(Behaviour::Answer("unused"))
            .oneshot(post_json(
                "/agent/message",
                json!({"message": "x".repeat(4096), "session_id": "abc"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn exhaustion_is_server_error() {
        let response = app(Behaviour::AlwaysTools)
            .oneshot(post_json(
                "/agent/message",
                json!({"message": "loop", "session_id": "abc"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], LOOP_EXHAUSTED);
    }

    #[tokio::test]
    async fn gateway_failure_is_distinct_server_error() {
        let response = app(Behaviour::Fail)
            .oneshot(post_json(
                "/agent/message",
                json!({"message": "hi", "session_id": "abc"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_ne!(body_json(response).await["error"], LOOP_EXHAUSTED);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_gateway_timeout() {
        let response = app_with(Behaviour::Hang, Some(Duration::from_secs(30)))
            .oneshot(post_json(
                "/agent/message",
                json!({"message": "hi", "session_id": "abc"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn list_tools() {
        let req = Request::builder()
            .uri("/agent/tools")
            .body(Body::empty())
            .unwrap();
        let response = app(Behaviour::Answer("x")).oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: ToolListResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(json.count, 1);
        assert_eq!(json.tools[0].name, "math_tool");
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let app = app(Behaviour::Answer("Noted."));

        app.clone()
            .oneshot(post_json(
                "/agent/message",
                json!({"message": "remember this", "session_id": "s-1"}),
            ))
            .await
            .unwrap();

        let get = || {
            Request::builder()
                .uri("/agent/sessions/s-1")
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(get()).await.unwrap();
        let session: SessionResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(session.session_id, "s-1");
        assert_eq!(session.events.len(), 2);
        assert_eq!(session.events[1].content, "Noted.");

        let delete = Request::builder()
            .method("DELETE")
            .uri("/agent/sessions/s-1")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(delete).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(get()).await.unwrap();
        let session: SessionResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert!(session.events.is_empty());
    }

    #[tokio::test]
    async fn semantic_search() {
        let response = app(Behaviour::Answer("x"))
            .oneshot(post_json(
                "/rag/semantic-search",
                json!({"query": "When are returns accepted?", "top_k": 1}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!([{"text": "Returns are accepted within thirty days."}])
        );
    }

    #[tokio::test]
    async fn semantic_search_over_configured_memory_backend() {
        let retriever = ragent_providers::build_retriever(&ragent_config::RetrievalConfig {
            backend: "memory".into(),
            documents: vec![
                "The warehouse ships orders every Tuesday.".into(),
                "Gift cards never expire.".into(),
            ],
            ..ragent_config::RetrievalConfig::default()
        })
        .unwrap();
        let agent = AgentLoop::new(
            Arc::new(StubGateway(Behaviour::Answer("x"))),
            Arc::new(PluginRegistry::new()),
            Arc::new(SessionStore::new(10)),
            "system",
        );
        let app = build_router(
            Arc::new(GatewayState {
                agent: Arc::new(agent),
                retriever,
                top_k: 3,
            }),
            1024,
        );

        let response = app
            .oneshot(post_json(
                "/rag/semantic-search",
                json!({"query": "do gift cards expire?"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!([{"text": "Gift cards never expire."}])
        );
    }

    #[tokio::test]
    async fn semantic_search_requires_query() {
        let response = app(Behaviour::Answer("x"))
            .oneshot(post_json("/rag/semantic-search", json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], MISSING_QUERY);
    }
}
