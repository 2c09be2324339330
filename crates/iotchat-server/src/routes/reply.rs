use crate::state::AppState;
use axum::{
    extract::State,
    http::{self, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::Stream;
use iotchat::{
    agents::{AgentContext, Orchestrator, PipelineTrace, RequestMetadata, ToolInvocation},
    models::chat::{to_model_messages, ChatMessage},
    providers::base::{CompletionOptions, Provider},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const FALLBACK_SYSTEM: &str =
    "You are a helpful assistant that can answer questions and help with tasks.";
const FALLBACK_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    web_search: bool,
}

// SSE response carrying the AI SDK UI message stream
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);

        (
            [
                (http::header::CONTENT_TYPE, "text/event-stream"),
                (http::header::CACHE_CONTROL, "no-cache"),
                (http::header::CONNECTION, "keep-alive"),
            ],
            [("x-vercel-ai-ui-message-stream", "v1")],
            body,
        )
            .into_response()
    }
}

// UI message stream parts, one `data:` event each
struct ProtocolFormatter;

impl ProtocolFormatter {
    fn part(value: Value) -> String {
        format!("data: {}\n\n", value)
    }

    fn start(message_id: &str) -> String {
        Self::part(json!({"type": "start", "messageId": message_id}))
    }

    fn start_step() -> String {
        Self::part(json!({"type": "start-step"}))
    }

    fn reasoning(id: &str, text: &str) -> Vec<String> {
        vec![
            Self::part(json!({"type": "reasoning-start", "id": id})),
            Self::part(json!({"type": "reasoning-delta", "id": id, "delta": text})),
            Self::part(json!({"type": "reasoning-end", "id": id})),
        ]
    }

    fn tool_input(invocation: &ToolInvocation) -> String {
        Self::part(json!({
            "type": "tool-input-available",
            "toolCallId": invocation.tool_call_id,
            "toolName": invocation.tool_name.to_string(),
            "input": invocation.input,
        }))
    }

    fn tool_result(invocation: &ToolInvocation) -> String {
        match &invocation.result {
            Ok(data) => Self::part(json!({
                "type": "tool-output-available",
                "toolCallId": invocation.tool_call_id,
                "output": data,
            })),
            Err(error) => Self::part(json!({
                "type": "tool-output-error",
                "toolCallId": invocation.tool_call_id,
                "errorText": error,
            })),
        }
    }

    fn text(id: &str, text: &str) -> Vec<String> {
        let mut parts = vec![Self::part(json!({"type": "text-start", "id": id}))];
        // One delta per line, newlines kept
        parts.extend(
            text.split_inclusive('\n')
                .map(|line| Self::part(json!({"type": "text-delta", "id": id, "delta": line}))),
        );
        parts.push(Self::part(json!({"type": "text-end", "id": id})));
        parts
    }

    fn error(text: &str) -> String {
        Self::part(json!({"type": "error", "errorText": text}))
    }

    fn finish_step() -> String {
        Self::part(json!({"type": "finish-step"}))
    }

    fn finish() -> String {
        Self::part(json!({"type": "finish"}))
    }

    fn done() -> String {
        "data: [DONE]\n\n".to_string()
    }
}

fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

async fn send_all(
    tx: &mpsc::Sender<String>,
    parts: Vec<String>,
) -> Result<(), mpsc::error::SendError<String>> {
    for part in parts {
        tx.send(part).await?;
    }
    Ok(())
}

/// One plain completion over the whole history, used when the pipeline fails
async fn fallback_reply(
    provider: &dyn Provider,
    messages: &[ChatMessage],
) -> anyhow::Result<String> {
    let history = to_model_messages(messages);
    let options = CompletionOptions::default().with_temperature(FALLBACK_TEMPERATURE);
    let (message, _usage) = provider.complete(FALLBACK_SYSTEM, &history, &options).await?;
    Ok(message.text())
}

async fn stream_trace(
    trace: &PipelineTrace,
    tx: &mpsc::Sender<String>,
) -> Result<(), mpsc::error::SendError<String>> {
    if let Some(reasoning) = trace.reasoning() {
        send_all(tx, ProtocolFormatter::reasoning(&new_id("reasoning"), reasoning)).await?;
    }
    if let Some(invocation) = &trace.tool {
        tx.send(ProtocolFormatter::tool_input(invocation)).await?;
        tx.send(ProtocolFormatter::tool_result(invocation)).await?;
    }
    Ok(())
}

async fn stream_reply(
    orchestrator: Orchestrator,
    provider: std::sync::Arc<dyn Provider>,
    context: AgentContext,
    tx: mpsc::Sender<String>,
) -> Result<(), mpsc::error::SendError<String>> {
    tx.send(ProtocolFormatter::start(&new_id("msg"))).await?;
    tx.send(ProtocolFormatter::start_step()).await?;

    let reply = tokio::select! {
        reply = orchestrator.run(&context) => reply,
        _ = tx.closed() => {
            tracing::info!("Client disconnected, abandoning pipeline");
            return Ok(());
        }
    };
    stream_trace(&reply.trace, &tx).await?;

    let text_id = new_id("text");
    match reply.response.message.filter(|_| reply.response.success) {
        Some(message) => send_all(&tx, ProtocolFormatter::text(&text_id, &message)).await?,
        None => {
            tracing::warn!(
                error = reply.response.error.as_deref().unwrap_or_default(),
                "Agent pipeline failed, using fallback completion"
            );
            match fallback_reply(provider.as_ref(), &context.messages).await {
                Ok(text) => send_all(&tx, ProtocolFormatter::text(&text_id, &text)).await?,
                Err(e) => {
                    tracing::error!("Fallback completion failed: {}", e);
                    tx.send(ProtocolFormatter::error(&e.to_string())).await?;
                }
            }
        }
    }

    tx.send(ProtocolFormatter::finish_step()).await?;
    tx.send(ProtocolFormatter::finish()).await?;
    tx.send(ProtocolFormatter::done()).await?;
    Ok(())
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<SseResponse, StatusCode> {
    // Check protocol header (optional)
    if let Some(protocol) = headers.get("x-protocol") {
        if protocol.to_str().map(|p| p != "ui-message").unwrap_or(true) {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    let provider = state
        .provider_for(request.model.as_deref())
        .map_err(|e| {
            tracing::error!("Failed to create provider: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let context = AgentContext::new(
        request.messages,
        RequestMetadata {
            model: request.model,
            web_search: request.web_search,
        },
    );
    tracing::info!(
        query = %context.user_query,
        model = ?context.metadata.model,
        web_search = context.metadata.web_search,
        "Chat request"
    );
    let orchestrator = Orchestrator::new(provider.clone(), state.tools.clone());

    let (tx, rx) = mpsc::channel(100);
    tokio::spawn(async move {
        if let Err(e) = stream_reply(orchestrator, provider, context, tx).await {
            tracing::info!("Client went away before the stream finished: {}", e);
        }
    });

    Ok(SseResponse::new(ReceiverStream::new(rx)))
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    prompt: String,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    response: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

// Same pipeline, answered as a single JSON body
async fn ask_handler(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, (StatusCode, Json<AskResponse>)> {
    let failure = |error: String| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AskResponse {
                response: String::new(),
                success: false,
                error: Some(error),
            }),
        )
    };

    let provider = state.provider_for(None).map_err(|e| {
        tracing::error!("Failed to create provider: {}", e);
        failure(e.to_string())
    })?;
    let orchestrator = Orchestrator::new(provider, state.tools.clone());
    let reply = orchestrator.run(&AgentContext::from_prompt(request.prompt)).await;

    match reply.response.message.filter(|m| !m.is_empty()) {
        Some(message) => Ok(Json(AskResponse {
            response: message,
            success: reply.response.success,
            error: reply.response.error,
        })),
        None => Err(failure(
            reply
                .response
                .error
                .unwrap_or_else(|| "No response generated".to_string()),
        )),
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handler))
        .route("/api/ask", post(ask_handler))
        .with_state(state)
}
