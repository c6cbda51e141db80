//! HTTP API v1: flow listing, invocation and events.
//!
//! Endpoints:
//! - `GET  /v1/flows`         list flows with their input/output JSON Schemas
//! - `POST /v1/flows/{name}`  run a flow; the body is the flow input
//! - `GET  /v1/tools`         list registered tools
//! - `GET  /v1/events`        SSE stream of domain events
//!
//! A flow run answers `200 {"result": …}`, or `{"error": "…"}` with 400 for
//! input the flow rejects, 404 for an unknown flow and 500 for everything
//! else. Error bodies carry only the public message; the full cause is
//! logged.

use std::convert::Infallible;

use axum::{
    Router,
    extract::rejection::JsonRejection,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use sentinel_core::event::DomainEvent;
use sentinel_core::model::ToolDefinition;
use sentinel_flow::{FlowError, FlowInfo, FlowResponse};

use crate::SharedState;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/flows", get(list_flows_handler))
        .route("/flows/{name}", post(run_flow_handler))
        .route("/tools", get(list_tools_handler))
        .route("/events", get(event_stream_handler))
        .with_state(state)
}

// ── Response types ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct FlowListResponse {
    flows: Vec<FlowInfo>,
    count: usize,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolDefinition>,
    count: usize,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(FlowResponse::Error { error: message.into() })).into_response()
}

fn status_for(error: &FlowError) -> StatusCode {
    match error {
        FlowError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        FlowError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn list_flows_handler(State(state): State<SharedState>) -> Json<FlowListResponse> {
    let flows = state.engine.flows();
    let count = flows.len();
    Json(FlowListResponse { flows, count })
}

/// `POST /v1/flows/{name}`: run one flow invocation.
async fn run_flow_handler(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(input) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(flow = %name, error = %rejection, "Rejected flow request body");
            return error_response(rejection.status(), rejection.body_text());
        }
    };

    info!(flow = %name, "Flow requested over HTTP");
    match state.engine.run(&name, input).await {
        Ok(result) => Json(FlowResponse::Result { result }).into_response(),
        Err(e) => error_response(status_for(&e), e.public_message(&name)),
    }
}

async fn list_tools_handler(State(state): State<SharedState>) -> Json<ToolListResponse> {
    let tools = state.engine.tools().all_definitions();
    let count = tools.len();
    Json(ToolListResponse { tools, count })
}

// ── SSE Event Stream ──────────────────────────────────────────────────────

fn event_name(event: &DomainEvent) -> &'static str {
    match event {
        DomainEvent::FlowStarted { .. } => "flow_started",
        DomainEvent::FlowCompleted { .. } => "flow_completed",
        DomainEvent::FlowFailed { .. } => "flow_failed",
        DomainEvent::ToolExecuted { .. } => "tool_executed",
        DomainEvent::ModelResponded { .. } => "model_responded",
    }
}

/// `GET /v1/events`: SSE stream of flow, tool and model events.
async fn event_stream_handler(
    State(state): State<SharedState>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.engine.events().subscribe();
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx)
        .filter_map(|result| result.ok())
        .map(|event| {
            let data = serde_json::to_string(event.as_ref()).unwrap_or_default();
            Ok(SseEvent::default().event(event_name(&event)).data(data))
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
