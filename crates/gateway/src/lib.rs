//! HTTP gateway for Sentinel.
//!
//! Exposes the flow engine over REST: health, flow and tool listings, flow
//! invocation and an SSE stream of domain events.
//!
//! Built on Axum.

pub mod api_v1;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use axum::{Router, extract::State, response::Json, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use sentinel_config::AppConfig;
use sentinel_flow::FlowEngine;

/// Photos arrive inline as data URIs.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub engine: FlowEngine,
    pub start_time: DateTime<Utc>,
}

impl GatewayState {
    pub fn new(engine: FlowEngine) -> Self {
        Self {
            engine,
            start_time: Utc::now(),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the router with every gateway route.
///
/// Layers applied:
/// - Request body size limit (10 MB)
/// - CORS for browser front ends
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server and serve until Ctrl-C.
pub async fn start(config: &AppConfig, engine: FlowEngine) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let flows = engine.flow_names().len();
    let app = build_router(Arc::new(GatewayState::new(engine)));

    info!(addr = %addr, flows, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model: String,
    provider_configured: bool,
    flows: usize,
    uptime_secs: i64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let adapter = state.engine.adapter();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        model: adapter.default_model().to_string(),
        provider_configured: adapter.has_provider(),
        flows: state.engine.flow_names().len(),
        uptime_secs: (Utc::now() - state.start_time).num_seconds(),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use sentinel_flow::testing::ScriptedProvider;
    use sentinel_flow::{FarmDeps, register_farm_flows};
    use sentinel_tools::{StaticFarmData, SyntheticForecast};

    pub fn state(provider: Arc<ScriptedProvider>) -> SharedState {
        let deps = FarmDeps::new(
            Arc::new(SyntheticForecast::default()),
            Arc::new(StaticFarmData::new()),
        );
        let engine = register_farm_flows(FlowEngine::builder().with_provider(provider), deps)
            .unwrap()
            .build()
            .unwrap();
        Arc::new(GatewayState::new(engine))
    }
}
