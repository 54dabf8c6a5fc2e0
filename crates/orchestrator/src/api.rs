//! HTTP API: test lifecycle, scaling history, health, and metrics

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use orchestrator_lib::{
    export, ComponentStatus, HealthRegistry, Orchestrator, OrchestratorError, TestRequest,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, health_registry: HealthRegistry) -> Self {
        Self {
            orchestrator,
            health_registry,
        }
    }
}

async fn create_test(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TestRequest>,
) -> impl IntoResponse {
    match state.orchestrator.start_test(request).await {
        Ok(test) => (StatusCode::CREATED, Json(json!(test))),
        Err(e) => {
            let status = match &e {
                OrchestratorError::Busy { .. } => StatusCode::CONFLICT,
                _ => StatusCode::BAD_REQUEST,
            };
            (status, Json(json!({ "error": e.to_string() })))
        }
    }
}

async fn list_tests(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.orchestrator.registry().list().await)
}

async fn get_test(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.orchestrator.registry().get(&id).await {
        Some(test) => (StatusCode::OK, Json(json!(test))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no test with id {id}") })),
        ),
    }
}

async fn delete_test(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if state.orchestrator.delete_test(&id).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no test with id {id}") })),
        )
            .into_response()
    }
}

async fn export_tests(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tests = state.orchestrator.registry().list().await;
    let csv = export::export_csv(&tests);
    (
        StatusCode::OK,
        [
            ("content-type", "text/csv; charset=utf-8"),
            ("content-disposition", "attachment; filename=\"tests.csv\""),
        ],
        csv,
    )
}

async fn scaling_history(
    State(state): State<Arc<AppState>>,
    Path(cluster): Path<String>,
) -> impl IntoResponse {
    let series = state.orchestrator.scaling_history().series(&cluster).await;
    Json(series)
}

/// Liveness probe; degraded components still report 200
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            e.to_string().into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/tests", post(create_test).get(list_tests))
        .route("/api/tests/export", get(export_tests))
        .route("/api/tests/:id", get(get_test).delete(delete_test))
        .route("/api/scaling/:cluster", get(scaling_history))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
