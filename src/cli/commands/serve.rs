//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for course queries and catalog analytics.

use crate::cli::Output;
use crate::config::Settings;
use crate::course_store::CourseAnalytics;
use crate::error::KursError;
use crate::orchestrator::{Orchestrator, QueryRequest, QueryResponse};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    settings: Settings,
) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let docs_dir = settings.docs_dir();

    let orchestrator = Orchestrator::new(settings)?;

    if let Some(dir) = docs_dir {
        if dir.is_dir() {
            let (courses, chunks) = orchestrator.add_course_folder(&dir, false).await?;
            info!("Loaded {} courses with {} chunks from {}", courses, chunks, dir.display());
        } else {
            Output::warning(&format!("Documents folder {} not found", dir.display()));
        }
    }

    let state = Arc::new(AppState { orchestrator });
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Kurs API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Query", "POST /api/query");
    Output::kv("Courses", "GET  /api/courses");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/query", post(query))
        .route("/api/courses", get(courses))
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Map a library error to an HTTP error response.
fn error_response(e: KursError) -> Response {
    let status = match e {
        KursError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", e);
    }
    (status, Json(ErrorResponse { error: e.to_string() })).into_response()
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sessions = state.orchestrator.sessions().session_count().await;
    Json(serde_json::json!({ "status": "ok", "sessions": sessions }))
}

async fn query(State(state): State<Arc<AppState>>, Json(req): Json<QueryRequest>) -> Response {
    match state.orchestrator.query(req).await {
        Ok(response) => Json::<QueryResponse>(response).into_response(),
        Err(e) => error_response(e),
    }
}

async fn courses(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.course_analytics().await {
        Ok(analytics) => Json::<CourseAnalytics>(analytics).into_response(),
        Err(e) => error_response(e),
    }
}
