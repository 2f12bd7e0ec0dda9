//! HTTP front for the generation client.
//!
//! `POST /api/generate` takes `{htmlContent, prompt}` and answers
//! `{success, tweets, raw_response}` or `{success: false, error}`.
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::GenerateError;
use crate::generate::{DirectGenerator, PostGenerator};
use crate::model::SourceDocument;
use crate::prompt::PromptTemplate;

pub const MISSING_CONTENT: &str = "missing HTML content (htmlContent)";

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<DirectGenerator>,
    /// Used when a request carries no prompt, and served to UIs as the default.
    pub default_template: Arc<PromptTemplate>,
}

impl AppState {
    pub fn new(generator: DirectGenerator, default_template: PromptTemplate) -> Self {
        Self {
            generator: Arc::new(generator),
            default_template: Arc::new(default_template),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(rename = "htmlContent", default)]
    pub html_content: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub tweets: Vec<String>,
    pub raw_response: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/generate", post(generate_handler))
        .route("/api/prompt/default", get(default_prompt))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web server and run until Ctrl-C.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

async fn generate_handler(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": rejection.body_text() })),
            )
                .into_response();
        }
    };

    let content = match request.html_content {
        Some(content) if !content.is_empty() => content,
        _ => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": MISSING_CONTENT })))
                .into_response();
        }
    };
    let template = match request.prompt {
        Some(prompt) => PromptTemplate::new(prompt),
        None => state.default_template.as_ref().clone(),
    };

    let document = SourceDocument::new("request", content);
    match state.generator.generate_posts(&document, &template).await {
        Ok(result) => Json(GenerateResponse {
            success: true,
            tweets: result.posts,
            raw_response: result.raw_text,
        })
        .into_response(),
        Err(err) => {
            warn!(%err, "generate request failed");
            (
                status_for(&err),
                Json(json!({ "success": false, "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

pub fn status_for(err: &GenerateError) -> StatusCode {
    match err {
        GenerateError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        GenerateError::AuthNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        GenerateError::Upstream { .. } => StatusCode::BAD_GATEWAY,
    }
}

async fn default_prompt(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "prompt": state.default_template.as_str() }))
}

/// Health check endpoint for container orchestration.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "generation_enabled": state.generator.is_enabled(),
    }))
}
