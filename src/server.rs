use anyhow::Result;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

use crate::ollama::{BackendError, OllamaClient};

/// Shared state for the HTTP intermediary: one backend client plus the model
/// every request is answered with.
#[derive(Clone)]
pub struct ServerState {
    pub ollama: OllamaClient,
    pub model: String,
}

#[derive(Deserialize)]
struct AskRequest {
    prompt: String,
}

#[derive(Serialize)]
struct AskResponse {
    response: String,
}

struct AskError(BackendError);

impl IntoResponse for AskError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

/// `POST /api/ask` — forward the prompt, buffer the whole streamed response,
/// reply with the complete annotated text. Thinking markup is passed through
/// untouched; segmentation is the consumer's job.
async fn ask(
    State(state): State<ServerState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AskError> {
    tracing::info!(prompt_chars = request.prompt.len(), "forwarding prompt");

    let response = state
        .ollama
        .generate(&state.model, &request.prompt)
        .await
        .map_err(AskError)?;

    Ok(Json(AskResponse { response }))
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/ask", post(ask))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(bind: SocketAddr, state: ServerState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, model = %state.model, "ponder intermediary listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
