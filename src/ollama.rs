use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::stream::{parse_fragment, LineAssembler};

/// How long a single read from the backend stream may stall before the turn
/// is abandoned. The backend itself imposes no deadline.
const STALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Failures reaching or reading the inference backend. Fragment-level
/// problems never appear here; they are skipped during reconstruction.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("could not reach inference backend: {0}. Make sure Ollama is running with: ollama serve")]
    Unreachable(#[source] reqwest::Error),

    #[error("inference backend returned status {0}")]
    BadStatus(StatusCode),

    #[error("inference backend supplied no readable stream: {0}")]
    StreamUnavailable(#[source] reqwest::Error),

    #[error("inference backend stream stalled for {}s", STALL_TIMEOUT.as_secs())]
    Stalled,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send a prompt and reconstruct the complete response from the
    /// backend's NDJSON stream.
    ///
    /// The whole stream is consumed before returning; the caller gets one
    /// trimmed string containing any `<think>` markup the model emitted.
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(BackendError::Unreachable)?;

        if !response.status().is_success() {
            return Err(BackendError::BadStatus(response.status()));
        }

        let mut body = response.bytes_stream();
        let mut assembler = LineAssembler::new();
        let mut full = String::new();

        loop {
            let chunk = match tokio::time::timeout(STALL_TIMEOUT, body.next()).await {
                Err(_) => return Err(BackendError::Stalled),
                Ok(None) => break,
                Ok(Some(chunk)) => chunk.map_err(BackendError::StreamUnavailable)?,
            };

            for line in assembler.push(&chunk) {
                if let Some(fragment) = parse_fragment(&line) {
                    full.push_str(&fragment.response);
                }
            }
        }

        // The last fragment may arrive without a trailing newline.
        if let Some(tail) = assembler.finish() {
            if let Some(fragment) = parse_fragment(&tail) {
                full.push_str(&fragment.response);
            }
        }

        Ok(full.trim().to_string())
    }

    pub async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(BackendError::Unreachable)?;

        if !response.status().is_success() {
            return Err(BackendError::BadStatus(response.status()));
        }

        let models_response: OllamaModelsResponse = response
            .json()
            .await
            .map_err(BackendError::StreamUnavailable)?;

        Ok(models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};
    use axum::Router;

    async fn spawn_backend(ndjson: &'static str) -> String {
        let app = Router::new()
            .route("/api/generate", post(move || async move { ndjson }))
            .route(
                "/api/tags",
                get(|| async { r#"{"models":[{"name":"deepseek-r1:latest"}]}"# }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_generate_reconstructs_stream() {
        let base = spawn_backend(
            "{\"response\":\"4\"}\n{\"response\":\"\",\"done\":false}\n{\"response\":\"\",\"done\":true}\n",
        )
        .await;

        let client = OllamaClient::new(&base);
        let out = client.generate("deepseek-r1:latest", "2+2?").await.unwrap();
        assert_eq!(out, "4");
    }

    #[tokio::test]
    async fn test_generate_tolerates_malformed_lines_and_missing_final_newline() {
        let base =
            spawn_backend("{\"response\":\"a\"}\ngarbage\n{\"response\":\"b\",\"done\":true}").await;

        let client = OllamaClient::new(&base);
        let out = client.generate("m", "p").await.unwrap();
        assert_eq!(out, "ab");
    }

    #[tokio::test]
    async fn test_generate_unreachable_backend() {
        // Nothing listens on the discard port; connect must fail.
        let client = OllamaClient::new("http://127.0.0.1:9");
        let err = client.generate("m", "p").await.unwrap_err();
        assert!(matches!(err, BackendError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_generate_bad_status() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async { (axum::http::StatusCode::NOT_FOUND, "no such model") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = OllamaClient::new(&format!("http://{addr}"));
        let err = client.generate("m", "p").await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::BadStatus(StatusCode::NOT_FOUND)
        ));
    }

    #[tokio::test]
    async fn test_list_models() {
        let base = spawn_backend("").await;
        let client = OllamaClient::new(&base);
        let models = client.list_models().await.unwrap();
        assert_eq!(models, vec!["deepseek-r1:latest".to_string()]);
    }
}
