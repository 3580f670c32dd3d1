//! Ollama embedding provider.
//!
//! Asynchronous calls to an Ollama server via `reqwest::Client`, with a
//! per-request timeout and a dimension check on every response.

use crate::{EmbedError, EmbeddingsProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the Ollama embedding backend.
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server (e.g. http://localhost:11434).
    pub url: String,
    /// Model name or tag (e.g. "nomic-embed-text").
    pub model: String,
    /// Expected embedding dimension.
    pub dim: usize,
    /// Per-request timeout.
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct OllamaEmbedder {
    client: Client,
    cfg: OllamaConfig,
}

impl OllamaEmbedder {
    pub fn new(cfg: OllamaConfig) -> Result<Self, EmbedError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| EmbedError::Provider(format!("http client init failed: {e}")))?;
        Ok(Self { client, cfg })
    }
}

impl EmbeddingsProvider for OllamaEmbedder {
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, EmbedError>> + Send + 'a>,
    > {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Request<'a> {
                model: &'a str,
                prompt: &'a str,
            }

            #[derive(Deserialize)]
            struct Response {
                embedding: Vec<f32>,
            }

            let req = Request {
                model: &self.cfg.model,
                prompt: text,
            };

            let resp = self
                .client
                .post(format!("{}/api/embeddings", self.cfg.url))
                .json(&req)
                .send()
                .await
                .map_err(|e| EmbedError::Provider(format!("Ollama request failed: {e}")))?
                .error_for_status()
                .map_err(|e| EmbedError::Provider(format!("Ollama HTTP error: {e}")))?;

            let parsed: Response = resp
                .json()
                .await
                .map_err(|e| EmbedError::Provider(format!("Ollama JSON parse failed: {e}")))?;

            if parsed.embedding.len() != self.cfg.dim {
                return Err(EmbedError::VectorSizeMismatch {
                    got: parsed.embedding.len(),
                    want: self.cfg.dim,
                });
            }

            Ok(parsed.embedding)
        })
    }

    fn dimension(&self) -> usize {
        self.cfg.dim
    }

    fn model_id(&self) -> &str {
        &self.cfg.model
    }
}
