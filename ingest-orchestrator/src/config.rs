//! Runtime configuration for the ingestion service.
//!
//! Environment-driven with defaults; validated once at startup. An invalid
//! configuration refuses task admission rather than failing mid-task.

use chunk_prep::ChunkConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Repositories ingesting in parallel.
    pub max_concurrent_repos: usize,

    // Embedding
    pub embedding_provider: String, // "ollama" | "hash"
    pub embedding_model_id: String,
    pub embedding_dim: usize,
    pub embedding_batch_size: usize,
    pub embedding_warmup_seconds: u64,
    pub ollama_url: String,

    // Stores
    pub vector_store_endpoint: String,
    pub vector_store_api_key: Option<String>,
    pub graph_store_endpoint: String,
    pub graph_store_user: String,
    pub graph_store_password: String,

    /// Status snapshots directory; `None` keeps state in memory only.
    pub status_bus_endpoint: Option<PathBuf>,

    /// Where remote sources are checked out.
    pub workspace_dir: PathBuf,

    /// Chunking defaults; per-request options override fields.
    pub chunking: ChunkConfig,

    // Store write retry policy
    pub store_retry_attempts: u32,
    pub store_retry_base_ms: u64,
    pub store_op_timeout_seconds: u64,

    // Retrieval defaults (consumed by the retriever)
    pub llm_timeout_seconds: u64,
    pub retrieval_top_k_default: u64,
    pub retrieval_min_score_default: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_concurrent_repos: 2,
            embedding_provider: String::from("ollama"),
            embedding_model_id: String::from("nomic-embed-text"),
            embedding_dim: 768,
            embedding_batch_size: 8,
            embedding_warmup_seconds: 120,
            ollama_url: String::from("http://127.0.0.1:11434"),
            vector_store_endpoint: String::from("http://127.0.0.1:6334"),
            vector_store_api_key: None,
            graph_store_endpoint: String::from("bolt://127.0.0.1:7687"),
            graph_store_user: String::from("neo4j"),
            graph_store_password: String::from("neo4j"),
            status_bus_endpoint: Some(PathBuf::from("task_state")),
            workspace_dir: PathBuf::from("code_data"),
            chunking: ChunkConfig::default(),
            store_retry_attempts: 3,
            store_retry_base_ms: 500,
            store_op_timeout_seconds: 60,
            llm_timeout_seconds: 120,
            retrieval_top_k_default: 10,
            retrieval_min_score_default: 0.2,
        }
    }
}

impl AppConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = parse("MAX_CONCURRENT_REPOS") {
            cfg.max_concurrent_repos = v;
        }
        if let Ok(v) = env::var("EMBEDDING_PROVIDER") {
            cfg.embedding_provider = v;
        }
        if let Ok(v) = env::var("EMBEDDING_MODEL_ID") {
            cfg.embedding_model_id = v;
        }
        if let Some(v) = parse("EMBEDDING_DIM") {
            cfg.embedding_dim = v;
        }
        if let Some(v) = parse("EMBEDDING_BATCH_SIZE") {
            cfg.embedding_batch_size = v;
        }
        if let Some(v) = parse("EMBEDDING_WARMUP_SECONDS") {
            cfg.embedding_warmup_seconds = v;
        }
        if let Ok(v) = env::var("OLLAMA_URL") {
            cfg.ollama_url = v;
        }
        if let Ok(v) = env::var("VECTOR_STORE_ENDPOINT") {
            cfg.vector_store_endpoint = v;
        }
        cfg.vector_store_api_key = env::var("VECTOR_STORE_API_KEY").ok();
        if let Ok(v) = env::var("GRAPH_STORE_ENDPOINT") {
            cfg.graph_store_endpoint = v;
        }
        if let Ok(v) = env::var("GRAPH_STORE_USER") {
            cfg.graph_store_user = v;
        }
        if let Ok(v) = env::var("GRAPH_STORE_PASSWORD") {
            cfg.graph_store_password = v;
        }
        if let Ok(v) = env::var("STATUS_BUS_ENDPOINT") {
            cfg.status_bus_endpoint = if v.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(v))
            };
        }
        if let Ok(v) = env::var("WORKSPACE_DIR") {
            cfg.workspace_dir = PathBuf::from(v);
        }
        if let Ok(chunking) = ChunkConfig::from_env() {
            cfg.chunking = chunking;
        }
        if let Some(v) = parse("STORE_RETRY_ATTEMPTS") {
            cfg.store_retry_attempts = v;
        }
        if let Some(v) = parse("STORE_RETRY_BASE_MS") {
            cfg.store_retry_base_ms = v;
        }
        if let Some(v) = parse("STORE_OP_TIMEOUT_SECONDS") {
            cfg.store_op_timeout_seconds = v;
        }
        if let Some(v) = parse("LLM_TIMEOUT_SECONDS") {
            cfg.llm_timeout_seconds = v;
        }
        if let Some(v) = parse("RETRIEVAL_TOP_K_DEFAULT") {
            cfg.retrieval_top_k_default = v;
        }
        if let Some(v) = parse("RETRIEVAL_MIN_SCORE_DEFAULT") {
            cfg.retrieval_min_score_default = v;
        }

        cfg
    }

    /// Startup validation. Failure refuses admission of any task.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_repos == 0 {
            return Err(String::from("max_concurrent_repos must be at least 1"));
        }
        if self.embedding_dim == 0 {
            return Err(String::from("embedding_dim must be greater than 0"));
        }
        if self.embedding_batch_size == 0 {
            return Err(String::from("embedding_batch_size must be at least 1"));
        }
        if !matches!(self.embedding_provider.as_str(), "ollama" | "hash") {
            return Err(format!(
                "unknown embedding provider '{}'",
                self.embedding_provider
            ));
        }
        if !(0.0..=1.0).contains(&self.retrieval_min_score_default) {
            return Err(String::from("retrieval_min_score_default must be in [0, 1]"));
        }
        if self.retrieval_top_k_default == 0 || self.retrieval_top_k_default > 50 {
            return Err(String::from("retrieval_top_k_default must be in 1..=50"));
        }
        self.chunking.validate().map_err(|e| e.to_string())?;
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_provider_is_rejected() {
        let cfg = AppConfig {
            embedding_provider: String::from("gpu-magic"),
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_dim_is_rejected() {
        let cfg = AppConfig {
            embedding_dim: 0,
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
