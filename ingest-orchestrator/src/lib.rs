//! Ingestion orchestration: admission, concurrency, cancellation, and the
//! staged workflow.
//!
//! One [`Orchestrator`] per process owns the store clients, the shared
//! embedding service, and the status bus. Repositories ingest in parallel up
//! to `max_concurrent_repos` (counting semaphore); stages within a task are
//! strictly sequential. Every task carries a cancel token checked at each
//! suspension point.
//!
//! Initialization failures surface here, at admission time — never mid-task:
//! an invalid config or an embedding model that fails its warm-up refuses new
//! tasks with `ConfigInvalid`.

mod config;
mod errors;
mod request;
mod retry;
mod stages;
mod validate;

pub use config::AppConfig;
pub use errors::{IngestError, StageErrorKind, StageFailure};
pub use request::{IngestOptions, IngestRequest, Priority};

use chrono::Utc;
use embed_service::{EmbedService, HashEmbedder, OllamaConfig, OllamaEmbedder};
use graph_store::{GraphStore, GraphStoreConfig};
use status_bus::{Stage, StatusBus, TaskError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vector_store::{VectorStore, VectorStoreConfig, collection_name};

pub struct Orchestrator {
    pub(crate) cfg: AppConfig,
    pub(crate) status: Arc<StatusBus>,
    pub(crate) embed: Arc<EmbedService>,
    pub(crate) vectors: Arc<VectorStore>,
    pub(crate) graph: Arc<GraphStore>,
    gate: Arc<Semaphore>,
    tasks: Mutex<HashMap<String, CancellationToken>>,
    task_seq: AtomicU64,
}

impl Orchestrator {
    /// Connect the stores, enforce the graph schema, and warm up the
    /// embedding model. Any failure here means the service refuses tasks.
    pub async fn bootstrap(cfg: AppConfig) -> Result<Arc<Self>, IngestError> {
        cfg.validate().map_err(IngestError::ConfigInvalid)?;

        let embed = build_embed_service(&cfg)?;
        embed
            .warm_up(Duration::from_secs(cfg.embedding_warmup_seconds))
            .await
            .map_err(|e| IngestError::ConfigInvalid(format!("embedding model not ready: {e}")))?;

        let vectors = VectorStore::connect(VectorStoreConfig {
            url: cfg.vector_store_endpoint.clone(),
            api_key: cfg.vector_store_api_key.clone(),
            upsert_batch: 256,
        })
        .map_err(|e| IngestError::Store(e.to_string()))?;

        let graph = GraphStore::connect(GraphStoreConfig {
            uri: cfg.graph_store_endpoint.clone(),
            user: cfg.graph_store_user.clone(),
            password: cfg.graph_store_password.clone(),
        })
        .await
        .map_err(|e| IngestError::Store(e.to_string()))?;
        graph
            .ensure_schema()
            .await
            .map_err(|e| IngestError::Store(e.to_string()))?;

        let status = Arc::new(StatusBus::new(cfg.status_bus_endpoint.clone()));
        let gate = Arc::new(Semaphore::new(cfg.max_concurrent_repos));

        info!(
            "orchestrator: ready (model='{}', dim={}, max_concurrent={})",
            embed.model_id(),
            embed.dimension(),
            cfg.max_concurrent_repos
        );

        Ok(Arc::new(Self {
            cfg,
            status,
            embed,
            vectors: Arc::new(vectors),
            graph: Arc::new(graph),
            gate,
            tasks: Mutex::new(HashMap::new()),
            task_seq: AtomicU64::new(1),
        }))
    }

    pub fn status_bus(&self) -> Arc<StatusBus> {
        Arc::clone(&self.status)
    }

    pub fn embed_service(&self) -> Arc<EmbedService> {
        Arc::clone(&self.embed)
    }

    pub fn vector_store(&self) -> Arc<VectorStore> {
        Arc::clone(&self.vectors)
    }

    pub fn graph_store(&self) -> Arc<GraphStore> {
        Arc::clone(&self.graph)
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    /// Admit a task. Returns the task id; progress flows through the status
    /// bus from here on.
    pub fn submit(self: &Arc<Self>, req: IngestRequest) -> Result<String, IngestError> {
        req.validate().map_err(IngestError::ConfigInvalid)?;
        if !self.embed.is_ready() {
            return Err(IngestError::ConfigInvalid(String::from(
                "embedding model is not ready",
            )));
        }

        let repository = req.repository_name.trim().to_string();
        {
            let tasks = lock(&self.tasks);
            let running = tasks.keys().any(|id| {
                self.status
                    .get(id)
                    .map(|s| s.repository_name == repository && !s.is_terminal())
                    .unwrap_or(false)
            });
            if running {
                return Err(IngestError::AlreadyRunning(repository));
            }
        }

        let seq = self.task_seq.fetch_add(1, Ordering::SeqCst);
        let task_id = format!("task-{}-{}", Utc::now().timestamp_millis(), seq);
        let token = CancellationToken::new();

        self.status.create_task(&task_id, &repository);
        lock(&self.tasks).insert(task_id.clone(), token.clone());

        let orc = Arc::clone(self);
        let spawned_id = task_id.clone();
        tokio::spawn(async move {
            run_task(orc, spawned_id, req, token).await;
        });

        Ok(task_id)
    }

    /// Signal cancellation. The task drains in-flight batches and lands in
    /// `failed` with cause `cancelled`.
    pub fn cancel(&self, task_id: &str) -> Result<(), IngestError> {
        let tasks = lock(&self.tasks);
        match tasks.get(task_id) {
            Some(token) => {
                info!("orchestrator: cancelling task {}", task_id);
                token.cancel();
                Ok(())
            }
            None => Err(IngestError::UnknownTask(task_id.to_string())),
        }
    }

    /// Admin operation: cascade-delete one repository from both stores.
    pub async fn delete_repository(&self, repository: &str) -> Result<(), IngestError> {
        let collection = collection_name(repository);
        if self
            .vectors
            .collection_exists(&collection)
            .await
            .map_err(|e| IngestError::Store(e.to_string()))?
        {
            self.vectors
                .drop_collection(&collection)
                .await
                .map_err(|e| IngestError::Store(e.to_string()))?;
        }
        self.graph
            .delete_repository(repository)
            .await
            .map_err(|e| IngestError::Store(e.to_string()))?;
        info!("orchestrator: repository '{}' deleted", repository);
        Ok(())
    }
}

/// Outer task wrapper: concurrency gate, terminal status, registry cleanup.
async fn run_task(
    orc: Arc<Orchestrator>,
    task_id: String,
    req: IngestRequest,
    token: CancellationToken,
) {
    // Admission is immediate; execution waits for a slot.
    let _permit = match Arc::clone(&orc.gate).acquire_owned().await {
        Ok(p) => p,
        Err(_) => {
            orc.status.finish_failed(&task_id, "scheduler shut down");
            return;
        }
    };

    let result = stages::run_stages(&orc, &task_id, &req, &token).await;

    match result {
        Ok(()) => {
            let with_warnings = orc
                .status
                .get(&task_id)
                .map(|s| !s.warnings.is_empty())
                .unwrap_or(false);
            orc.status.finish_completed(&task_id, with_warnings);
            info!(
                "task {}: completed{}",
                task_id,
                if with_warnings { " with warnings" } else { "" }
            );
        }
        Err(failure) => {
            if failure.kind != StageErrorKind::Cancelled {
                error!("task {}: failed: {}", task_id, failure.message);
            }
            let stage = orc
                .status
                .get(&task_id)
                .map(|s| s.current_stage)
                .unwrap_or(Stage::Queued);
            orc.status.record_error(
                &task_id,
                TaskError {
                    stage,
                    kind: failure.kind.as_str().to_string(),
                    message: failure.message.clone(),
                    file_path: None,
                    recoverable: false,
                },
            );
            orc.status
                .finish_failed(&task_id, failure.kind.as_str());
        }
    }

    lock(&orc.tasks).remove(&task_id);
}

fn build_embed_service(cfg: &AppConfig) -> Result<Arc<EmbedService>, IngestError> {
    let provider: Arc<dyn embed_service::EmbeddingsProvider> =
        match cfg.embedding_provider.as_str() {
            "hash" => Arc::new(HashEmbedder::new(cfg.embedding_dim)),
            "ollama" => Arc::new(
                OllamaEmbedder::new(OllamaConfig {
                    url: cfg.ollama_url.clone(),
                    model: cfg.embedding_model_id.clone(),
                    dim: cfg.embedding_dim,
                    timeout: Duration::from_secs(cfg.llm_timeout_seconds),
                })
                .map_err(|e| IngestError::ConfigInvalid(e.to_string()))?,
            ),
            other => {
                return Err(IngestError::ConfigInvalid(format!(
                    "unknown embedding provider '{other}'"
                )));
            }
        };
    Ok(Arc::new(EmbedService::new(
        provider,
        cfg.embedding_batch_size,
    )))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("orchestrator: recovering poisoned lock");
            poisoned.into_inner()
        }
    }
}
