//! The staged ingestion workflow for one task.
//!
//! Stages run strictly in sequence; work inside a stage may fan out. The
//! cancel token is checked at every stage boundary and every batch boundary,
//! and blocking work (clone, scan, parse) runs on the blocking pool so the
//! event loop stays responsive.
//!
//! Failure policy per stage:
//! - cloning: fatal (`source_unavailable`);
//! - parsing: per-file warnings, never fatal;
//! - embedding: per-item zero-vector substitution, never fatal;
//! - storing: retried with backoff, then fatal;
//! - validating: mismatch recorded, terminal state `completed_with_warnings`.

use crate::errors::{StageErrorKind, StageFailure};
use crate::request::IngestRequest;
use crate::retry;
use crate::validate;
use crate::Orchestrator;
use chunk_prep::{CodeChunk, RepoSummary, parse_file};
use embed_service::EmbeddedVector;
use graph_store::{RepositoryNode, RepositoryStats};
use legacy_patterns::PatternSet;
use repo_source::WorkingTree;
use status_bus::{Stage, StageProgress, TaskError};
use std::fmt::Display;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vector_store::{ChunkPoint, EnsureOutcome, collection_name};

/// Files parsed per blocking-pool call.
const PARSE_BATCH: usize = 16;
/// Clone gets its own generous timeout; everything else uses the store
/// operation timeout from config.
const CLONE_TIMEOUT: Duration = Duration::from_secs(600);

pub(crate) fn check_cancel(token: &CancellationToken) -> Result<(), StageFailure> {
    if token.is_cancelled() {
        Err(StageFailure::cancelled())
    } else {
        Ok(())
    }
}

/// Run every stage for one admitted task. The caller translates the result
/// into a terminal status.
pub(crate) async fn run_stages(
    orc: &Orchestrator,
    task_id: &str,
    req: &IngestRequest,
    token: &CancellationToken,
) -> Result<(), StageFailure> {
    let repository = req.repository_name.trim().to_string();
    let chunk_cfg = req.options.chunk_config(&orc.cfg.chunking);

    check_cancel(token)?;
    orc.status.transition(task_id, Stage::Cloning);
    let tree = stage_clone(orc, &repository, req).await?;

    check_cancel(token)?;
    orc.status.transition(task_id, Stage::Analyzing);
    let summary = stage_analyze(&tree, &chunk_cfg).await?;
    info!(
        "task {}: analyzed {} files ({} loc)",
        task_id,
        summary.files.len(),
        summary.total_loc()
    );

    check_cancel(token)?;
    orc.status.transition(task_id, Stage::Parsing);
    let (chunks, patterns) =
        stage_parse(orc, task_id, &repository, &summary, &chunk_cfg, req, token).await?;
    info!("task {}: {} chunks", task_id, chunks.len());

    check_cancel(token)?;
    orc.status.transition(task_id, Stage::Embedding);
    let embedded = stage_embed(orc, task_id, &chunks, token).await?;

    check_cancel(token)?;
    orc.status.transition(task_id, Stage::Storing);
    stage_store(
        orc,
        task_id,
        &repository,
        req,
        &tree,
        &summary,
        &chunks,
        &embedded,
        &patterns,
    )
    .await?;

    check_cancel(token)?;
    orc.status.transition(task_id, Stage::Validating);
    stage_validate(orc, task_id, &repository, &chunks, &embedded).await;

    Ok(())
}

async fn stage_clone(
    orc: &Orchestrator,
    repository: &str,
    req: &IngestRequest,
) -> Result<WorkingTree, StageFailure> {
    let spec = req.source.clone();
    let workspace = orc.cfg.workspace_dir.clone();
    let name = repository.to_string();

    let handle =
        tokio::task::spawn_blocking(move || repo_source::acquire(&spec, &workspace, &name));
    let joined = tokio::time::timeout(CLONE_TIMEOUT, handle).await;

    match joined {
        Err(_) => Err(StageFailure::new(
            StageErrorKind::SourceUnavailable,
            format!("clone timed out after {CLONE_TIMEOUT:?}"),
        )),
        Ok(Err(join_err)) => Err(StageFailure::new(
            StageErrorKind::SourceUnavailable,
            format!("clone task crashed: {join_err}"),
        )),
        Ok(Ok(Err(e))) => Err(StageFailure::new(
            StageErrorKind::SourceUnavailable,
            e.to_string(),
        )),
        Ok(Ok(Ok(tree))) => Ok(tree),
    }
}

async fn stage_analyze(
    tree: &WorkingTree,
    chunk_cfg: &chunk_prep::ChunkConfig,
) -> Result<RepoSummary, StageFailure> {
    let root = tree.root.clone();
    let cfg = chunk_cfg.clone();
    tokio::task::spawn_blocking(move || chunk_prep::analyze_repo(&root, &cfg))
        .await
        .map_err(|e| {
            StageFailure::new(StageErrorKind::SourceUnavailable, format!("scan crashed: {e}"))
        })?
        .map_err(|e| StageFailure::new(StageErrorKind::SourceUnavailable, format!("{e:#}")))
}

/// Parse every supported file into chunks, then run the pattern extractors.
/// Per-file failures degrade to warnings; the stage itself only fails on
/// cancellation.
async fn stage_parse(
    orc: &Orchestrator,
    task_id: &str,
    repository: &str,
    summary: &RepoSummary,
    chunk_cfg: &chunk_prep::ChunkConfig,
    req: &IngestRequest,
    token: &CancellationToken,
) -> Result<(Vec<CodeChunk>, PatternSet), StageFailure> {
    let work_list: Vec<chunk_prep::FileMeta> = summary.parseable().cloned().collect();
    let total = work_list.len() as u64;
    let started = Instant::now();
    let mut chunks: Vec<CodeChunk> = Vec::new();
    let mut processed = 0u64;

    for batch in work_list.chunks(PARSE_BATCH) {
        check_cancel(token)?;

        let batch_owned = batch.to_vec();
        let repo = repository.to_string();
        let cfg = chunk_cfg.clone();
        let outcomes = tokio::task::spawn_blocking(move || {
            batch_owned
                .into_iter()
                .map(|meta| {
                    let result = parse_file(&repo, &meta, &cfg);
                    (meta.path.clone(), result)
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| {
            StageFailure::new(StageErrorKind::ParserError, format!("parse batch crashed: {e}"))
        })?;

        for (path, result) in outcomes {
            processed += 1;
            match result {
                Ok(outcome) => {
                    if let Some(warning) = outcome.warning {
                        orc.status.record_error(
                            task_id,
                            TaskError {
                                stage: Stage::Parsing,
                                kind: StageErrorKind::ParserError.as_str().to_string(),
                                message: warning.clone(),
                                file_path: Some(path),
                                recoverable: true,
                            },
                        );
                        orc.status.record_warning(task_id, warning);
                    }
                    chunks.extend(outcome.chunks);
                }
                Err(e) => {
                    let message = format!("skipping {path}: {e:#}");
                    warn!("task {task_id}: {message}");
                    orc.status.record_error(
                        task_id,
                        TaskError {
                            stage: Stage::Parsing,
                            kind: StageErrorKind::ParserError.as_str().to_string(),
                            message: message.clone(),
                            file_path: Some(path),
                            recoverable: true,
                        },
                    );
                    orc.status.record_warning(task_id, message);
                }
            }
        }

        let fraction = if total == 0 {
            1.0
        } else {
            processed as f32 / total as f32
        };
        orc.status.update_progress(
            task_id,
            fraction * 0.9, // leave headroom for pattern extraction
            StageProgress {
                total_items: Some(total),
                processed_items: Some(processed),
                rate_per_sec: rate(processed, started),
                current_item: None,
            },
        );
    }

    check_cancel(token)?;

    // Framework patterns ride on the parsing stage.
    let files = summary.files.clone();
    let opts = req.options.pattern_options();
    let (chunks, patterns) = tokio::task::spawn_blocking(move || {
        let mut chunks = chunks;
        let set = legacy_patterns::extract_patterns(&files, &chunks, &opts);
        legacy_patterns::annotate_chunks(&mut chunks, &set);
        (chunks, set)
    })
    .await
    .map_err(|e| {
        StageFailure::new(
            StageErrorKind::ParserError,
            format!("pattern extraction crashed: {e}"),
        )
    })?;

    orc.status.update_progress(
        task_id,
        1.0,
        StageProgress {
            total_items: Some(total),
            processed_items: Some(total),
            rate_per_sec: rate(processed, started),
            current_item: None,
        },
    );
    Ok((chunks, patterns))
}

/// Embed all chunk texts. Never fails: persistent per-item errors become
/// zero vectors flagged `embedding_failed`.
async fn stage_embed(
    orc: &Orchestrator,
    task_id: &str,
    chunks: &[CodeChunk],
    token: &CancellationToken,
) -> Result<Vec<EmbeddedVector>, StageFailure> {
    let total = chunks.len() as u64;
    let batch = orc.cfg.embedding_batch_size.max(1);
    let started = Instant::now();
    let mut out: Vec<EmbeddedVector> = Vec::with_capacity(chunks.len());

    for group in chunks.chunks(batch) {
        check_cancel(token)?;
        let texts: Vec<String> = group.iter().map(|c| c.text.clone()).collect();
        let mut embedded = orc.embed.embed_batch(&texts).await;
        out.append(&mut embedded);

        orc.status.update_progress(
            task_id,
            if total == 0 {
                1.0
            } else {
                out.len() as f32 / total as f32
            },
            StageProgress {
                total_items: Some(total),
                processed_items: Some(out.len() as u64),
                rate_per_sec: rate(out.len() as u64, started),
                current_item: None,
            },
        );
    }

    let failed = out.iter().filter(|e| e.failed).count();
    if failed > 0 {
        let message = format!("{failed} chunks embedded as zero vectors after retry");
        orc.status.record_error(
            task_id,
            TaskError {
                stage: Stage::Embedding,
                kind: StageErrorKind::EmbeddingBatchError.as_str().to_string(),
                message: message.clone(),
                file_path: None,
                recoverable: true,
            },
        );
        orc.status.record_warning(task_id, message);
    }
    Ok(out)
}

/// Commit to both stores. Writes are grouped, retried with backoff, and any
/// exhausted retry is stage-fatal: nothing gets half-published silently.
#[allow(clippy::too_many_arguments)]
async fn stage_store(
    orc: &Orchestrator,
    task_id: &str,
    repository: &str,
    req: &IngestRequest,
    tree: &WorkingTree,
    summary: &RepoSummary,
    chunks: &[CodeChunk],
    embedded: &[EmbeddedVector],
    patterns: &PatternSet,
) -> Result<(), StageFailure> {
    let attempts = orc.cfg.store_retry_attempts;
    let base = Duration::from_millis(orc.cfg.store_retry_base_ms);
    let op_timeout = Duration::from_secs(orc.cfg.store_op_timeout_seconds);

    // Repository node first: chunks without a Repository are forbidden.
    let node = RepositoryNode {
        name: repository.to_string(),
        origin: tree.origin.clone(),
        branch: tree.branch.clone(),
        config_snapshot: serde_json::to_string(&req.options).unwrap_or_default(),
    };
    store_op(
        "graph.upsert_repository",
        attempts,
        base,
        op_timeout,
        StageErrorKind::GraphStoreWriteError,
        || orc.graph.upsert_repository(&node),
    )
    .await?;

    store_op(
        "graph.upsert_files",
        attempts,
        base,
        op_timeout,
        StageErrorKind::GraphStoreWriteError,
        || orc.graph.upsert_files(repository, &summary.files),
    )
    .await?;

    if !chunks.is_empty() {
        // Vector side: collection lifecycle, then points.
        let collection = collection_name(repository);
        let dim = orc.embed.dimension() as u64;
        let outcome = store_op(
            "vector.ensure_collection",
            attempts,
            base,
            op_timeout,
            StageErrorKind::VectorStoreWriteError,
            || orc.vectors.ensure_collection(&collection, dim),
        )
        .await?;
        if let EnsureOutcome::Recreated { previous_dim } = outcome {
            let message = format!(
                "dimension mismatch on '{collection}': {previous_dim} -> {dim}, collection recreated"
            );
            orc.status.record_error(
                task_id,
                TaskError {
                    stage: Stage::Storing,
                    kind: StageErrorKind::DimensionMismatch.as_str().to_string(),
                    message: message.clone(),
                    file_path: None,
                    recoverable: true,
                },
            );
            orc.status.record_warning(task_id, message);
        }

        let model = orc.embed.model_id().to_string();
        let points: Vec<ChunkPoint> = chunks
            .iter()
            .zip(embedded)
            .map(|(chunk, vec)| ChunkPoint::from_chunk(chunk, vec.vector.clone(), &model, vec.failed))
            .collect();
        store_op(
            "vector.upsert",
            attempts,
            base,
            op_timeout,
            StageErrorKind::VectorStoreWriteError,
            || orc.vectors.upsert_chunks(&collection, &points),
        )
        .await?;

        store_op(
            "graph.upsert_chunks",
            attempts,
            base,
            op_timeout,
            StageErrorKind::GraphStoreWriteError,
            || orc.graph.upsert_chunks(chunks),
        )
        .await?;

        store_op(
            "graph.upsert_patterns",
            attempts,
            base,
            op_timeout,
            StageErrorKind::GraphStoreWriteError,
            || orc.graph.upsert_patterns(repository, patterns),
        )
        .await?;
    }

    let stats = RepositoryStats {
        file_count: summary.files.len(),
        chunk_count: chunks.len(),
        total_loc: summary.total_loc(),
    };
    store_op(
        "graph.update_stats",
        attempts,
        base,
        op_timeout,
        StageErrorKind::GraphStoreWriteError,
        || orc.graph.update_repository_stats(repository, &stats),
    )
    .await?;

    orc.status.update_progress(task_id, 1.0, StageProgress::default());
    Ok(())
}

/// Cross-store parity check. Mismatch is recorded, never fatal.
async fn stage_validate(
    orc: &Orchestrator,
    task_id: &str,
    repository: &str,
    chunks: &[CodeChunk],
    embedded: &[EmbeddedVector],
) {
    if chunks.is_empty() {
        return;
    }

    let collection = collection_name(repository);
    let vector_count = match orc.vectors.count(&collection).await {
        Ok(n) => n,
        Err(e) => {
            warn!("task {task_id}: vector count failed: {e}");
            0
        }
    };
    let graph_count = match orc.graph.chunk_count(repository).await {
        Ok(n) => n,
        Err(e) => {
            warn!("task {task_id}: graph count failed: {e}");
            0
        }
    };
    let epsilon = embedded.iter().filter(|e| e.failed).count() as u64;

    if let Err(message) = validate::check_parity(vector_count, graph_count, epsilon) {
        orc.status.record_error(
            task_id,
            TaskError {
                stage: Stage::Validating,
                kind: StageErrorKind::ValidationMismatch.as_str().to_string(),
                message: message.clone(),
                file_path: None,
                recoverable: true,
            },
        );
        orc.status.record_warning(task_id, message);
    }
}

/// One store write group: per-attempt timeout, bounded exponential backoff,
/// stage-fatal on exhaustion.
async fn store_op<T, E, F, Fut>(
    label: &str,
    attempts: u32,
    base: Duration,
    op_timeout: Duration,
    kind: StageErrorKind,
    mut op: F,
) -> Result<T, StageFailure>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    retry::with_backoff(label, attempts, base, || {
        let fut = op();
        async move {
            match tokio::time::timeout(op_timeout, fut).await {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("timed out after {op_timeout:?}")),
            }
        }
    })
    .await
    .map_err(|e| StageFailure::new(kind, format!("{label}: {e}")))
}

fn rate(processed: u64, started: Instant) -> Option<f64> {
    let secs = started.elapsed().as_secs_f64();
    if secs > 0.0 && processed > 0 {
        Some(processed as f64 / secs)
    } else {
        None
    }
}
