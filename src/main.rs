//! Command-line entry point for the ingestion and retrieval service.
//!
//! Commands:
//!   ingest <repository_name> <url-or-path> [branch]   queue an ingestion and follow it
//!   ask <question> [repo1,repo2] [code|hybrid|architecture]
//!   status <task_id>                                  poll one task record
//!   delete <repository_name>                          cascade delete from both stores
//!
//! Cancellation is signal-driven: Ctrl-C during `ingest` cancels the task
//! and waits for the terminal `failed(cancelled)` status.

use std::error::Error;
use std::path::PathBuf;

use ingest_orchestrator::{AppConfig, IngestOptions, IngestRequest, Orchestrator, Priority};
use repo_source::SourceSpec;
use status_bus::StatusBus;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env if present.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("ingest") if args.len() >= 3 => {
            ingest(&args[1], &args[2], args.get(3).map(String::as_str)).await
        }
        Some("ask") if args.len() >= 2 => {
            ask(
                &args[1],
                args.get(2).map(String::as_str),
                args.get(3).map(String::as_str),
            )
            .await
        }
        Some("status") if args.len() >= 2 => status(&args[1]),
        Some("delete") if args.len() >= 2 => delete(&args[1]).await,
        _ => {
            eprintln!(
                "usage:\n  \
                 coderag-backend ingest <repository_name> <url-or-path> [branch]\n  \
                 coderag-backend ask <question> [repo1,repo2] [code|hybrid|architecture]\n  \
                 coderag-backend status <task_id>\n  \
                 coderag-backend delete <repository_name>"
            );
            std::process::exit(2);
        }
    }
}

async fn ingest(name: &str, source: &str, branch: Option<&str>) -> Result<(), Box<dyn Error>> {
    let cfg = AppConfig::from_env();
    let orchestrator = Orchestrator::bootstrap(cfg).await?;

    let source = if source.starts_with("http://")
        || source.starts_with("https://")
        || source.starts_with("git@")
        || source.starts_with("ssh://")
    {
        SourceSpec::Remote {
            url: source.to_string(),
            branch: branch.map(str::to_string),
            credentials: None,
        }
    } else {
        SourceSpec::Local {
            local_path: PathBuf::from(source),
        }
    };

    let task_id = orchestrator.submit(IngestRequest {
        repository_name: name.to_string(),
        source,
        priority: Priority::Normal,
        options: IngestOptions::default(),
    })?;
    println!("task queued: {task_id}");

    // Follow the status bus until the task lands in a terminal state;
    // Ctrl-C turns into a cancel signal for the running task.
    let canceller = {
        let orchestrator = orchestrator.clone();
        let task_id = task_id.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = orchestrator.cancel(&task_id);
            }
        })
    };

    let bus = orchestrator.status_bus();
    let mut rx = bus.subscribe();
    loop {
        match rx.recv().await {
            Ok(update) if update.task_id == task_id => {
                println!(
                    "[{:>3}%] {:?} {}",
                    update.overall_progress,
                    update.current_stage,
                    update
                        .current_stage_progress
                        .processed_items
                        .zip(update.current_stage_progress.total_items)
                        .map(|(done, total)| format!("({done}/{total})"))
                        .unwrap_or_default()
                );
                if update.is_terminal() {
                    for w in &update.warnings {
                        println!("warning: {w}");
                    }
                    if let Some(cause) = &update.failure_cause {
                        println!("failed: {cause}");
                    }
                    break;
                }
            }
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
    canceller.abort();
    Ok(())
}

async fn ask(
    question: &str,
    scope: Option<&str>,
    mode: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    use hybrid_retriever::{RetrievalMode, RetrievalRequest, Retriever, RetrieverConfig};

    let cfg = AppConfig::from_env();
    let orchestrator = Orchestrator::bootstrap(cfg.clone()).await?;

    let retriever = Retriever::new(
        orchestrator.embed_service(),
        orchestrator.vector_store(),
        orchestrator.graph_store(),
        RetrieverConfig::default(),
    );

    let mode = match mode {
        Some("code") => RetrievalMode::Code,
        Some("architecture") => RetrievalMode::Architecture,
        _ => RetrievalMode::Hybrid,
    };
    let request = RetrievalRequest {
        question: question.to_string(),
        repository_scope: scope.map(|s| {
            s.split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect()
        }),
        top_k: cfg.retrieval_top_k_default,
        min_score: cfg.retrieval_min_score_default,
        mode,
    };

    let response = retriever.retrieve(&request).await?;
    println!("{}", response.answer_context);
    println!("--- citations ---");
    for c in &response.citations {
        println!(
            "{} {}:{} lines {}-{} (score {:.3})",
            c.chunk_id, c.repository_name, c.file_path, c.start_line, c.end_line, c.score
        );
    }
    println!(
        "--- diagnostics: {} vector hits, {} expansions, {} included, {}ms/{}ms/{}ms ---",
        response.diagnostics.vector_hits,
        response.diagnostics.graph_expansions,
        response.diagnostics.included_chunks,
        response.diagnostics.per_step_latency.vector_ms,
        response.diagnostics.per_step_latency.graph_ms,
        response.diagnostics.per_step_latency.assembly_ms
    );
    Ok(())
}

fn status(task_id: &str) -> Result<(), Box<dyn Error>> {
    let cfg = AppConfig::from_env();
    let bus = StatusBus::new(cfg.status_bus_endpoint);
    match bus.get(task_id) {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => {
            eprintln!("no such task: {task_id}");
            std::process::exit(1);
        }
    }
}

async fn delete(repository: &str) -> Result<(), Box<dyn Error>> {
    let cfg = AppConfig::from_env();
    let orchestrator = Orchestrator::bootstrap(cfg).await?;
    orchestrator.delete_repository(repository).await?;
    println!("repository '{repository}' deleted");
    Ok(())
}
