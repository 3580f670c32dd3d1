//! Hybrid retrieval: vector search scoped by repository, bounded graph
//! expansion, and token-budgeted context assembly.
//!
//! The retrieval path is fully deterministic — identical stores and
//! identical parameters return identical citations in identical order. The
//! LLM itself stays behind an external `generate(prompt)` contract; this
//! crate only produces the prompt fragment and its citations.

mod assemble;
mod request;

pub use request::{
    Citation, Diagnostics, MAX_QUESTION_CHARS, RetrievalMode, RetrievalRequest,
    RetrievalResponse, StepLatency,
};

use embed_service::EmbedService;
use graph_store::{FlowEntry, GraphNeighbor, GraphStore};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use vector_store::{ScoredChunk, VectorStore, collection_name};

#[derive(Error, Debug)]
pub enum RetrieveError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("graph store error: {0}")]
    GraphStore(String),
}

/// Retrieval knobs with service-level defaults.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Token budget for the assembled context.
    pub context_token_budget: usize,
    /// Neighbors fetched per hit during expansion.
    pub expansion_limit: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            context_token_budget: 3000,
            expansion_limit: 8,
        }
    }
}

pub struct Retriever {
    embed: Arc<EmbedService>,
    vectors: Arc<VectorStore>,
    graph: Arc<GraphStore>,
    cfg: RetrieverConfig,
}

impl Retriever {
    pub fn new(
        embed: Arc<EmbedService>,
        vectors: Arc<VectorStore>,
        graph: Arc<GraphStore>,
        cfg: RetrieverConfig,
    ) -> Self {
        Self {
            embed,
            vectors,
            graph,
            cfg,
        }
    }

    /// Answer a retrieval request: vector step, graph step, assembly.
    pub async fn retrieve(
        &self,
        req: &RetrievalRequest,
    ) -> Result<RetrievalResponse, RetrieveError> {
        req.validate().map_err(RetrieveError::InvalidRequest)?;

        // -- Vector step
        let vector_started = Instant::now();
        let question_vec = self.embed_question(&req.question).await?;
        let scope = self.resolve_scope(req).await?;
        let mut hits = self.search_scope(&scope, question_vec, req).await?;
        let vector_hits = hits.len();
        assemble::rank_hits(&mut hits);
        hits.truncate(req.top_k as usize);
        let vector_ms = vector_started.elapsed().as_millis() as u64;
        debug!("retrieve: {} hits after rank/cap", hits.len());

        // -- Graph step
        let graph_started = Instant::now();
        let (neighbors, flows, graph_expansions) = match req.mode {
            RetrievalMode::Code => (Vec::new(), Vec::new(), 0),
            RetrievalMode::Hybrid => {
                let n = self.expand_hits(&hits, 1).await;
                let count = n.iter().map(|(_, v)| v.len()).sum();
                (n, Vec::new(), count)
            }
            RetrievalMode::Architecture => {
                let n = self.expand_hits(&hits, 2).await;
                let count = n.iter().map(|(_, v)| v.len()).sum();
                let flows = self.collect_flows(&scope).await;
                (n, flows, count)
            }
        };
        let graph_ms = graph_started.elapsed().as_millis() as u64;

        // -- Assembly
        let assembly_started = Instant::now();
        let (answer_context, citations) = assemble::assemble(
            &hits,
            &neighbors,
            &flows,
            self.cfg.context_token_budget,
        );
        let assembly_ms = assembly_started.elapsed().as_millis() as u64;

        info!(
            "retrieve: {} citations from {} vector hits ({} expansions)",
            citations.len(),
            vector_hits,
            graph_expansions
        );

        Ok(RetrievalResponse {
            answer_context,
            diagnostics: Diagnostics {
                vector_hits,
                graph_expansions,
                included_chunks: citations.len(),
                per_step_latency: StepLatency {
                    vector_ms,
                    graph_ms,
                    assembly_ms,
                },
            },
            citations,
        })
    }

    async fn embed_question(&self, question: &str) -> Result<Vec<f32>, RetrieveError> {
        let embedded = self.embed.embed_batch(&[question.to_string()]).await;
        match embedded.into_iter().next() {
            Some(v) if !v.failed => Ok(v.vector),
            _ => Err(RetrieveError::Embedding(String::from(
                "question embedding failed",
            ))),
        }
    }

    /// Explicit scope, or every ingested repository. Sorted either way so
    /// the merge order is stable.
    async fn resolve_scope(&self, req: &RetrievalRequest) -> Result<Vec<String>, RetrieveError> {
        let mut scope = match &req.repository_scope {
            Some(s) => s.clone(),
            None => self
                .graph
                .list_repositories()
                .await
                .map_err(|e| RetrieveError::GraphStore(e.to_string()))?,
        };
        scope.sort();
        scope.dedup();
        Ok(scope)
    }

    async fn search_scope(
        &self,
        scope: &[String],
        question_vec: Vec<f32>,
        req: &RetrievalRequest,
    ) -> Result<Vec<ScoredChunk>, RetrieveError> {
        let mut hits = Vec::new();
        for repo in scope {
            let collection = collection_name(repo);
            let exists = self
                .vectors
                .collection_exists(&collection)
                .await
                .map_err(|e| RetrieveError::VectorStore(e.to_string()))?;
            if !exists {
                debug!("retrieve: no collection for '{}', skipping", repo);
                continue;
            }
            let repo_hits = self
                .vectors
                .search(&collection, question_vec.clone(), req.top_k, None)
                .await
                .map_err(|e| RetrieveError::VectorStore(e.to_string()))?;
            hits.extend(
                repo_hits
                    .into_iter()
                    .filter(|h| h.score >= req.min_score),
            );
        }
        Ok(hits)
    }

    /// One expansion per retained hit; graph hiccups degrade to empty
    /// neighbor lists rather than failing retrieval.
    async fn expand_hits(
        &self,
        hits: &[ScoredChunk],
        hops: u8,
    ) -> Vec<(String, Vec<GraphNeighbor>)> {
        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            match self
                .graph
                .expand_chunk(&hit.id, hops, self.cfg.expansion_limit)
                .await
            {
                Ok(neighbors) => out.push((hit.id.clone(), neighbors)),
                Err(e) => {
                    warn!("retrieve: expansion failed for {}: {}", hit.id, e);
                    out.push((hit.id.clone(), Vec::new()));
                }
            }
        }
        out
    }

    async fn collect_flows(&self, scope: &[String]) -> Vec<(String, Vec<FlowEntry>)> {
        let mut out = Vec::with_capacity(scope.len());
        for repo in scope {
            match self.graph.flow_summary(repo).await {
                Ok(flows) => out.push((repo.clone(), flows)),
                Err(e) => {
                    warn!("retrieve: flow summary failed for {}: {}", repo, e);
                    out.push((repo.clone(), Vec::new()));
                }
            }
        }
        out
    }
}
