//! Neo4j-backed graph store for repository structure and framework patterns.
//!
//! A facade in front of `neo4rs` that owns the schema (uniqueness
//! constraints created once at startup), the MERGE-based write path, and the
//! bounded read queries the retriever and validator use. No other crate
//! talks to Neo4j directly.

mod errors;
mod model;
mod read;
mod write;

pub use errors::GraphStoreError;
pub use model::{FlowEntry, GraphNeighbor, RelKind, RepositoryNode, RepositoryStats};

use chunk_prep::{CodeChunk, FileMeta};
use legacy_patterns::PatternSet;
use neo4rs::{Graph, query};
use tracing::{debug, info};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct GraphStoreConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            uri: String::from("bolt://127.0.0.1:7687"),
            user: String::from("neo4j"),
            password: String::from("neo4j"),
        }
    }
}

/// Uniqueness constraints; the schema migration boundary of the system.
const CONSTRAINTS: &[&str] = &[
    "CREATE CONSTRAINT repository_name IF NOT EXISTS FOR (r:Repository) REQUIRE r.name IS UNIQUE",
    "CREATE CONSTRAINT file_id IF NOT EXISTS FOR (f:File) REQUIRE f.id IS UNIQUE",
    "CREATE CONSTRAINT chunk_id IF NOT EXISTS FOR (c:CodeChunk) REQUIRE c.id IS UNIQUE",
    "CREATE CONSTRAINT struts_action_key IF NOT EXISTS FOR (a:StrutsAction) REQUIRE a.key IS UNIQUE",
    "CREATE CONSTRAINT jsp_component_key IF NOT EXISTS FOR (j:JspComponent) REQUIRE j.key IS UNIQUE",
    "CREATE CONSTRAINT corba_interface_key IF NOT EXISTS FOR (i:CorbaInterface) REQUIRE i.key IS UNIQUE",
    "CREATE CONSTRAINT business_rule_id IF NOT EXISTS FOR (b:BusinessRule) REQUIRE b.id IS UNIQUE",
    "CREATE CONSTRAINT maven_coordinates IF NOT EXISTS FOR (m:MavenArtifact) REQUIRE m.coordinates IS UNIQUE",
];

pub struct GraphStore {
    graph: Graph,
}

impl GraphStore {
    pub async fn connect(cfg: GraphStoreConfig) -> Result<Self, GraphStoreError> {
        if cfg.uri.trim().is_empty() {
            return Err(GraphStoreError::Config(String::from("empty endpoint uri")));
        }
        let graph = Graph::new(&cfg.uri, &cfg.user, &cfg.password).await?;
        Ok(Self { graph })
    }

    /// Create constraints once at startup. Safe to re-run.
    pub async fn ensure_schema(&self) -> Result<(), GraphStoreError> {
        for c in CONSTRAINTS {
            self.graph.run(query(c)).await?;
        }
        info!("graph: schema constraints in place");
        Ok(())
    }

    /// Create or refresh the Repository node. Must run before any of the
    /// repository's files or chunks are written.
    pub async fn upsert_repository(&self, repo: &RepositoryNode) -> Result<(), GraphStoreError> {
        self.graph.run(write::upsert_repository_query(repo)).await?;
        debug!("graph: repository '{}' upserted", repo.name);
        Ok(())
    }

    pub async fn update_repository_stats(
        &self,
        name: &str,
        stats: &RepositoryStats,
    ) -> Result<(), GraphStoreError> {
        self.graph.run(write::update_stats_query(name, stats)).await?;
        Ok(())
    }

    /// Upsert File nodes and their `CONTAINS` edges in bounded transactions.
    pub async fn upsert_files(
        &self,
        repository: &str,
        files: &[FileMeta],
    ) -> Result<(), GraphStoreError> {
        let queries = write::upsert_file_queries(repository, files);
        debug!("graph: writing {} file nodes", queries.len());
        write::run_batched(&self.graph, queries).await
    }

    /// Upsert CodeChunk nodes and `HAS_CHUNK` edges.
    pub async fn upsert_chunks(&self, chunks: &[CodeChunk]) -> Result<(), GraphStoreError> {
        let queries = write::upsert_chunk_queries(chunks);
        debug!("graph: writing {} chunk nodes", queries.len());
        write::run_batched(&self.graph, queries).await
    }

    /// Upsert framework-pattern nodes and their relationships.
    pub async fn upsert_patterns(
        &self,
        repository: &str,
        set: &PatternSet,
    ) -> Result<(), GraphStoreError> {
        if set.is_empty() {
            return Ok(());
        }
        let queries = write::upsert_pattern_queries(repository, set);
        debug!("graph: writing {} pattern statements", queries.len());
        write::run_batched(&self.graph, queries).await
    }

    /// Whitelisted ad-hoc link between two existing nodes.
    pub async fn link(
        &self,
        src: (&str, &str, &str),
        rel: RelKind,
        dst: (&str, &str, &str),
    ) -> Result<(), GraphStoreError> {
        let q = write::link_query(src.0, src.1, src.2, rel, dst.0, dst.1, dst.2);
        self.graph.run(q).await?;
        Ok(())
    }

    /// Cascade delete of everything belonging to a repository.
    pub async fn delete_repository(&self, name: &str) -> Result<(), GraphStoreError> {
        write::delete_repository(&self.graph, name).await
    }

    /// Neighbors within `hops` of a chunk along the relationship whitelist.
    pub async fn expand_chunk(
        &self,
        chunk_id: &str,
        hops: u8,
        limit: usize,
    ) -> Result<Vec<GraphNeighbor>, GraphStoreError> {
        read::expand_chunk(&self.graph, chunk_id, hops, limit).await
    }

    /// Struts action flows for one repository (architecture mode).
    pub async fn flow_summary(&self, repository: &str) -> Result<Vec<FlowEntry>, GraphStoreError> {
        read::flow_summary(&self.graph, repository).await
    }

    pub async fn list_repositories(&self) -> Result<Vec<String>, GraphStoreError> {
        read::list_repositories(&self.graph).await
    }

    /// CodeChunk node count for one repository (parity validation).
    pub async fn chunk_count(&self, repository: &str) -> Result<u64, GraphStoreError> {
        read::count_scalar(
            &self.graph,
            query("MATCH (c:CodeChunk {repository_name: $repo}) RETURN count(c) AS n")
                .param("repo", repository.to_string()),
        )
        .await
    }

    /// All relationships touching the repository's nodes (idempotency checks).
    pub async fn relationship_count(&self, repository: &str) -> Result<u64, GraphStoreError> {
        read::count_scalar(
            &self.graph,
            query(
                "MATCH (s)-[r]->() WHERE s.repository_name = $repo OR s.name = $repo \
                 RETURN count(r) AS n",
            )
            .param("repo", repository.to_string()),
        )
        .await
    }
}
