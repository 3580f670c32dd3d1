//! Thin facade around `qdrant-client` for per-repository chunk collections.
//!
//! All Qdrant interaction is concentrated here, hiding the verbose builder
//! API from the rest of the pipeline. One collection per repository, named
//! `chunks__<repository>`; all vectors in a collection share the declared
//! dimension.
//!
//! Dimension policy: [`VectorStore::ensure_collection`] drops and recreates a
//! collection whose declared dimension differs from the deployment's. That is
//! destructive and logged as such; the caller decides whether a recurrence is
//! fatal.

mod errors;
mod filters;
mod points;

pub use errors::VectorStoreError;
pub use filters::SearchFilter;
pub use points::{ChunkMeta, ChunkPoint, ScoredChunk, collection_name};

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, GetPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder, vectors_config,
};
use tracing::{debug, info, warn};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub url: String,
    pub api_key: Option<String>,
    /// Upsert batch size (points per request).
    pub upsert_batch: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://127.0.0.1:6334"),
            api_key: None,
            upsert_batch: 256,
        }
    }
}

/// What `ensure_collection` had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    Exists,
    /// The collection existed with another dimension and was dropped and
    /// recreated. Destructive; previous vectors are gone.
    Recreated { previous_dim: u64 },
}

pub struct VectorStore {
    client: Qdrant,
    cfg: VectorStoreConfig,
}

impl VectorStore {
    pub fn connect(cfg: VectorStoreConfig) -> Result<Self, VectorStoreError> {
        if cfg.url.trim().is_empty() {
            return Err(VectorStoreError::Config(String::from("empty endpoint url")));
        }
        let mut builder = Qdrant::from_url(&cfg.url);
        if let Some(key) = &cfg.api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| VectorStoreError::Qdrant(e.to_string()))?;
        Ok(Self { client, cfg })
    }

    /// Ensure `name` exists with dimension `dim` (cosine distance).
    ///
    /// Same-dimension collections are left untouched so re-ingests converge
    /// without churn; a dimension mismatch drops and recreates.
    pub async fn ensure_collection(
        &self,
        name: &str,
        dim: u64,
    ) -> Result<EnsureOutcome, VectorStoreError> {
        match self.declared_dimension(name).await? {
            None => {
                self.create(name, dim).await?;
                info!("vector: created collection '{}' dim={}", name, dim);
                Ok(EnsureOutcome::Created)
            }
            Some(existing) if existing == dim => {
                debug!("vector: collection '{}' already at dim={}", name, dim);
                Ok(EnsureOutcome::Exists)
            }
            Some(existing) => {
                warn!(
                    "vector: DESTRUCTIVE recreate of '{}': dimension {} -> {}",
                    name, existing, dim
                );
                self.drop_collection(name).await?;
                self.create(name, dim).await?;
                Ok(EnsureOutcome::Recreated {
                    previous_dim: existing,
                })
            }
        }
    }

    /// Upsert points in bounded batches. Idempotent by id.
    pub async fn upsert_chunks(
        &self,
        name: &str,
        items: &[ChunkPoint],
    ) -> Result<u64, VectorStoreError> {
        if items.is_empty() {
            return Ok(0);
        }
        let mut total = 0u64;
        for batch in items.chunks(self.cfg.upsert_batch.max(1)) {
            let points = batch
                .iter()
                .map(points::to_point)
                .collect::<Result<Vec<_>, _>>()?;
            debug!("vector: upserting {} points into '{}'", points.len(), name);
            self.client
                .upsert_points(UpsertPointsBuilder::new(name, points).wait(true))
                .await
                .map_err(|e| VectorStoreError::Qdrant(e.to_string()))?;
            total += batch.len() as u64;
        }
        info!("vector: upserted {} points into '{}'", total, name);
        Ok(total)
    }

    /// Similarity search; hits sorted by score descending.
    pub async fn search(
        &self,
        name: &str,
        vector: Vec<f32>,
        k: u64,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let mut builder = SearchPointsBuilder::new(name, vector, k).with_payload(true);
        if let Some(f) = filter.filter(|f| !f.is_empty()) {
            builder = builder.filter(filters::to_qdrant_filter(f));
        }

        let res = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| VectorStoreError::Qdrant(e.to_string()))?;

        let mut out = Vec::with_capacity(res.result.len());
        for hit in res.result {
            let id = points::id_to_string(hit.id.as_ref());
            let (text, meta) = points::payload_to_parts(hit.payload)?;
            out.push(ScoredChunk {
                id,
                score: hit.score,
                text,
                meta,
                vector: None,
            });
        }
        debug!("vector: search '{}' returned {} hits", name, out.len());
        Ok(out)
    }

    /// Fetch points by id with vectors, for validation and round-trip checks.
    pub async fn get_by_ids(
        &self,
        name: &str,
        ids: &[String],
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let point_ids = ids.iter().map(|i| points::point_id_for(i)).collect::<Vec<_>>();
        let res = self
            .client
            .get_points(
                GetPointsBuilder::new(name, point_ids)
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(|e| VectorStoreError::Qdrant(e.to_string()))?;

        let mut out = Vec::with_capacity(res.result.len());
        for p in res.result {
            let id = points::id_to_string(p.id.as_ref());
            let (text, meta) = points::payload_to_parts(p.payload)?;
            let vector = p.vectors.and_then(|v| match v.vectors_options {
                Some(qdrant_client::qdrant::vectors_output::VectorsOptions::Vector(vec)) => {
                    Some(vec.data)
                }
                _ => None,
            });
            out.push(ScoredChunk {
                id,
                score: 1.0,
                text,
                meta,
                vector,
            });
        }
        Ok(out)
    }

    /// Exact point count for cross-store parity checks.
    pub async fn count(&self, name: &str) -> Result<u64, VectorStoreError> {
        let res = self
            .client
            .count(CountPointsBuilder::new(name).exact(true))
            .await
            .map_err(|e| VectorStoreError::Qdrant(e.to_string()))?;
        Ok(res.result.map(|r| r.count).unwrap_or(0))
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool, VectorStoreError> {
        self.client
            .collection_exists(name)
            .await
            .map_err(|e| VectorStoreError::Qdrant(e.to_string()))
    }

    /// Remove all data for a repository.
    pub async fn drop_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        info!("vector: dropping collection '{}'", name);
        self.client
            .delete_collection(name)
            .await
            .map_err(|e| VectorStoreError::Qdrant(e.to_string()))?;
        Ok(())
    }

    async fn create(&self, name: &str, dim: u64) -> Result<(), VectorStoreError> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dim, Distance::Cosine)),
            )
            .await
            .map_err(|e| VectorStoreError::Qdrant(e.to_string()))?;
        Ok(())
    }

    /// Declared vector dimension of `name`, or `None` if it does not exist.
    async fn declared_dimension(&self, name: &str) -> Result<Option<u64>, VectorStoreError> {
        if !self.collection_exists(name).await? {
            return Ok(None);
        }
        let info = self
            .client
            .collection_info(name)
            .await
            .map_err(|e| VectorStoreError::Qdrant(e.to_string()))?;

        let dim = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|c| match c {
                vectors_config::Config::Params(params) => Some(params.size),
                _ => None,
            });
        Ok(dim)
    }
}
