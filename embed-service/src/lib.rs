//! Embedding service: provider trait, batching, and failure isolation.
//!
//! The provider is a capability set (`embed one text`, fixed dimension);
//! [`EmbedService`] adds the pipeline semantics on top: bounded mini-batches,
//! retry-with-batch-size-1 on failure, zero-vector substitution for chunks
//! that persistently fail, and a warm-up/readiness self-check gating task
//! admission.

mod errors;
pub mod hash_embedder;
pub mod ollama;

pub use errors::EmbedError;
pub use hash_embedder::HashEmbedder;
pub use ollama::{OllamaConfig, OllamaEmbedder};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Capability set every embedding backend implements.
pub trait EmbeddingsProvider: Send + Sync {
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, EmbedError>> + Send + 'a>>;

    /// Fixed output dimension, decided at initialization.
    fn dimension(&self) -> usize;

    /// Identifier recorded alongside every vector.
    fn model_id(&self) -> &str;
}

/// One embedded chunk; `failed` marks zero-vector substitutions.
#[derive(Debug, Clone)]
pub struct EmbeddedVector {
    pub vector: Vec<f32>,
    pub failed: bool,
}

/// Process-wide embedding front end. Callers serialize through a bounded
/// concurrency gate so a single slow model cannot be oversubscribed.
pub struct EmbedService {
    provider: Arc<dyn EmbeddingsProvider>,
    batch_size: usize,
    gate: Semaphore,
    warm: AtomicBool,
}

impl EmbedService {
    pub fn new(provider: Arc<dyn EmbeddingsProvider>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            provider,
            batch_size,
            gate: Semaphore::new(batch_size),
            warm: AtomicBool::new(false),
        }
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    /// True once the model has answered a self-check with the right
    /// dimension. Ingest admission requires this.
    pub fn is_ready(&self) -> bool {
        self.warm.load(Ordering::Relaxed)
    }

    /// Run the readiness self-check once.
    pub async fn ready(&self) -> bool {
        if self.is_ready() {
            return true;
        }
        match self.provider.embed("warm-up self check").await {
            Ok(v) if v.len() == self.provider.dimension() => {
                self.warm.store(true, Ordering::Relaxed);
                true
            }
            Ok(v) => {
                warn!(
                    "embed: self-check returned dimension {} (expected {})",
                    v.len(),
                    self.provider.dimension()
                );
                false
            }
            Err(e) => {
                debug!("embed: self-check failed: {e}");
                false
            }
        }
    }

    /// Poll the self-check until it passes or the warm-up window closes.
    /// First model load can be slow, hence the dedicated (longer) timeout.
    pub async fn warm_up(&self, window: Duration) -> Result<(), EmbedError> {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            if self.ready().await {
                info!(
                    "embed: model '{}' ready, dim={}",
                    self.provider.model_id(),
                    self.provider.dimension()
                );
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(EmbedError::WarmUpTimeout(window));
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    /// Embed `texts`, length-preserving, never failing the batch.
    ///
    /// Mini-batches of `batch_size` run concurrently; a failed item is
    /// retried once on its own, and a second failure substitutes a zero
    /// vector with `failed = true` so the pipeline continues.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<EmbeddedVector> {
        let dim = self.provider.dimension();
        let mut out = Vec::with_capacity(texts.len());

        for (batch_no, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!("embed: batch {} ({} items)", batch_no, batch.len());
            let futures = batch.iter().map(|text| self.embed_one(text, dim));
            let mut results = futures::future::join_all(futures).await;
            out.append(&mut results);
            // Yield between batches so status updates stay responsive.
            tokio::task::yield_now().await;
        }

        out
    }

    async fn embed_one(&self, text: &str, dim: usize) -> EmbeddedVector {
        // The gate bounds in-flight requests against the shared model.
        // acquire() only fails on a closed semaphore, which never happens here.
        let _permit = self.gate.acquire().await.ok();

        match self.try_embed(text, dim).await {
            Ok(vector) => EmbeddedVector {
                vector,
                failed: false,
            },
            Err(first) => {
                debug!("embed: retrying failed item: {first}");
                match self.try_embed(text, dim).await {
                    Ok(vector) => EmbeddedVector {
                        vector,
                        failed: false,
                    },
                    Err(second) => {
                        warn!("embed: substituting zero vector after retry: {second}");
                        EmbeddedVector {
                            vector: vec![0.0; dim],
                            failed: true,
                        }
                    }
                }
            }
        }
    }

    async fn try_embed(&self, text: &str, dim: usize) -> Result<Vec<f32>, EmbedError> {
        let v = self.provider.embed(text).await?;
        if v.len() != dim {
            return Err(EmbedError::VectorSizeMismatch {
                got: v.len(),
                want: dim,
            });
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Fails the first `fail_first` calls, then succeeds.
    struct FlakyProvider {
        dim: usize,
        fail_first: usize,
        calls: AtomicUsize,
    }

    impl EmbeddingsProvider for FlakyProvider {
        fn embed<'a>(
            &'a self,
            _text: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, EmbedError>> + Send + 'a>> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n < self.fail_first {
                    Err(EmbedError::Provider(String::from("transient")))
                } else {
                    Ok(vec![0.5; self.dim])
                }
            })
        }

        fn dimension(&self) -> usize {
            self.dim
        }

        fn model_id(&self) -> &str {
            "flaky-test"
        }
    }

    #[tokio::test]
    async fn output_is_length_preserving() {
        let svc = EmbedService::new(
            Arc::new(FlakyProvider {
                dim: 4,
                fail_first: 0,
                calls: AtomicUsize::new(0),
            }),
            2,
        );
        let texts: Vec<String> = (0..5).map(|i| format!("text {i}")).collect();
        let out = svc.embed_batch(&texts).await;
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|v| v.vector.len() == 4 && !v.failed));
    }

    #[tokio::test]
    async fn transient_failure_recovers_on_retry() {
        let svc = EmbedService::new(
            Arc::new(FlakyProvider {
                dim: 4,
                fail_first: 1,
                calls: AtomicUsize::new(0),
            }),
            8,
        );
        let out = svc.embed_batch(&[String::from("only")]).await;
        assert_eq!(out.len(), 1);
        assert!(!out[0].failed);
    }

    #[tokio::test]
    async fn persistent_failure_becomes_zero_vector() {
        let svc = EmbedService::new(
            Arc::new(FlakyProvider {
                dim: 3,
                fail_first: usize::MAX,
                calls: AtomicUsize::new(0),
            }),
            8,
        );
        let out = svc.embed_batch(&[String::from("doomed")]).await;
        assert!(out[0].failed);
        assert_eq!(out[0].vector, vec![0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn readiness_flips_after_self_check() {
        let svc = EmbedService::new(
            Arc::new(FlakyProvider {
                dim: 4,
                fail_first: 0,
                calls: AtomicUsize::new(0),
            }),
            8,
        );
        assert!(!svc.is_ready());
        assert!(svc.ready().await);
        assert!(svc.is_ready());
    }
}
