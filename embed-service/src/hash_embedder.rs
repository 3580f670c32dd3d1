//! Deterministic hash-based embedder.
//!
//! Stands in for a model server in tests and offline runs: token hashes are
//! folded into a fixed-dimension vector and L2-normalized. The same text
//! always yields the same vector, which keeps retrieval tests reproducible.

use crate::{EmbedError, EmbeddingsProvider};
use std::future::Future;
use std::pin::Pin;

#[derive(Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            let h = fnv(token.to_lowercase().as_bytes());
            let slot = (h as usize) % self.dim;
            // Alternate sign by a second hash bit to avoid all-positive vectors.
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[slot] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

impl EmbeddingsProvider for HashEmbedder {
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, EmbedError>> + Send + 'a>> {
        let v = self.encode(text);
        Box::pin(async move { Ok(v) })
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        "hash-embedder"
    }
}

fn fnv(bytes: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_same_vector() {
        let e = HashEmbedder::new(64);
        let a = e.embed("payment validation rules").await.unwrap();
        let b = e.embed("payment validation rules").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn vectors_are_normalized() {
        let e = HashEmbedder::new(32);
        let v = e.embed("order checkout flow").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn different_text_differs() {
        let e = HashEmbedder::new(64);
        let a = e.embed("payments").await.unwrap();
        let b = e.embed("inventory stock levels").await.unwrap();
        assert_ne!(a, b);
    }
}
