//! Stable identifiers and content hashing.
//!
//! UUID v5 (namespace/name-based) keeps ids deterministic across machines and
//! re-ingests; the FNV-1a content hash is a cheap change marker for files.

use crate::model::{chunk::ChunkKind, span::Span};
use uuid::Uuid;

/// Compute a deterministic UUID v5 from a logical key.
#[inline]
pub fn uuid_v5_from_key(key: &str) -> String {
    Uuid::new_v5(&Uuid::nil(), key.as_bytes()).to_string()
}

/// Stable chunk id: repository + path + line span + kind.
///
/// This is the identity the vector store and the graph store share; the same
/// file text always produces the same ids.
pub fn chunk_id(repository: &str, file_path: &str, span: &Span, kind: ChunkKind) -> String {
    let key = format!(
        "chunk|{}|{}|{}-{}|{}",
        repository, file_path, span.start_line, span.end_line, kind
    );
    uuid_v5_from_key(&key)
}

/// Stable file id: repository + repo-relative path.
pub fn file_id(repository: &str, file_path: &str) -> String {
    let key = format!("file|{}|{}", repository, file_path);
    uuid_v5_from_key(&key)
}

/// FNV-1a 64-bit content hash as a lowercase hex string.
pub fn hash_content(bytes: &[u8]) -> String {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{:016x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_are_deterministic() {
        let span = Span::new(0, 120, 1, 12);
        let a = chunk_id("billing", "src/Order.java", &span, ChunkKind::Class);
        let b = chunk_id("billing", "src/Order.java", &span, ChunkKind::Class);
        assert_eq!(a, b);
    }

    #[test]
    fn chunk_ids_differ_by_kind_and_span() {
        let span = Span::new(0, 120, 1, 12);
        let a = chunk_id("billing", "src/Order.java", &span, ChunkKind::Class);
        let b = chunk_id("billing", "src/Order.java", &span, ChunkKind::Module);
        let shifted = Span::new(0, 120, 2, 12);
        let c = chunk_id("billing", "src/Order.java", &shifted, ChunkKind::Class);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fnv_hash_is_stable() {
        assert_eq!(hash_content(b""), format!("{:016x}", 0xcbf29ce484222325u64));
        assert_eq!(hash_content(b"abc"), hash_content(b"abc"));
        assert_ne!(hash_content(b"abc"), hash_content(b"abd"));
    }
}
