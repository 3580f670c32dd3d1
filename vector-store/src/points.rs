//! Mapping between chunk records and Qdrant points.
//!
//! Payloads are flat maps of scalars so every field stays filterable; the
//! JSON <-> protobuf conversion mirrors what the chunk metadata round-trip
//! tests pin down.

use crate::errors::VectorStoreError;
use chunk_prep::CodeChunk;
use qdrant_client::qdrant::{
    PointId, PointStruct, Value as QValue, Vector, Vectors, point_id, value, vectors,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata persisted next to every vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub repository_name: String,
    pub file_path: String,
    pub language: String,
    pub kind: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default)]
    pub business_domain: Option<String>,
    #[serde(default)]
    pub framework_pattern: Option<String>,
    #[serde(default)]
    pub migration_complexity: Option<String>,
    pub importance_score: f32,
    #[serde(default)]
    pub embedding_failed: bool,
    /// Embedding model identifier.
    pub model: String,
}

impl ChunkMeta {
    pub fn from_chunk(chunk: &CodeChunk, model: &str, embedding_failed: bool) -> Self {
        Self {
            repository_name: chunk.repository.clone(),
            file_path: chunk.file_path.clone(),
            language: chunk.language.to_string(),
            kind: chunk.kind.to_string(),
            start_line: chunk.span.start_line,
            end_line: chunk.span.end_line,
            business_domain: chunk.business_domain.clone(),
            framework_pattern: chunk.framework_pattern.clone(),
            migration_complexity: chunk.migration_complexity.map(|c| c.to_string()),
            importance_score: chunk.importance,
            embedding_failed,
            model: model.to_string(),
        }
    }
}

/// One upsert item: id, vector, text, metadata.
#[derive(Debug, Clone)]
pub struct ChunkPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub meta: ChunkMeta,
}

impl ChunkPoint {
    pub fn from_chunk(
        chunk: &CodeChunk,
        vector: Vec<f32>,
        model: &str,
        embedding_failed: bool,
    ) -> Self {
        Self {
            id: chunk.id.clone(),
            vector,
            text: chunk.text.clone(),
            meta: ChunkMeta::from_chunk(chunk, model, embedding_failed),
        }
    }
}

/// A search or lookup hit.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub meta: ChunkMeta,
    /// Present only when the caller asked for vectors (id lookups).
    pub vector: Option<Vec<f32>>,
}

pub(crate) fn to_point(item: &ChunkPoint) -> Result<PointStruct, VectorStoreError> {
    let meta_json = serde_json::to_value(&item.meta)
        .map_err(|e| VectorStoreError::Payload(format!("serialize meta: {e}")))?;

    let mut payload: HashMap<String, QValue> = HashMap::new();
    payload.insert("text".into(), json_to_qvalue(serde_json::Value::String(item.text.clone())));
    if let serde_json::Value::Object(map) = meta_json {
        for (k, v) in map {
            if v.is_null() {
                continue; // optional tags stay absent, not null
            }
            payload.insert(k, json_to_qvalue(v));
        }
    }

    let vectors = Vectors {
        vectors_options: Some(vectors::VectorsOptions::Vector(Vector {
            data: item.vector.clone(),
            ..Default::default()
        })),
    };

    Ok(PointStruct {
        id: Some(point_id_for(&item.id)),
        payload,
        vectors: Some(vectors),
        ..Default::default()
    })
}

pub(crate) fn point_id_for(id: &str) -> PointId {
    let options = match id.parse::<u64>() {
        Ok(n) => point_id::PointIdOptions::Num(n),
        Err(_) => point_id::PointIdOptions::Uuid(id.to_string()),
    };
    PointId {
        point_id_options: Some(options),
    }
}

pub(crate) fn id_to_string(id: Option<&PointId>) -> String {
    match id.and_then(|p| p.point_id_options.as_ref()) {
        Some(point_id::PointIdOptions::Num(n)) => n.to_string(),
        Some(point_id::PointIdOptions::Uuid(u)) => u.clone(),
        None => String::new(),
    }
}

/// Rebuild `(text, meta)` from a payload map.
pub(crate) fn payload_to_parts(
    payload: HashMap<String, QValue>,
) -> Result<(String, ChunkMeta), VectorStoreError> {
    let json = qpayload_to_json(payload);
    let text = json
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let meta: ChunkMeta = serde_json::from_value(json)
        .map_err(|e| VectorStoreError::Payload(format!("deserialize meta: {e}")))?;
    Ok((text, meta))
}

/// Converts a Qdrant payload map into JSON. Nested kinds we never write map
/// to `Null`.
fn qpayload_to_json(mut p: HashMap<String, QValue>) -> serde_json::Value {
    use qdrant_client::qdrant::value::Kind as K;
    let mut m = serde_json::Map::new();
    for (k, v) in p.drain() {
        let j = match v.kind {
            Some(K::StringValue(s)) => serde_json::Value::String(s),
            Some(K::IntegerValue(i)) => serde_json::Value::Number(i.into()),
            Some(K::DoubleValue(f)) => serde_json::json!(f),
            Some(K::BoolValue(b)) => serde_json::Value::Bool(b),
            _ => serde_json::Value::Null,
        };
        m.insert(k, j);
    }
    serde_json::Value::Object(m)
}

/// Converts `serde_json::Value` into `qdrant::Value`. Arrays/objects never
/// occur in our flat payloads; they stringify defensively.
fn json_to_qvalue(v: serde_json::Value) -> QValue {
    use serde_json::Value as J;
    use value::Kind as K;

    match v {
        J::String(s) => QValue {
            kind: Some(K::StringValue(s)),
        },
        J::Number(n) => {
            if let Some(i) = n.as_i64() {
                QValue {
                    kind: Some(K::IntegerValue(i)),
                }
            } else if let Some(f) = n.as_f64() {
                QValue {
                    kind: Some(K::DoubleValue(f)),
                }
            } else {
                QValue {
                    kind: Some(K::StringValue(n.to_string())),
                }
            }
        }
        J::Bool(b) => QValue {
            kind: Some(K::BoolValue(b)),
        },
        other => QValue {
            kind: Some(K::StringValue(other.to_string())),
        },
    }
}

/// `chunks__<repository>` with characters Qdrant accepts.
pub fn collection_name(repository: &str) -> String {
    let safe: String = repository
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("chunks__{safe}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk_prep::{ChunkKind, LanguageKind, MigrationComplexity, Span};

    fn sample_chunk() -> CodeChunk {
        CodeChunk {
            id: String::from("3f2b8c1a-aaaa-5bbb-8ccc-111122223333"),
            repository: String::from("legacy-shop"),
            file_path: String::from("src/OrderAction.java"),
            language: LanguageKind::Java,
            kind: ChunkKind::Class,
            name: String::from("OrderAction"),
            text: String::from("public class OrderAction extends Action { }"),
            span: Span::new(0, 43, 3, 9),
            importance: 0.9,
            business_domain: Some(String::from("ordering")),
            framework_pattern: Some(String::from("struts_action")),
            migration_complexity: Some(MigrationComplexity::Medium),
        }
    }

    #[test]
    fn metadata_round_trips_through_payload() {
        let chunk = sample_chunk();
        let point = ChunkPoint::from_chunk(&chunk, vec![0.1, 0.2, 0.3], "nomic-embed-text", false);
        let proto = to_point(&point).unwrap();

        let (text, meta) = payload_to_parts(proto.payload).unwrap();
        assert_eq!(text, chunk.text);
        assert_eq!(meta, point.meta);
        assert_eq!(meta.start_line, 3);
        assert_eq!(meta.migration_complexity.as_deref(), Some("medium"));
    }

    #[test]
    fn optional_tags_are_omitted_not_null() {
        let mut chunk = sample_chunk();
        chunk.business_domain = None;
        chunk.framework_pattern = None;
        chunk.migration_complexity = None;
        let proto = to_point(&ChunkPoint::from_chunk(&chunk, vec![0.1, 0.2, 0.3], "m", false)).unwrap();
        assert!(!proto.payload.contains_key("business_domain"));

        let (_, meta) = payload_to_parts(proto.payload).unwrap();
        assert_eq!(meta.business_domain, None);
    }

    #[test]
    fn uuid_ids_stay_uuids_numeric_ids_stay_numeric() {
        assert!(matches!(
            point_id_for("42").point_id_options,
            Some(point_id::PointIdOptions::Num(42))
        ));
        let uuid = point_id_for("3f2b8c1a-aaaa-5bbb-8ccc-111122223333");
        assert!(matches!(
            uuid.point_id_options,
            Some(point_id::PointIdOptions::Uuid(_))
        ));
    }

    #[test]
    fn collection_names_are_sanitized() {
        assert_eq!(collection_name("legacy-shop"), "chunks__legacy-shop");
        assert_eq!(collection_name("a b/c"), "chunks__a_b_c");
    }
}
