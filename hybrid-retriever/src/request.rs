//! Retrieval request/response contract.

use serde::{Deserialize, Serialize};

/// Longest accepted question, in characters.
pub const MAX_QUESTION_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    Code,
    #[default]
    Hybrid,
    Architecture,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub question: String,
    /// Repositories to search; `None` means all ingested repositories.
    #[serde(default)]
    pub repository_scope: Option<Vec<String>>,
    /// Candidates per repository; merged hits are re-capped at this too.
    pub top_k: u64,
    /// Hits below this cosine score are discarded.
    pub min_score: f32,
    #[serde(default)]
    pub mode: RetrievalMode,
}

impl RetrievalRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.question.trim().is_empty() {
            return Err(String::from("question must not be empty"));
        }
        if self.question.len() > MAX_QUESTION_CHARS {
            return Err(format!("question longer than {MAX_QUESTION_CHARS} chars"));
        }
        if !(1..=50).contains(&self.top_k) {
            return Err(String::from("top_k must be in 1..=50"));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(String::from("min_score must be in [0, 1]"));
        }
        if let Some(scope) = &self.repository_scope {
            if scope.is_empty() {
                return Err(String::from("repository_scope must not be an empty list"));
            }
        }
        Ok(())
    }
}

/// One cited chunk, in answer-context order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub chunk_id: String,
    pub repository_name: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub score: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepLatency {
    pub vector_ms: u64,
    pub graph_ms: u64,
    pub assembly_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub vector_hits: usize,
    pub graph_expansions: usize,
    pub included_chunks: usize,
    pub per_step_latency: StepLatency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResponse {
    /// The prompt fragment handed to the downstream LLM provider.
    pub answer_context: String,
    pub citations: Vec<Citation>,
    pub diagnostics: Diagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RetrievalRequest {
        RetrievalRequest {
            question: String::from("where is payment validated?"),
            repository_scope: Some(vec![String::from("legacy-shop")]),
            top_k: 5,
            min_score: 0.2,
            mode: RetrievalMode::Hybrid,
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn bounds_are_enforced() {
        let mut r = request();
        r.top_k = 0;
        assert!(r.validate().is_err());
        r.top_k = 51;
        assert!(r.validate().is_err());

        let mut r = request();
        r.min_score = 1.5;
        assert!(r.validate().is_err());

        let mut r = request();
        r.question = String::new();
        assert!(r.validate().is_err());
    }

    #[test]
    fn mode_parses_from_lowercase_json() {
        let r: RetrievalRequest = serde_json::from_str(
            r#"{"question": "q", "top_k": 3, "min_score": 0.1, "mode": "architecture"}"#,
        )
        .unwrap();
        assert_eq!(r.mode, RetrievalMode::Architecture);
        assert!(r.repository_scope.is_none());
    }
}
