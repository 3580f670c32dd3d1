//! The chunk record: the unit of embedding, storage, and retrieval.

use crate::model::{language::LanguageKind, span::Span};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Semantic kind of a chunk. Keep the set stable: the serialized form is
/// persisted in vector-store payloads and graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Function,
    Class,
    Method,
    Module,
    JspScriptlet,
    XmlBlock,
    RawText,
}

impl Display for ChunkKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use ChunkKind::*;
        let s = match self {
            Function => "function",
            Class => "class",
            Method => "method",
            Module => "module",
            JspScriptlet => "jsp_scriptlet",
            XmlBlock => "xml_block",
            RawText => "raw_text",
        };
        f.write_str(s)
    }
}

/// Ordinal migration effort attached to framework findings and propagated to
/// the chunks they originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationComplexity {
    Low,
    Medium,
    High,
}

impl Display for MigrationComplexity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MigrationComplexity::Low => "low",
            MigrationComplexity::Medium => "medium",
            MigrationComplexity::High => "high",
        };
        f.write_str(s)
    }
}

/// A contiguous code fragment with a stable identity.
///
/// The id is a UUIDv5 over `(repository, file_path, start_line, end_line, kind)`,
/// so re-parsing the same file text always yields the same ids and upserts
/// converge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    pub id: String,
    pub repository: String,
    /// Repo-relative path with forward slashes.
    pub file_path: String,
    pub language: LanguageKind,
    pub kind: ChunkKind,
    /// Symbol name where one exists, otherwise a derived label
    /// (e.g. `checkout.jsp#scriptlet3`).
    pub name: String,
    pub text: String,
    pub span: Span,
    /// Deterministic retrieval weight in `[0, 1]`.
    pub importance: f32,
    #[serde(default)]
    pub business_domain: Option<String>,
    #[serde(default)]
    pub framework_pattern: Option<String>,
    #[serde(default)]
    pub migration_complexity: Option<MigrationComplexity>,
}

impl CodeChunk {
    pub fn loc(&self) -> usize {
        self.span.line_count()
    }
}
