//! Repository analysis and structural chunking.
//!
//! This crate turns a local working tree into the units the rest of the
//! pipeline operates on:
//! - [`scan::analyze_repo`] walks the tree, applies include/exclude globs and
//!   the file-size cap, classifies languages, and produces a [`model::summary::RepoSummary`];
//! - [`parse::parse_file`] parses one file with Tree-sitter (JSP and XML are
//!   first-class) and emits ordered [`model::chunk::CodeChunk`] records with
//!   deterministic ids;
//! - [`chunking`] applies the split/merge policy and importance scoring.
//!
//! Parsing failures never abort a repository: the caller gets a raw-text
//! windowed fallback and a recorded warning instead.

pub mod chunking;
pub mod config;
pub mod ids;
pub mod model;
pub mod parse;
pub mod scan;

pub use config::ChunkConfig;
pub use model::chunk::{ChunkKind, CodeChunk, MigrationComplexity};
pub use model::language::LanguageKind;
pub use model::span::Span;
pub use model::summary::{FileMeta, RepoSummary};
pub use parse::{ParseOutcome, parse_file};
pub use scan::analyze_repo;
