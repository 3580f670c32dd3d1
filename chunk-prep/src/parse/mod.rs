//! Structural parsing layer.
//!
//! One entry point, [`parse_file`], dispatches by language:
//! - Tree-sitter extraction for the code languages (dispatch tables in
//!   [`extract`]);
//! - regex-driven scriptlet/markup chunking for JSP (no grammar exists for
//!   it in the ecosystem);
//! - Tree-sitter XML for `.xml` files, chunked by top-level elements.
//!
//! A file that cannot be parsed structurally degrades to raw-text windowing
//! with a warning; it never fails the repository.

mod extract;
mod fallback;
mod jsp;
mod xml;

use crate::{
    chunking,
    config::ChunkConfig,
    model::{chunk::CodeChunk, language::LanguageKind, summary::FileMeta},
};
use anyhow::{Context, Result};
use std::fs;
use tracing::{debug, warn};

/// Internal pre-chunk: a kind, a label, and a 1-based inclusive line range.
/// Ids, text, and byte spans are materialized later by `chunking`.
#[derive(Debug, Clone)]
pub(crate) struct Draft {
    pub kind: crate::model::chunk::ChunkKind,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// Result of parsing a single file.
#[derive(Debug)]
pub struct ParseOutcome {
    pub chunks: Vec<CodeChunk>,
    /// True when raw-text windowing replaced structural parsing.
    pub fallback_used: bool,
    /// Human-readable parse warning, if any.
    pub warning: Option<String>,
}

/// Parse one file into ordered chunks with deterministic ids.
///
/// Empty files produce zero chunks. The caller decides what a parse warning
/// means for the task (per-file warnings never abort ingestion).
pub fn parse_file(repository: &str, meta: &FileMeta, cfg: &ChunkConfig) -> Result<ParseOutcome> {
    let language = meta
        .language
        .with_context(|| format!("parse: no language for {}", meta.path))?;

    let text = fs::read_to_string(&meta.abs_path)
        .with_context(|| format!("parse: read {}", meta.abs_path.display()))?;

    if text.trim().is_empty() {
        debug!("parse: empty file {}", meta.path);
        return Ok(ParseOutcome {
            chunks: Vec::new(),
            fallback_used: false,
            warning: None,
        });
    }

    let structural = match language {
        LanguageKind::Jsp => Ok(jsp::chunk_jsp(&meta.path, &text)),
        LanguageKind::Xml => xml::chunk_xml(&meta.path, &text, cfg),
        _ => extract::extract(language, &meta.path, &text),
    };

    let (drafts, fallback_used, warning) = match structural {
        Ok(drafts) if !drafts.is_empty() => (drafts, false, None),
        Ok(_) => {
            // Parsed cleanly but produced nothing recognizable (e.g. a file
            // of only comments); keep it retrievable via windowing.
            (fallback::window(&meta.path, &text, cfg), true, None)
        }
        Err(err) => {
            let msg = format!("parser error in {}: {err:#}", meta.path);
            warn!("parse: {msg}; falling back to raw-text windows");
            (fallback::window(&meta.path, &text, cfg), true, Some(msg))
        }
    };

    let chunks = chunking::build_chunks(repository, meta, language, &text, drafts, cfg);
    Ok(ParseOutcome {
        chunks,
        fallback_used,
        warning,
    })
}

/// File-stem label base used by the chunkers (`checkout.jsp` -> `checkout`).
pub(crate) fn stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.split('.').next().unwrap_or(name)
}
