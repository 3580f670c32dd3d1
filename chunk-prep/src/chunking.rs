//! Chunk materialization: split/merge policy, importance scoring, ids.
//!
//! The parser emits line-granular drafts; this module applies the edge
//! policies (oversized chunks split at line boundaries, undersized chunks
//! merged into the previous chunk of the same kind), slices the text, and
//! stamps deterministic ids. Ids are assigned after the policy pass so a
//! chunk's identity always reflects its final span.

use crate::{
    config::{ChunkConfig, HARD_CHUNK_BYTES},
    ids,
    model::{
        chunk::{ChunkKind, CodeChunk},
        language::LanguageKind,
        span::Span,
        summary::FileMeta,
    },
    parse::Draft,
};

/// Byte offsets of line starts; makes line-range slicing O(1).
pub(crate) struct LineIndex {
    starts: Vec<usize>,
    total_len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0usize];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' && i + 1 < text.len() {
                starts.push(i + 1);
            }
        }
        Self {
            starts,
            total_len: text.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        if self.total_len == 0 { 0 } else { self.starts.len() }
    }

    /// Byte range of the 1-based inclusive line range.
    pub fn byte_range(&self, start_line: usize, end_line: usize) -> (usize, usize) {
        let start = self.starts[start_line - 1];
        let end = if end_line >= self.starts.len() {
            self.total_len
        } else {
            self.starts[end_line]
        };
        (start, end)
    }
}

/// Turn drafts into final chunks for one file.
pub(crate) fn build_chunks(
    repository: &str,
    meta: &FileMeta,
    language: LanguageKind,
    text: &str,
    drafts: Vec<Draft>,
    cfg: &ChunkConfig,
) -> Vec<CodeChunk> {
    let index = LineIndex::new(text);
    let total_lines = index.line_count();
    if total_lines == 0 {
        return Vec::new();
    }

    // Clamp to the file and drop inverted ranges from buggy grammars.
    let clamped = drafts.into_iter().filter_map(|mut d| {
        d.start_line = d.start_line.clamp(1, total_lines);
        d.end_line = d.end_line.clamp(1, total_lines);
        (d.start_line <= d.end_line).then_some(d)
    });

    let split = split_oversized(clamped.collect(), &index, cfg);
    let merged = merge_undersized(split, cfg);

    merged
        .into_iter()
        .map(|d| {
            let (start_byte, end_byte) = index.byte_range(d.start_line, d.end_line);
            let span = Span::new(start_byte, end_byte, d.start_line, d.end_line);
            let chunk_text = text[start_byte..end_byte].to_string();
            let importance = importance(d.kind, span.line_count());
            CodeChunk {
                id: ids::chunk_id(repository, &meta.path, &span, d.kind),
                repository: repository.to_string(),
                file_path: meta.path.clone(),
                language,
                kind: d.kind,
                name: d.name,
                text: chunk_text,
                span,
                importance,
                business_domain: None,
                framework_pattern: None,
                migration_complexity: None,
            }
        })
        .collect()
}

/// Split chunks above the line cap (or the hard byte cap) at line boundaries.
fn split_oversized(drafts: Vec<Draft>, index: &LineIndex, cfg: &ChunkConfig) -> Vec<Draft> {
    let mut out = Vec::with_capacity(drafts.len());
    for d in drafts {
        let (start_byte, end_byte) = index.byte_range(d.start_line, d.end_line);
        let lines = d.end_line - d.start_line + 1;
        if lines <= cfg.chunk_max_lines && end_byte - start_byte <= HARD_CHUNK_BYTES {
            out.push(d);
            continue;
        }

        let mut part = 0usize;
        let mut start = d.start_line;
        while start <= d.end_line {
            let end = (start + cfg.chunk_max_lines - 1).min(d.end_line);
            part += 1;
            out.push(Draft {
                kind: d.kind,
                name: if part == 1 {
                    d.name.clone()
                } else {
                    format!("{}#part{}", d.name, part)
                },
                start_line: start,
                end_line: end,
            });
            start = end + 1;
        }
    }
    out
}

/// Merge chunks below the line floor into the previous chunk of the same
/// kind, keeping the union of the two spans.
fn merge_undersized(drafts: Vec<Draft>, cfg: &ChunkConfig) -> Vec<Draft> {
    let mut out: Vec<Draft> = Vec::with_capacity(drafts.len());
    for d in drafts {
        let lines = d.end_line - d.start_line + 1;
        if lines < cfg.chunk_min_lines {
            if let Some(prev) = out.last_mut() {
                if prev.kind == d.kind {
                    prev.start_line = prev.start_line.min(d.start_line);
                    prev.end_line = prev.end_line.max(d.end_line);
                    continue;
                }
            }
        }
        out.push(d);
    }
    out
}

/// Deterministic retrieval weight: kind base plus a small size factor.
fn importance(kind: ChunkKind, loc: usize) -> f32 {
    let base = match kind {
        ChunkKind::Class => 0.9,
        ChunkKind::Function => 0.8,
        ChunkKind::Method => 0.7,
        ChunkKind::JspScriptlet => 0.6,
        ChunkKind::Module => 0.5,
        ChunkKind::XmlBlock => 0.4,
        ChunkKind::RawText => 0.3,
    };
    let size_bonus = ((loc as f32) / 2000.0).min(0.1);
    (base + size_bonus).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn meta(path: &str) -> FileMeta {
        FileMeta {
            path: path.to_string(),
            abs_path: PathBuf::from(path),
            language: Some(LanguageKind::Java),
            size: 0,
            loc: 0,
            content_hash: String::new(),
        }
    }

    fn draft(kind: ChunkKind, name: &str, start: usize, end: usize) -> Draft {
        Draft {
            kind,
            name: name.to_string(),
            start_line: start,
            end_line: end,
        }
    }

    fn lines(n: usize) -> String {
        (1..=n).map(|i| format!("line {i}\n")).collect()
    }

    #[test]
    fn oversized_chunks_split_at_line_boundaries() {
        let cfg = ChunkConfig {
            chunk_max_lines: 10,
            chunk_min_lines: 2,
            ..ChunkConfig::default()
        };
        let text = lines(25);
        let chunks = build_chunks(
            "repo",
            &meta("src/Big.java"),
            LanguageKind::Java,
            &text,
            vec![draft(ChunkKind::Class, "Big", 1, 25)],
            &cfg,
        );
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].span.start_line, 1);
        assert_eq!(chunks[0].span.end_line, 10);
        assert_eq!(chunks[2].span.end_line, 25);
        assert!(chunks[1].name.contains("part"));
    }

    #[test]
    fn undersized_chunks_merge_with_previous_same_kind() {
        let cfg = ChunkConfig {
            chunk_max_lines: 50,
            chunk_min_lines: 4,
            ..ChunkConfig::default()
        };
        let text = lines(20);
        let drafts = vec![
            draft(ChunkKind::Method, "a", 1, 8),
            draft(ChunkKind::Method, "b", 9, 10), // below floor, same kind
            draft(ChunkKind::Module, "m", 11, 12), // below floor, other kind
        ];
        let chunks = build_chunks(
            "repo",
            &meta("src/S.java"),
            LanguageKind::Java,
            &text,
            drafts,
            &cfg,
        );
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind, ChunkKind::Method);
        assert_eq!(chunks[0].span.start_line, 1);
        assert_eq!(chunks[0].span.end_line, 10); // union of a and b
        assert_eq!(chunks[1].kind, ChunkKind::Module);
    }

    #[test]
    fn ids_and_spans_are_reproducible() {
        let cfg = ChunkConfig::default();
        let text = lines(30);
        let drafts = || vec![draft(ChunkKind::Class, "Foo", 2, 20)];
        let a = build_chunks(
            "repo",
            &meta("src/Foo.java"),
            LanguageKind::Java,
            &text,
            drafts(),
            &cfg,
        );
        let b = build_chunks(
            "repo",
            &meta("src/Foo.java"),
            LanguageKind::Java,
            &text,
            drafts(),
            &cfg,
        );
        assert_eq!(a[0].id, b[0].id);
        assert_eq!(a[0].span, b[0].span);
        assert_eq!(a[0].text, b[0].text);
    }

    #[test]
    fn chunk_text_matches_span() {
        let cfg = ChunkConfig::default();
        let text = "alpha\nbeta\ngamma\n";
        let chunks = build_chunks(
            "repo",
            &meta("src/t.java"),
            LanguageKind::Java,
            text,
            vec![draft(ChunkKind::Module, "m", 2, 2)],
            &cfg,
        );
        assert_eq!(chunks[0].text, "beta\n");
    }

    #[test]
    fn importance_is_ordered_by_kind() {
        assert!(importance(ChunkKind::Class, 10) > importance(ChunkKind::RawText, 10));
        assert!(importance(ChunkKind::Function, 10) > importance(ChunkKind::XmlBlock, 10));
    }
}
