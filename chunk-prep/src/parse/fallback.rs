//! Raw-text windowing for files the structural parser cannot handle.

use crate::config::ChunkConfig;
use crate::model::chunk::ChunkKind;
use crate::parse::{Draft, stem};

/// Split a file into overlapping line windows of `chunk_max_lines`.
pub(crate) fn window(path: &str, text: &str, cfg: &ChunkConfig) -> Vec<Draft> {
    let total_lines = text.lines().count();
    if total_lines == 0 {
        return Vec::new();
    }

    let window = cfg.chunk_max_lines.max(1);
    let step = window.saturating_sub(cfg.chunk_overlap_lines).max(1);
    let base = stem(path);

    let mut drafts = Vec::new();
    let mut start = 1usize;
    let mut index = 0usize;
    loop {
        let end = (start + window - 1).min(total_lines);
        index += 1;
        drafts.push(Draft {
            kind: ChunkKind::RawText,
            name: format!("{base}#window{index}"),
            start_line: start,
            end_line: end,
        });
        if end >= total_lines {
            break;
        }
        start += step;
    }
    drafts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_cover_the_file_with_overlap() {
        let cfg = ChunkConfig {
            chunk_max_lines: 10,
            chunk_overlap_lines: 2,
            chunk_min_lines: 1,
            ..ChunkConfig::default()
        };
        let text = (1..=25).map(|i| format!("line {i}\n")).collect::<String>();
        let drafts = window("notes.jsp", &text, &cfg);

        assert_eq!(drafts.len(), 3);
        assert_eq!((drafts[0].start_line, drafts[0].end_line), (1, 10));
        assert_eq!((drafts[1].start_line, drafts[1].end_line), (9, 18));
        assert_eq!((drafts[2].start_line, drafts[2].end_line), (17, 25));
        assert!(drafts.iter().all(|d| d.kind == ChunkKind::RawText));
    }

    #[test]
    fn short_file_is_one_window() {
        let drafts = window("x.txt", "only line\n", &ChunkConfig::default());
        assert_eq!(drafts.len(), 1);
        assert_eq!((drafts[0].start_line, drafts[0].end_line), (1, 1));
    }
}
