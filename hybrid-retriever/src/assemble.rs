//! Context assembly: ranking, token budgeting, and citation formatting.
//!
//! Pure functions over the vector hits and graph findings, so the output is
//! byte-identical for identical inputs — the retrieval determinism contract
//! lives here.

use crate::request::Citation;
use graph_store::{FlowEntry, GraphNeighbor};
use vector_store::ScoredChunk;

/// Rough tokens-per-character ratio used for the context budget.
const CHARS_PER_TOKEN: usize = 4;
/// Per-chunk clamp so one oversized chunk cannot eat the whole budget.
const MAX_CHUNK_CHARS: usize = 2400;
const MAX_CHUNK_LINES: usize = 60;

/// Order hits by `score × importance`, descending; ties break on chunk id so
/// equal-scoring chunks always land in the same order.
pub(crate) fn rank_hits(hits: &mut [ScoredChunk]) {
    hits.sort_by(|a, b| {
        let ra = a.score * a.meta.importance_score;
        let rb = b.score * b.meta.importance_score;
        rb.total_cmp(&ra).then_with(|| a.id.cmp(&b.id))
    });
}

/// Build the prompt fragment and matching citations under `token_budget`.
pub(crate) fn assemble(
    hits: &[ScoredChunk],
    neighbors: &[(String, Vec<GraphNeighbor>)],
    flows: &[(String, Vec<FlowEntry>)],
    token_budget: usize,
) -> (String, Vec<Citation>) {
    let char_budget = token_budget.saturating_mul(CHARS_PER_TOKEN);
    let mut used = 0usize;
    let mut context = String::new();
    let mut citations = Vec::new();

    context.push_str("### Code context\n");
    for (idx, hit) in hits.iter().enumerate() {
        let body = clamp_snippet(&hit.text, MAX_CHUNK_CHARS, MAX_CHUNK_LINES);
        let header = format!(
            "[{}] {}:{} lines {}-{} (score {:.3})\n",
            idx + 1,
            hit.meta.repository_name,
            hit.meta.file_path,
            hit.meta.start_line,
            hit.meta.end_line,
            hit.score
        );
        let cost = header.len() + body.len() + 10;
        if used + cost > char_budget && !citations.is_empty() {
            break;
        }
        used += cost;
        context.push_str(&header);
        context.push_str("```\n");
        context.push_str(&body);
        if !body.ends_with('\n') {
            context.push('\n');
        }
        context.push_str("```\n");

        citations.push(Citation {
            chunk_id: hit.id.clone(),
            repository_name: hit.meta.repository_name.clone(),
            file_path: hit.meta.file_path.clone(),
            start_line: hit.meta.start_line,
            end_line: hit.meta.end_line,
            score: hit.score,
        });
    }

    let structural: Vec<String> = neighbors
        .iter()
        .filter(|(id, n)| !n.is_empty() && citations.iter().any(|c| &c.chunk_id == id))
        .flat_map(|(id, n)| {
            let ordinal = citations
                .iter()
                .position(|c| &c.chunk_id == id)
                .map(|p| p + 1)
                .unwrap_or(0);
            n.iter().map(move |neighbor| {
                let detail = neighbor
                    .detail
                    .as_deref()
                    .map(|d| format!(" — {d}"))
                    .unwrap_or_default();
                format!("- [{}] {} {}{}\n", ordinal, neighbor.label, neighbor.name, detail)
            })
        })
        .collect();
    if !structural.is_empty() {
        context.push_str("\n### Related structure\n");
        for line in structural {
            if used + line.len() > char_budget {
                break;
            }
            used += line.len();
            context.push_str(&line);
        }
    }

    let has_flows = flows.iter().any(|(_, entries)| !entries.is_empty());
    if has_flows {
        context.push_str("\n### Action flows\n");
        for (repo, entries) in flows {
            for entry in entries {
                let targets = if entry.forwards_to.is_empty() {
                    String::from("(no forwards)")
                } else {
                    entry.forwards_to.join(", ")
                };
                let class = entry
                    .action_class
                    .as_deref()
                    .map(|c| format!(" [{c}]"))
                    .unwrap_or_default();
                let line = format!("- {repo}: {}{} -> {}\n", entry.action_path, class, targets);
                if used + line.len() > char_budget {
                    break;
                }
                used += line.len();
                context.push_str(&line);
            }
        }
    }

    (context, citations)
}

/// Clamp a snippet by characters and lines, preserving line boundaries.
fn clamp_snippet(s: &str, max_chars: usize, max_lines: usize) -> String {
    let mut out = String::new();
    let mut total = 0usize;
    let mut lines = 0usize;

    for (i, line) in s.lines().enumerate() {
        if lines >= max_lines {
            break;
        }
        let need = line.len() + if i > 0 { 1 } else { 0 };
        if total + need > max_chars {
            break;
        }
        if i > 0 {
            out.push('\n');
        }
        out.push_str(line);
        total += need;
        lines += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use vector_store::ChunkMeta;

    fn hit(id: &str, score: f32, importance: f32, text: &str) -> ScoredChunk {
        ScoredChunk {
            id: id.to_string(),
            score,
            text: text.to_string(),
            meta: ChunkMeta {
                repository_name: String::from("legacy-shop"),
                file_path: String::from("src/OrderAction.java"),
                language: String::from("java"),
                kind: String::from("class"),
                start_line: 1,
                end_line: 20,
                business_domain: None,
                framework_pattern: None,
                migration_complexity: None,
                importance_score: importance,
                embedding_failed: false,
                model: String::from("hash-embedder"),
            },
            vector: None,
        }
    }

    #[test]
    fn ranking_weighs_score_by_importance() {
        let mut hits = vec![
            hit("b", 0.8, 0.5, "low importance"),
            hit("a", 0.7, 0.9, "high importance"),
        ];
        rank_hits(&mut hits);
        // 0.7*0.9 = 0.63 beats 0.8*0.5 = 0.40
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn equal_rank_breaks_ties_by_id() {
        let mut hits = vec![
            hit("zz", 0.5, 0.8, "x"),
            hit("aa", 0.5, 0.8, "y"),
        ];
        rank_hits(&mut hits);
        assert_eq!(hits[0].id, "aa");
    }

    #[test]
    fn assembly_is_deterministic() {
        let hits = vec![hit("a", 0.9, 0.9, "class A {}"), hit("b", 0.6, 0.9, "class B {}")];
        let (ctx1, cit1) = assemble(&hits, &[], &[], 1000);
        let (ctx2, cit2) = assemble(&hits, &[], &[], 1000);
        assert_eq!(ctx1, ctx2);
        assert_eq!(cit1, cit2);
    }

    #[test]
    fn budget_caps_included_chunks_but_keeps_first() {
        let big = "x".repeat(5000);
        let hits = vec![hit("a", 0.9, 0.9, &big), hit("b", 0.8, 0.9, &big)];
        // Tiny budget: the first chunk always ships, later ones are cut.
        let (_, citations) = assemble(&hits, &[], &[], 10);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].chunk_id, "a");
    }

    #[test]
    fn citations_carry_location_and_score() {
        let hits = vec![hit("a", 0.77, 0.9, "class A {}")];
        let (context, citations) = assemble(&hits, &[], &[], 1000);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].file_path, "src/OrderAction.java");
        assert_eq!(citations[0].start_line, 1);
        assert_eq!(citations[0].end_line, 20);
        assert!((citations[0].score - 0.77).abs() < 1e-6);
        assert!(context.contains("src/OrderAction.java"));
        assert!(context.contains("score 0.770"));
    }

    #[test]
    fn flows_render_in_architecture_sections() {
        let flows = vec![(
            String::from("legacy-shop"),
            vec![FlowEntry {
                action_path: String::from("/submitOrder"),
                action_class: Some(String::from("SubmitOrderAction")),
                forwards_to: vec![String::from("web/confirm.jsp")],
            }],
        )];
        let hits = vec![hit("a", 0.9, 0.9, "class A {}")];
        let (context, _) = assemble(&hits, &[], &flows, 1000);
        assert!(context.contains("### Action flows"));
        assert!(context.contains("/submitOrder"));
        assert!(context.contains("web/confirm.jsp"));
    }
}
