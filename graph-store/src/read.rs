//! Read path: bounded expansion, flow summaries, and parity counts.
//!
//! Every query returns scalars (not nodes) with a deterministic ORDER BY, so
//! identical stores produce identical rows — the retriever's determinism
//! contract leans on this.

use crate::errors::GraphStoreError;
use crate::model::{FlowEntry, GraphNeighbor, RelKind};
use neo4rs::{Graph, query};

/// Cypher fragment of the expansion whitelist: `CONTAINS|HAS_CHUNK|...`.
pub(crate) fn whitelist_fragment() -> String {
    RelKind::expansion_whitelist()
        .iter()
        .map(RelKind::as_cypher)
        .collect::<Vec<_>>()
        .join("|")
}

/// Neighbors within `hops` (1 or 2) of a chunk, along whitelisted
/// relationships only, capped at `limit`.
pub(crate) async fn expand_chunk(
    graph: &Graph,
    chunk_id: &str,
    hops: u8,
    limit: usize,
) -> Result<Vec<GraphNeighbor>, GraphStoreError> {
    let hops = hops.clamp(1, 2);
    let q = format!(
        "MATCH (c:CodeChunk {{id: $id}})-[:{}*1..{hops}]-(n) \
         WHERE n.id IS NULL OR n.id <> $id \
         RETURN DISTINCT labels(n)[0] AS label, \
                coalesce(n.name, n.path, n.file_path, n.coordinates, n.id, '') AS name, \
                coalesce(n.business_purpose, n.description, '') AS detail \
         ORDER BY label, name \
         LIMIT $limit",
        whitelist_fragment()
    );

    let mut rows = graph
        .execute(
            query(&q)
                .param("id", chunk_id.to_string())
                .param("limit", limit as i64),
        )
        .await?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        let label: String = row
            .get("label")
            .map_err(|e| GraphStoreError::Decode(e.to_string()))?;
        let name: String = row
            .get("name")
            .map_err(|e| GraphStoreError::Decode(e.to_string()))?;
        let detail: String = row
            .get("detail")
            .map_err(|e| GraphStoreError::Decode(e.to_string()))?;
        out.push(GraphNeighbor {
            label,
            name,
            detail: if detail.is_empty() { None } else { Some(detail) },
        });
    }
    Ok(out)
}

/// Per-repository action flows for architecture mode.
pub(crate) async fn flow_summary(
    graph: &Graph,
    repository: &str,
) -> Result<Vec<FlowEntry>, GraphStoreError> {
    let mut rows = graph
        .execute(
            query(
                "MATCH (a:StrutsAction {repository_name: $repo}) \
                 OPTIONAL MATCH (a)-[:FORWARDS_TO]->(j:JspComponent) \
                 RETURN a.path AS path, a.action_class AS class, \
                        collect(j.file_path) AS forwards \
                 ORDER BY path",
            )
            .param("repo", repository.to_string()),
        )
        .await?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        let path: String = row
            .get("path")
            .map_err(|e| GraphStoreError::Decode(e.to_string()))?;
        let class: String = row.get("class").unwrap_or_default();
        let mut forwards: Vec<String> = row.get("forwards").unwrap_or_default();
        forwards.retain(|f| !f.is_empty());
        forwards.sort();
        out.push(FlowEntry {
            action_path: path,
            action_class: if class.is_empty() { None } else { Some(class) },
            forwards_to: forwards,
        });
    }
    Ok(out)
}

pub(crate) async fn count_scalar(
    graph: &Graph,
    q: neo4rs::Query,
) -> Result<u64, GraphStoreError> {
    let mut rows = graph.execute(q).await?;
    if let Some(row) = rows.next().await? {
        let n: i64 = row
            .get("n")
            .map_err(|e| GraphStoreError::Decode(e.to_string()))?;
        return Ok(n.max(0) as u64);
    }
    Ok(0)
}

pub(crate) async fn list_repositories(graph: &Graph) -> Result<Vec<String>, GraphStoreError> {
    let mut rows = graph
        .execute(query("MATCH (r:Repository) RETURN r.name AS n ORDER BY n"))
        .await?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await? {
        let name: String = row
            .get("n")
            .map_err(|e| GraphStoreError::Decode(e.to_string()))?;
        out.push(name);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_fragment_matches_documented_rels() {
        assert_eq!(
            whitelist_fragment(),
            "CONTAINS|HAS_CHUNK|CALLS|IMPLEMENTS_BUSINESS_RULE|DEPENDS_ON"
        );
    }
}
