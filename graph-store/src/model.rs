//! Graph-side record types and the relationship whitelist.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Relationship types the writer may materialize. Ownership flows only along
/// `Contains` and `HasChunk`; everything else may form cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelKind {
    Contains,
    HasChunk,
    DependsOn,
    ImplementsBusinessRule,
    ContainsStrutsAction,
    CallsService,
    ForwardsTo,
    Calls,
}

impl RelKind {
    /// Cypher relationship type.
    pub fn as_cypher(&self) -> &'static str {
        use RelKind::*;
        match self {
            Contains => "CONTAINS",
            HasChunk => "HAS_CHUNK",
            DependsOn => "DEPENDS_ON",
            ImplementsBusinessRule => "IMPLEMENTS_BUSINESS_RULE",
            ContainsStrutsAction => "CONTAINS_STRUTS_ACTION",
            CallsService => "CALLS_SERVICE",
            ForwardsTo => "FORWARDS_TO",
            Calls => "CALLS",
        }
    }

    /// Relationships the retriever follows when expanding around a hit.
    pub fn expansion_whitelist() -> &'static [RelKind] {
        use RelKind::*;
        &[Contains, HasChunk, Calls, ImplementsBusinessRule, DependsOn]
    }
}

impl Display for RelKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_cypher())
    }
}

/// The Repository node written at ingest start and refreshed with terminal
/// stats when ingestion completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryNode {
    pub name: String,
    pub origin: String,
    pub branch: Option<String>,
    /// JSON snapshot of the ingest options, for operator inspection.
    pub config_snapshot: String,
}

/// Terminal stats recorded on the Repository node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryStats {
    pub file_count: usize,
    pub chunk_count: usize,
    pub total_loc: usize,
}

/// One neighbor reached during bounded expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNeighbor {
    pub label: String,
    pub name: String,
    pub detail: Option<String>,
}

/// One Struts action flow for architecture-mode summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEntry {
    pub action_path: String,
    pub action_class: Option<String>,
    pub forwards_to: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_is_the_documented_set() {
        let names: Vec<&str> = RelKind::expansion_whitelist()
            .iter()
            .map(RelKind::as_cypher)
            .collect();
        assert_eq!(
            names,
            vec![
                "CONTAINS",
                "HAS_CHUNK",
                "CALLS",
                "IMPLEMENTS_BUSINESS_RULE",
                "DEPENDS_ON"
            ]
        );
    }
}
