//! Search filter abstraction, decoupled from the Qdrant protobuf types.

use qdrant_client::qdrant::{Condition, Filter};

/// Conjunction of exact-match conditions on payload fields.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub equals: Vec<(String, String)>,
}

impl SearchFilter {
    pub fn field(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            equals: vec![(key.into(), value.into())],
        }
    }

    pub fn and(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.equals.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }
}

pub(crate) fn to_qdrant_filter(filter: &SearchFilter) -> Filter {
    Filter::must(
        filter
            .equals
            .iter()
            .map(|(k, v)| Condition::matches(k.clone(), v.clone()))
            .collect::<Vec<_>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_conditions() {
        let f = SearchFilter::field("kind", "class").and("language", "java");
        assert_eq!(f.equals.len(), 2);
        assert!(!f.is_empty());

        let qf = to_qdrant_filter(&f);
        assert_eq!(qf.must.len(), 2);
    }
}
