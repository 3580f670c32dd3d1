//! Business-rule mining from validation logic in Java chunks.

use crate::complexity::score_business_rule;
use crate::model::BusinessRule;
use crate::purpose::infer_business_purpose;
use chunk_prep::{ChunkKind, CodeChunk, ids};
use regex::Regex;
use std::sync::OnceLock;

fn validation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Struts validate() methods and the common boolean isValid/validateX shape.
    RE.get_or_init(|| {
        Regex::new(r"(?m)(?:public|protected)\s+(?:ActionErrors|boolean)\s+(validate\w*|isValid\w*)\s*\(")
            .unwrap()
    })
}

/// One rule per validation method found in a method/class chunk. The rule id
/// hashes location + text so unchanged code keeps the same rule.
pub(crate) fn mine_rules(chunks: &[CodeChunk]) -> Vec<BusinessRule> {
    let mut out = Vec::new();
    let mut seen = std::collections::HashSet::new();
    // Method chunks nest inside class chunks; visiting methods first keeps
    // the method-level finding and drops the class-level duplicate via the
    // (file, line) key.
    let methods = chunks.iter().filter(|c| c.kind == ChunkKind::Method);
    let classes = chunks.iter().filter(|c| c.kind == ChunkKind::Class);
    for chunk in methods.chain(classes) {
        for caps in validation_re().captures_iter(&chunk.text) {
            let method = caps[1].to_string();
            let offset = caps.get(0).map(|m| m.start()).unwrap_or(0);
            let line = chunk.span.start_line + chunk.text[..offset].lines().count();
            if !seen.insert((chunk.file_path.clone(), line)) {
                continue;
            }

            let key = format!(
                "rule|{}|{}|{}",
                chunk.file_path,
                line,
                ids::hash_content(chunk.text.as_bytes())
            );
            out.push(BusinessRule {
                id: ids::uuid_v5_from_key(&key),
                description: format!("validation method {method} in {}", chunk.file_path),
                file_path: chunk.file_path.clone(),
                line,
                source_chunk_id: chunk.id.clone(),
                business_purpose: infer_business_purpose(&chunk.text),
                migration_complexity: score_business_rule(),
            });
        }
    }
    out.sort_by(|a, b| (&a.file_path, a.line).cmp(&(&b.file_path, b.line)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk_prep::{LanguageKind, Span};

    fn chunk(text: &str) -> CodeChunk {
        CodeChunk {
            id: String::from("c1"),
            repository: String::from("shop"),
            file_path: String::from("src/OrderForm.java"),
            language: LanguageKind::Java,
            kind: ChunkKind::Method,
            name: String::from("validate"),
            text: text.to_string(),
            span: Span::new(0, text.len(), 10, 20),
            importance: 0.7,
            business_domain: None,
            framework_pattern: None,
            migration_complexity: None,
        }
    }

    #[test]
    fn validation_methods_become_rules() {
        let c = chunk(
            "public ActionErrors validate(ActionMapping m, HttpServletRequest r) {\n  return errors;\n}\n",
        );
        let rules = mine_rules(&[c.clone()]);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].source_chunk_id, "c1");
        assert!(rules[0].description.contains("validate"));

        // same input, same rule id
        assert_eq!(rules[0].id, mine_rules(&[c])[0].id);
    }

    #[test]
    fn plain_methods_are_not_rules() {
        let c = chunk("public int total() { return 0; }\n");
        assert!(mine_rules(&[c]).is_empty());
    }
}
