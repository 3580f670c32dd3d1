//! XML chunking via tree-sitter.
//!
//! Small documents become one `xml_block`; larger ones are chunked per
//! top-level element under the document root (for `struts-config.xml` that
//! means one chunk per `<action-mappings>`, `<form-beans>`, and so on).

use crate::config::ChunkConfig;
use crate::model::chunk::ChunkKind;
use crate::parse::{Draft, stem};
use anyhow::{Result, anyhow};
use tree_sitter::{Node, Parser};

pub(crate) fn chunk_xml(path: &str, text: &str, cfg: &ChunkConfig) -> Result<Vec<Draft>> {
    let total_lines = text.lines().count();
    if total_lines <= cfg.chunk_max_lines {
        return Ok(vec![whole_document(path, total_lines)]);
    }

    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_xml::LANGUAGE_XML.into())?;
    let tree = parser
        .parse(text, None)
        .ok_or_else(|| anyhow!("tree-sitter returned no tree for {path}"))?;
    let document = tree.root_node();
    if document.has_error() {
        return Err(anyhow!("malformed XML in {path}"));
    }

    let root = find_first(document, "element")
        .ok_or_else(|| anyhow!("no root element in {path}"))?;

    let mut drafts = Vec::new();
    collect_child_elements(root, text, &mut drafts);

    if drafts.is_empty() {
        return Ok(vec![whole_document(path, total_lines)]);
    }
    Ok(drafts)
}

fn whole_document(path: &str, total_lines: usize) -> Draft {
    Draft {
        kind: ChunkKind::XmlBlock,
        name: stem(path).to_string(),
        start_line: 1,
        end_line: total_lines.max(1),
    }
}

/// Depth-2 elements (children of the root element) become blocks.
fn collect_child_elements(root: Node<'_>, text: &str, drafts: &mut Vec<Draft>) {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "element" {
            drafts.push(Draft {
                kind: ChunkKind::XmlBlock,
                name: tag_name(child, text),
                start_line: child.start_position().row + 1,
                end_line: child.end_position().row + 1,
            });
        } else if child.kind() == "content" {
            collect_child_elements(child, text, drafts);
        }
    }
}

fn find_first<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == kind {
            return Some(child);
        }
        if let Some(found) = find_first(child, kind) {
            return Some(found);
        }
    }
    None
}

/// Tag name from the element's opening tag text.
fn tag_name(node: Node<'_>, text: &str) -> String {
    let raw = node.utf8_text(text.as_bytes()).unwrap_or("");
    let head = raw.trim_start();
    let head = head.strip_prefix('<').unwrap_or(head);
    head.chars()
        .take_while(|c| c.is_alphanumeric() || matches!(c, ':' | '-' | '_' | '.'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_document_is_one_block() {
        let cfg = ChunkConfig::default();
        let drafts = chunk_xml("conf/web.xml", "<web-app>\n<display-name>x</display-name>\n</web-app>\n", &cfg).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, ChunkKind::XmlBlock);
    }

    #[test]
    fn large_document_chunks_per_top_level_element() {
        let cfg = ChunkConfig {
            chunk_max_lines: 4,
            chunk_min_lines: 1,
            ..ChunkConfig::default()
        };
        let xml = "<struts-config>\n\
<form-beans>\n<form-bean name=\"orderForm\"/>\n</form-beans>\n\
<action-mappings>\n<action path=\"/submitOrder\"/>\n</action-mappings>\n\
</struts-config>\n";
        let drafts = chunk_xml("conf/struts-config.xml", xml, &cfg).unwrap();
        let names: Vec<_> = drafts.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["form-beans", "action-mappings"]);
    }
}
