//! JSP chunking.
//!
//! No tree-sitter grammar exists for JSP, so this is regex-driven: embedded
//! scriptlets (`<% ... %>`, `<%= ... %>`, `<%! ... %>`) become
//! `jsp_scriptlet` chunks and the markup runs between them become
//! `xml_block` chunks. Taglib directives stay inside the markup runs; the
//! pattern extractor reads them from there.

use crate::model::chunk::ChunkKind;
use crate::parse::{Draft, stem};
use regex::Regex;
use std::sync::OnceLock;

fn scriptlet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // <%@ is a directive, not a scriptlet.
    RE.get_or_init(|| Regex::new(r"(?s)<%[=!]?([^@].*?)%>").unwrap())
}

pub(crate) fn chunk_jsp(path: &str, text: &str) -> Vec<Draft> {
    let line_starts = line_starts(text);
    let total_lines = line_starts.len();
    let base = stem(path);

    let mut drafts = Vec::new();
    let mut scriptlet_no = 0usize;
    let mut last_markup_line = 0usize; // last line already covered by markup/scriptlet

    for m in scriptlet_re().find_iter(text) {
        let start_line = line_of(&line_starts, m.start());
        let end_line = line_of(&line_starts, m.end().saturating_sub(1));

        // Markup run strictly above this scriptlet.
        if start_line > last_markup_line + 1 {
            drafts.push(Draft {
                kind: ChunkKind::XmlBlock,
                name: format!("{base}#markup{}", drafts.len()),
                start_line: last_markup_line + 1,
                end_line: start_line - 1,
            });
        }

        scriptlet_no += 1;
        drafts.push(Draft {
            kind: ChunkKind::JspScriptlet,
            name: format!("{base}#scriptlet{scriptlet_no}"),
            start_line,
            end_line,
        });
        last_markup_line = end_line;
    }

    if total_lines > last_markup_line {
        drafts.push(Draft {
            kind: ChunkKind::XmlBlock,
            name: format!("{base}#markup{}", drafts.len()),
            start_line: last_markup_line + 1,
            end_line: total_lines,
        });
    }

    drafts
}

/// Byte offset of each line start, in order.
fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0usize];
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' && i + 1 < text.len() {
            starts.push(i + 1);
        }
    }
    starts
}

/// 1-based line containing the byte offset.
fn line_of(starts: &[usize], byte: usize) -> usize {
    match starts.binary_search(&byte) {
        Ok(i) => i + 1,
        Err(i) => i,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSP: &str = "<%@ taglib uri=\"/tags/struts-html\" prefix=\"html\" %>\n\
<html:form action=\"/submitOrder\">\n\
  <html:text property=\"amount\"/>\n\
</html:form>\n\
<%\n\
  OrderService svc = OrderService.lookup();\n\
  svc.validate(request.getParameter(\"amount\"));\n\
%>\n\
<p>done</p>\n";

    #[test]
    fn scriptlets_and_markup_are_separated() {
        let drafts = chunk_jsp("web/order.jsp", JSP);

        let scriptlets: Vec<_> = drafts
            .iter()
            .filter(|d| d.kind == ChunkKind::JspScriptlet)
            .collect();
        assert_eq!(scriptlets.len(), 1);
        assert_eq!(scriptlets[0].start_line, 5);
        assert_eq!(scriptlets[0].end_line, 8);

        let markup: Vec<_> = drafts
            .iter()
            .filter(|d| d.kind == ChunkKind::XmlBlock)
            .collect();
        assert_eq!(markup.len(), 2);
        assert_eq!(markup[0].start_line, 1);
        assert_eq!(markup[0].end_line, 4);
    }

    #[test]
    fn directives_are_not_scriptlets() {
        let drafts = chunk_jsp("web/head.jsp", "<%@ page language=\"java\" %>\n<p>x</p>\n");
        assert!(drafts.iter().all(|d| d.kind == ChunkKind::XmlBlock));
    }

    #[test]
    fn pure_markup_is_one_block() {
        let drafts = chunk_jsp("web/plain.jsp", "<html>\n<body>hi</body>\n</html>\n");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, ChunkKind::XmlBlock);
        assert_eq!(drafts[0].start_line, 1);
        assert_eq!(drafts[0].end_line, 3);
    }
}
