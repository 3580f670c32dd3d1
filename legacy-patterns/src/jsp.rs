//! JSP component extraction: taglibs, Struts tags, form targets, and the
//! business purpose of the page.

use crate::complexity::score_jsp;
use crate::model::JspComponent;
use crate::purpose::infer_business_purpose;
use chunk_prep::{ChunkKind, CodeChunk};
use regex::Regex;
use std::sync::OnceLock;

fn taglib_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<%@\s*taglib[^%]*uri\s*=\s*"([^"]+)"[^%]*prefix\s*=\s*"(\w+)""#).unwrap()
    })
}

fn struts_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(html|logic|bean|nested|tiles):(\w+)").unwrap())
}

fn form_action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<html:form[^>]*action\s*=\s*"([^"]+)""#).unwrap())
}

/// Build the component record for one JSP file from its text and the chunks
/// the parser produced for it.
pub(crate) fn component_for(file_path: &str, text: &str, chunks: &[CodeChunk]) -> JspComponent {
    let taglibs: Vec<String> = taglib_re()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect();

    let mut struts_tags: Vec<String> = struts_tag_re()
        .captures_iter(text)
        .map(|c| format!("{}:{}", &c[1], &c[2]))
        .collect();
    struts_tags.sort();
    struts_tags.dedup();

    let form_actions: Vec<String> = form_action_re()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect();

    let file_chunks: Vec<&CodeChunk> = chunks
        .iter()
        .filter(|c| c.file_path == file_path)
        .collect();
    let has_scriptlets = file_chunks
        .iter()
        .any(|c| c.kind == ChunkKind::JspScriptlet);

    JspComponent {
        file_path: file_path.to_string(),
        taglibs,
        struts_tags,
        form_actions,
        has_scriptlets,
        source_chunk_ids: file_chunks.iter().map(|c| c.id.clone()).collect(),
        business_purpose: infer_business_purpose(text),
        migration_complexity: score_jsp(has_scriptlets, text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSP: &str = r#"<%@ taglib uri="/tags/struts-html" prefix="html" %>
<%@ taglib uri="/tags/struts-logic" prefix="logic" %>
<html:form action="/submitOrder">
  <html:text property="amount"/>
  <logic:iterate id="item" name="cart">
    <bean:write name="item" property="price"/>
  </logic:iterate>
</html:form>
"#;

    #[test]
    fn collects_taglibs_tags_and_form_targets() {
        let comp = component_for("web/order.jsp", JSP, &[]);
        assert_eq!(comp.taglibs.len(), 2);
        assert!(comp.struts_tags.contains(&"html:form".to_string()));
        assert!(comp.struts_tags.contains(&"logic:iterate".to_string()));
        assert_eq!(comp.form_actions, vec!["/submitOrder"]);
        assert!(!comp.has_scriptlets);
        assert_eq!(
            comp.migration_complexity,
            chunk_prep::MigrationComplexity::Low
        );
    }

    #[test]
    fn purpose_comes_from_page_content() {
        let comp = component_for("web/order.jsp", JSP, &[]);
        assert_eq!(comp.business_purpose.as_deref(), Some("ordering"));
    }
}
