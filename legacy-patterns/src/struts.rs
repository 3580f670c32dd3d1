//! Struts extraction: `<action>` mappings from `struts-config.xml` and
//! `Action` subclasses from Java chunks.

use crate::complexity::score_struts_action;
use crate::model::{ActionForward, StrutsAction};
use crate::purpose::infer_business_purpose;
use chunk_prep::{ChunkKind, CodeChunk};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

/// True for the files Struts conventionally keeps its mappings in.
pub(crate) fn is_struts_config(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|name| name.starts_with("struts") && name.ends_with(".xml"))
}

fn action_class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"class\s+(\w+)\s+extends\s+(?:[\w.]*\.)?(\w*Action)\b").unwrap()
    })
}

/// Parse `<action>` mappings (with nested `<forward>` targets) out of one
/// struts-config file.
pub(crate) fn parse_struts_config(
    file_path: &str,
    xml: &str,
) -> Result<Vec<StrutsAction>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut actions: Vec<StrutsAction> = Vec::new();
    let mut current: Option<StrutsAction> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"action" => {
                        // An <action> may be Empty (self-closing) or Start.
                        if let Some(done) = current.take() {
                            actions.push(done);
                        }
                        let attrs = attr_map(&e);
                        if let Some(path) = attrs.get("path") {
                            current = Some(StrutsAction {
                                path: path.clone(),
                                action_class: attrs.get("type").cloned(),
                                form_name: attrs.get("name").cloned(),
                                forwards: Vec::new(),
                                file_path: file_path.to_string(),
                                source_chunk_ids: Vec::new(),
                                business_purpose: infer_business_purpose(path),
                                migration_complexity: chunk_prep::MigrationComplexity::Medium,
                            });
                        }
                    }
                    b"forward" => {
                        if let Some(action) = current.as_mut() {
                            let attrs = attr_map(&e);
                            if let (Some(name), Some(target)) =
                                (attrs.get("name"), attrs.get("path"))
                            {
                                action.forwards.push(ActionForward {
                                    name: name.clone(),
                                    target: target.clone(),
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"action" {
                    if let Some(done) = current.take() {
                        actions.push(done);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if let Some(done) = current.take() {
        actions.push(done);
    }

    debug!(
        "struts: {} action mappings in {}",
        actions.len(),
        file_path
    );
    Ok(actions)
}

/// Match Java `Action` subclasses against the parsed mappings, attach chunk
/// back-pointers, and finalize complexity from the class body.
pub(crate) fn bind_action_classes(actions: &mut [StrutsAction], chunks: &[CodeChunk]) {
    let mut by_class: HashMap<String, &CodeChunk> = HashMap::new();
    for chunk in chunks {
        if chunk.kind != ChunkKind::Class {
            continue;
        }
        if let Some(caps) = action_class_re().captures(&chunk.text) {
            by_class.insert(caps[1].to_string(), chunk);
        }
    }

    for action in actions.iter_mut() {
        let simple_name = action
            .action_class
            .as_deref()
            .and_then(|c| c.rsplit('.').next())
            .map(str::to_string);
        let class_chunk = simple_name.and_then(|n| by_class.get(&n).copied());
        if let Some(chunk) = class_chunk {
            action.source_chunk_ids.push(chunk.id.clone());
            if action.business_purpose.is_none() {
                action.business_purpose = infer_business_purpose(&chunk.text);
            }
        }
        action.migration_complexity =
            score_struts_action(action.forwards.len(), class_chunk.map(|c| c.text.as_str()));
    }
}

fn attr_map(e: &BytesStart<'_>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        if let Ok(value) = attr.unescape_value() {
            out.insert(key, value.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"<?xml version="1.0"?>
<struts-config>
  <action-mappings>
    <action path="/submitOrder" type="com.shop.web.SubmitOrderAction" name="orderForm">
      <forward name="success" path="/order/confirm.jsp"/>
      <forward name="failure" path="/order/retry.jsp"/>
    </action>
    <action path="/viewCart" type="com.shop.web.ViewCartAction"/>
  </action-mappings>
</struts-config>
"#;

    #[test]
    fn parses_actions_and_forwards() {
        let actions = parse_struts_config("conf/struts-config.xml", CONFIG).unwrap();
        assert_eq!(actions.len(), 2);

        let submit = &actions[0];
        assert_eq!(submit.path, "/submitOrder");
        assert_eq!(
            submit.action_class.as_deref(),
            Some("com.shop.web.SubmitOrderAction")
        );
        assert_eq!(submit.form_name.as_deref(), Some("orderForm"));
        assert_eq!(submit.forwards.len(), 2);
        assert_eq!(submit.forwards[0].target, "/order/confirm.jsp");

        assert_eq!(actions[1].path, "/viewCart");
        assert!(actions[1].forwards.is_empty());
    }

    #[test]
    fn recognizes_struts_config_names() {
        assert!(is_struts_config("WEB-INF/struts-config.xml"));
        assert!(is_struts_config("conf/struts-module.xml"));
        assert!(!is_struts_config("conf/web.xml"));
    }

    #[test]
    fn detects_action_subclass_in_chunk_text() {
        let text = "public class SubmitOrderAction extends Action {\n}";
        let caps = action_class_re().captures(text).unwrap();
        assert_eq!(&caps[1], "SubmitOrderAction");
    }
}
