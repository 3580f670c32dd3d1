//! Framework-pattern extraction for legacy Java webapps.
//!
//! Takes the analyzer's file list and the parser's chunks, reads the
//! framework artifacts (`struts-config.xml`, `pom.xml`, `*.idl`, `*.jsp`),
//! and produces [`PatternSet`]: business-level findings that become
//! first-class graph nodes. [`annotate_chunks`] then writes each finding's
//! tags back onto the chunks it originated from so the vector store carries
//! them as filterable metadata.
//!
//! Every finding is deterministic: identity keys (action paths, GAV
//! coordinates, rule hashes) and complexity scores depend only on the
//! repository contents.

mod complexity;
mod corba;
mod jsp;
mod maven;
mod model;
mod purpose;
mod rules;
mod struts;

pub use model::{
    ActionForward, BusinessRule, CorbaClientCall, CorbaInterface, JspComponent, MavenArtifact,
    MavenProject, PatternSet, StrutsAction,
};

use chunk_prep::{CodeChunk, FileMeta, LanguageKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use tracing::{debug, info, warn};

/// Which extractors to run; mirrors the ingest request options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PatternOptions {
    pub parse_maven: bool,
    pub parse_jsp: bool,
    pub parse_corba: bool,
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self {
            parse_maven: true,
            parse_jsp: true,
            parse_corba: true,
        }
    }
}

/// Run all enabled extractors over one repository.
///
/// Unreadable or malformed framework files are warnings, not failures: the
/// rest of the repository still ingests.
pub fn extract_patterns(
    files: &[FileMeta],
    chunks: &[CodeChunk],
    opts: &PatternOptions,
) -> PatternSet {
    let mut set = PatternSet::default();

    for file in files {
        if struts::is_struts_config(&file.path) {
            match read(file) {
                Some(xml) => match struts::parse_struts_config(&file.path, &xml) {
                    Ok(mut actions) => set.struts_actions.append(&mut actions),
                    Err(e) => warn!("patterns: bad struts config {}: {}", file.path, e),
                },
                None => continue,
            }
        } else if opts.parse_maven && maven::is_pom(&file.path) {
            if let Some(xml) = read(file) {
                match maven::parse_pom(&file.path, &xml) {
                    // One project POM wins; module POMs only add dependencies.
                    Ok(pom) => match set.maven.as_mut() {
                        Some(existing) => {
                            existing.dependencies.extend(pom.dependencies);
                        }
                        None => set.maven = Some(pom),
                    },
                    Err(e) => warn!("patterns: bad pom {}: {}", file.path, e),
                }
            }
        } else if opts.parse_corba && file.path.ends_with(".idl") {
            if let Some(idl) = read(file) {
                set.corba_interfaces
                    .append(&mut corba::parse_idl(&file.path, &idl));
            }
        } else if opts.parse_jsp && file.language == Some(LanguageKind::Jsp) {
            if let Some(text) = read(file) {
                set.jsp_components
                    .push(jsp::component_for(&file.path, &text, chunks));
            }
        }
    }

    struts::bind_action_classes(&mut set.struts_actions, chunks);
    if opts.parse_corba {
        set.corba_client_calls = corba::find_client_calls(chunks);
    }
    set.business_rules = rules::mine_rules(chunks);

    if let Some(pom) = set.maven.as_mut() {
        pom.dependencies
            .sort_by(|a, b| a.coordinates().cmp(&b.coordinates()));
        pom.dependencies
            .dedup_by(|a, b| a.coordinates() == b.coordinates());
    }

    info!(
        "patterns: actions={} jsp={} corba={} rules={} maven_deps={}",
        set.struts_actions.len(),
        set.jsp_components.len(),
        set.corba_interfaces.len(),
        set.business_rules.len(),
        set.maven.as_ref().map_or(0, |m| m.dependencies.len())
    );
    set
}

/// Write pattern tags back onto the originating chunks.
pub fn annotate_chunks(chunks: &mut [CodeChunk], set: &PatternSet) {
    let mut tags: HashMap<&str, (&'static str, Option<String>, chunk_prep::MigrationComplexity)> =
        HashMap::new();

    for action in &set.struts_actions {
        for id in &action.source_chunk_ids {
            tags.insert(
                id,
                (
                    "struts_action",
                    action.business_purpose.clone(),
                    action.migration_complexity,
                ),
            );
        }
    }
    for comp in &set.jsp_components {
        for id in &comp.source_chunk_ids {
            tags.insert(
                id,
                (
                    "jsp_component",
                    comp.business_purpose.clone(),
                    comp.migration_complexity,
                ),
            );
        }
    }
    for call in &set.corba_client_calls {
        tags.insert(
            &call.chunk_id,
            ("corba_client", None, complexity::score_corba()),
        );
    }
    for rule in &set.business_rules {
        tags.insert(
            &rule.source_chunk_id,
            (
                "business_rule",
                rule.business_purpose.clone(),
                rule.migration_complexity,
            ),
        );
    }

    for chunk in chunks.iter_mut() {
        if let Some((pattern, purpose, complexity)) = tags.get(chunk.id.as_str()) {
            chunk.framework_pattern = Some((*pattern).to_string());
            if chunk.business_domain.is_none() {
                chunk.business_domain = purpose.clone();
            }
            chunk.migration_complexity = Some(*complexity);
        }
    }

    debug!("patterns: annotated {} chunks", tags.len());
}

fn read(file: &FileMeta) -> Option<String> {
    match fs::read_to_string(&file.abs_path) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("patterns: cannot read {}: {}", file.path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk_prep::{ChunkKind, Span};

    fn java_chunk(id: &str, text: &str) -> CodeChunk {
        CodeChunk {
            id: id.to_string(),
            repository: String::from("shop"),
            file_path: String::from("src/SubmitOrderAction.java"),
            language: LanguageKind::Java,
            kind: ChunkKind::Class,
            name: String::from("SubmitOrderAction"),
            text: text.to_string(),
            span: Span::new(0, text.len(), 1, 10),
            importance: 0.9,
            business_domain: None,
            framework_pattern: None,
            migration_complexity: None,
        }
    }

    #[test]
    fn annotation_round_trip() {
        let chunk = java_chunk(
            "chunk-1",
            "public class SubmitOrderAction extends Action { }",
        );
        let mut chunks = vec![chunk];

        let mut set = PatternSet::default();
        set.struts_actions.push(StrutsAction {
            path: String::from("/submitOrder"),
            action_class: Some(String::from("SubmitOrderAction")),
            form_name: None,
            forwards: vec![],
            file_path: String::from("conf/struts-config.xml"),
            source_chunk_ids: vec![String::from("chunk-1")],
            business_purpose: Some(String::from("ordering")),
            migration_complexity: chunk_prep::MigrationComplexity::Medium,
        });

        annotate_chunks(&mut chunks, &set);
        assert_eq!(chunks[0].framework_pattern.as_deref(), Some("struts_action"));
        assert_eq!(chunks[0].business_domain.as_deref(), Some("ordering"));
        assert_eq!(
            chunks[0].migration_complexity,
            Some(chunk_prep::MigrationComplexity::Medium)
        );
    }
}
