//! Framework-pattern nodes: legacy constructs promoted to first-class graph
//! citizens. Identity is the canonical name within each kind; ids never
//! change on re-ingest.

use chunk_prep::MigrationComplexity;
use serde::{Deserialize, Serialize};

/// A `<forward>` inside a Struts action mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionForward {
    pub name: String,
    pub target: String,
}

/// One `<action>` mapping from `struts-config.xml`, possibly matched to its
/// Java `Action` subclass chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrutsAction {
    /// Identity: the action path (e.g. `/submitOrder`).
    pub path: String,
    pub action_class: Option<String>,
    pub form_name: Option<String>,
    pub forwards: Vec<ActionForward>,
    /// Repo-relative path of the defining config file.
    pub file_path: String,
    /// Chunk ids this finding points back to (config block, Java class).
    pub source_chunk_ids: Vec<String>,
    pub business_purpose: Option<String>,
    pub migration_complexity: MigrationComplexity,
}

/// A CORBA IDL interface with its operation signatures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorbaInterface {
    /// Identity: the interface name.
    pub name: String,
    pub operations: Vec<String>,
    pub file_path: String,
    pub business_purpose: Option<String>,
    pub migration_complexity: MigrationComplexity,
}

/// A JSP page/fragment with its Struts tag usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JspComponent {
    /// Identity: the repo-relative file path.
    pub file_path: String,
    pub taglibs: Vec<String>,
    /// Struts tags seen in the markup (`html:form`, `logic:iterate`, ...).
    pub struts_tags: Vec<String>,
    /// Targets of `<html:form action="...">`.
    pub form_actions: Vec<String>,
    pub has_scriptlets: bool,
    pub source_chunk_ids: Vec<String>,
    pub business_purpose: Option<String>,
    pub migration_complexity: MigrationComplexity,
}

/// A business rule mined from validation logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessRule {
    /// Identity: hash of location + text.
    pub id: String,
    pub description: String,
    pub file_path: String,
    pub line: usize,
    pub source_chunk_id: String,
    pub business_purpose: Option<String>,
    pub migration_complexity: MigrationComplexity,
}

/// A Maven artifact (the project itself or a declared dependency).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MavenArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub optional: bool,
    pub file_path: String,
}

impl MavenArtifact {
    /// Identity: GAV coordinates.
    pub fn coordinates(&self) -> String {
        format!("{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

/// The project artifact plus its declared dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MavenProject {
    pub project: MavenArtifact,
    pub dependencies: Vec<MavenArtifact>,
}

/// A Java chunk observed calling into CORBA (for `CALLS_SERVICE` edges).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorbaClientCall {
    pub chunk_id: String,
    pub file_path: String,
    /// Interface name when it can be derived from `XxxHelper.narrow(...)`.
    pub interface: Option<String>,
}

/// Everything the extractor found in one repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternSet {
    pub struts_actions: Vec<StrutsAction>,
    pub jsp_components: Vec<JspComponent>,
    pub corba_interfaces: Vec<CorbaInterface>,
    pub corba_client_calls: Vec<CorbaClientCall>,
    pub business_rules: Vec<BusinessRule>,
    pub maven: Option<MavenProject>,
}

impl PatternSet {
    pub fn is_empty(&self) -> bool {
        self.struts_actions.is_empty()
            && self.jsp_components.is_empty()
            && self.corba_interfaces.is_empty()
            && self.corba_client_calls.is_empty()
            && self.business_rules.is_empty()
            && self.maven.is_none()
    }
}
