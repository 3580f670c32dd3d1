//! Maven POM extraction: project coordinates and declared dependencies.

use crate::model::{MavenArtifact, MavenProject};
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

pub(crate) fn is_pom(path: &str) -> bool {
    path.rsplit('/').next() == Some("pom.xml")
}

#[derive(Default, Clone)]
struct Gav {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    scope: Option<String>,
    optional: bool,
}

/// Parse one `pom.xml`. Dependencies under `<dependencyManagement>` are
/// declarations, not uses; only `<project><dependencies>` entries count.
/// Missing project coordinates fall back to the `<parent>` block.
pub(crate) fn parse_pom(file_path: &str, xml: &str) -> Result<MavenProject, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<String> = Vec::new();
    let mut project = Gav::default();
    let mut parent = Gav::default();
    let mut current_dep: Option<Gav> = None;
    let mut dependencies: Vec<MavenArtifact> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                stack.push(name);
                if path_is(&stack, &["project", "dependencies", "dependency"]) {
                    current_dep = Some(Gav::default());
                }
            }
            Event::Text(t) => {
                let value = match t.unescape() {
                    Ok(v) => v.trim().to_string(),
                    Err(_) => continue,
                };
                if value.is_empty() {
                    continue;
                }
                // Depth 4 = a direct child of <dependency>; anything deeper
                // (exclusions and friends) must not clobber the GAV fields.
                let direct_dep_child = stack.len() == 4;
                if let Some(dep) = current_dep.as_mut().filter(|_| direct_dep_child) {
                    match last(&stack) {
                        "groupId" => dep.group_id = Some(value),
                        "artifactId" => dep.artifact_id = Some(value),
                        "version" => dep.version = Some(value),
                        "scope" => dep.scope = Some(value),
                        "optional" => dep.optional = value == "true",
                        _ => {}
                    }
                } else if path_is(&stack, &["project", "groupId"]) {
                    project.group_id = Some(value);
                } else if path_is(&stack, &["project", "artifactId"]) {
                    project.artifact_id = Some(value);
                } else if path_is(&stack, &["project", "version"]) {
                    project.version = Some(value);
                } else if path_is(&stack, &["project", "parent", "groupId"]) {
                    parent.group_id = Some(value);
                } else if path_is(&stack, &["project", "parent", "version"]) {
                    parent.version = Some(value);
                }
            }
            Event::End(_) => {
                if path_is(&stack, &["project", "dependencies", "dependency"]) {
                    if let Some(dep) = current_dep.take() {
                        if let Some(artifact) = finish(dep, file_path) {
                            dependencies.push(artifact);
                        }
                    }
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // Parent coordinates stand in for inherited fields.
    let project = MavenArtifact {
        group_id: project
            .group_id
            .or(parent.group_id)
            .unwrap_or_else(|| String::from("unknown")),
        artifact_id: project
            .artifact_id
            .unwrap_or_else(|| String::from("unknown")),
        version: project
            .version
            .or(parent.version)
            .unwrap_or_else(|| String::from("unknown")),
        scope: None,
        optional: false,
        file_path: file_path.to_string(),
    };

    debug!(
        "maven: {} with {} dependencies in {}",
        project.coordinates(),
        dependencies.len(),
        file_path
    );
    Ok(MavenProject {
        project,
        dependencies,
    })
}

fn finish(gav: Gav, file_path: &str) -> Option<MavenArtifact> {
    Some(MavenArtifact {
        group_id: gav.group_id?,
        artifact_id: gav.artifact_id?,
        version: gav.version.unwrap_or_else(|| String::from("managed")),
        scope: gav.scope,
        optional: gav.optional,
        file_path: file_path.to_string(),
    })
}

fn path_is(stack: &[String], expected: &[&str]) -> bool {
    stack.len() == expected.len() && stack.iter().zip(expected).all(|(a, b)| a == b)
}

fn last(stack: &[String]) -> &str {
    stack.last().map(String::as_str).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    const POM: &str = r#"<?xml version="1.0"?>
<project>
  <parent>
    <groupId>com.shop</groupId>
    <version>2.4</version>
  </parent>
  <artifactId>shop-web</artifactId>
  <dependencies>
    <dependency>
      <groupId>org.apache.struts</groupId>
      <artifactId>struts-core</artifactId>
      <version>1.3.10</version>
    </dependency>
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
      <version>4.12</version>
      <scope>test</scope>
      <optional>true</optional>
    </dependency>
  </dependencies>
  <dependencyManagement>
    <dependencies>
      <dependency>
        <groupId>com.shop</groupId>
        <artifactId>managed-only</artifactId>
        <version>1.0</version>
      </dependency>
    </dependencies>
  </dependencyManagement>
</project>
"#;

    #[test]
    fn project_inherits_parent_coordinates() {
        let pom = parse_pom("pom.xml", POM).unwrap();
        assert_eq!(pom.project.coordinates(), "com.shop:shop-web:2.4");
    }

    #[test]
    fn declared_dependencies_with_scope_and_optional() {
        let pom = parse_pom("pom.xml", POM).unwrap();
        assert_eq!(pom.dependencies.len(), 2);

        let struts = &pom.dependencies[0];
        assert_eq!(struts.coordinates(), "org.apache.struts:struts-core:1.3.10");
        assert_eq!(struts.scope, None);
        assert!(!struts.optional);

        let junit = &pom.dependencies[1];
        assert_eq!(junit.scope.as_deref(), Some("test"));
        assert!(junit.optional);
    }

    #[test]
    fn exclusions_do_not_clobber_dependency_coordinates() {
        let pom = r#"<project>
  <groupId>com.shop</groupId>
  <artifactId>app</artifactId>
  <version>1.0</version>
  <dependencies>
    <dependency>
      <groupId>org.apache.struts</groupId>
      <artifactId>struts-core</artifactId>
      <version>1.3.10</version>
      <exclusions>
        <exclusion>
          <groupId>commons-logging</groupId>
          <artifactId>commons-logging</artifactId>
        </exclusion>
      </exclusions>
    </dependency>
  </dependencies>
</project>"#;
        let parsed = parse_pom("pom.xml", pom).unwrap();
        assert_eq!(
            parsed.dependencies[0].coordinates(),
            "org.apache.struts:struts-core:1.3.10"
        );
    }

    #[test]
    fn dependency_management_is_ignored() {
        let pom = parse_pom("pom.xml", POM).unwrap();
        assert!(
            pom.dependencies
                .iter()
                .all(|d| d.artifact_id != "managed-only")
        );
    }
}
