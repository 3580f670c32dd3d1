//! Write path: MERGE-based upserts and relationship links in bounded
//! transactions.
//!
//! Every MERGE keys on the identity of the node (repository name, file id,
//! chunk id, pattern key, GAV coordinates), so replays converge instead of
//! duplicating. Pattern nodes are stamped with `repository_name` to make the
//! delete cascade a single property sweep.

use crate::errors::GraphStoreError;
use crate::model::{RelKind, RepositoryNode, RepositoryStats};
use chunk_prep::{CodeChunk, FileMeta, ids};
use chrono::Utc;
use legacy_patterns::PatternSet;
use neo4rs::{Graph, Query, query};
use tracing::{debug, info};

/// Queries per transaction. Keeps transactions bounded without chatting one
/// statement at a time.
const TX_BATCH: usize = 200;

pub(crate) async fn run_batched(graph: &Graph, queries: Vec<Query>) -> Result<(), GraphStoreError> {
    let mut pending = queries.into_iter().peekable();
    while pending.peek().is_some() {
        let batch: Vec<Query> = pending.by_ref().take(TX_BATCH).collect();
        let mut txn = graph.start_txn().await?;
        txn.run_queries(batch).await?;
        txn.commit().await?;
    }
    Ok(())
}

pub(crate) fn upsert_repository_query(repo: &RepositoryNode) -> Query {
    query(
        "MERGE (r:Repository {name: $name}) \
         ON CREATE SET r.created_at = $now \
         SET r.origin = $origin, r.branch = $branch, \
             r.config_snapshot = $config_snapshot, r.last_ingested_at = $now",
    )
    .param("name", repo.name.clone())
    .param("origin", repo.origin.clone())
    .param("branch", repo.branch.clone().unwrap_or_default())
    .param("config_snapshot", repo.config_snapshot.clone())
    .param("now", Utc::now().to_rfc3339())
}

pub(crate) fn update_stats_query(name: &str, stats: &RepositoryStats) -> Query {
    query(
        "MATCH (r:Repository {name: $name}) \
         SET r.file_count = $files, r.chunk_count = $chunks, r.total_loc = $loc",
    )
    .param("name", name.to_string())
    .param("files", stats.file_count as i64)
    .param("chunks", stats.chunk_count as i64)
    .param("loc", stats.total_loc as i64)
}

pub(crate) fn upsert_file_queries(repository: &str, files: &[FileMeta]) -> Vec<Query> {
    let mut out = Vec::with_capacity(files.len());
    for f in files {
        let id = ids::file_id(repository, &f.path);
        out.push(
            query(
                "MERGE (f:File {id: $id}) \
                 SET f.repository_name = $repo, f.path = $path, f.language = $language, \
                     f.size = $size, f.loc = $loc, f.content_hash = $hash \
                 WITH f \
                 MATCH (r:Repository {name: $repo}) \
                 MERGE (r)-[:CONTAINS]->(f)",
            )
            .param("id", id)
            .param("repo", repository.to_string())
            .param("path", f.path.clone())
            .param(
                "language",
                f.language.map(|l| l.to_string()).unwrap_or_else(|| String::from("other")),
            )
            .param("size", f.size as i64)
            .param("loc", f.loc as i64)
            .param("hash", f.content_hash.clone()),
        );
    }
    out
}

pub(crate) fn upsert_chunk_queries(chunks: &[CodeChunk]) -> Vec<Query> {
    let mut out = Vec::with_capacity(chunks.len());
    for c in chunks {
        let file_id = ids::file_id(&c.repository, &c.file_path);
        out.push(
            query(
                "MERGE (c:CodeChunk {id: $id}) \
                 SET c.repository_name = $repo, c.file_path = $path, c.kind = $kind, \
                     c.language = $language, c.name = $name, c.start_line = $start_line, \
                     c.end_line = $end_line, c.importance = $importance, \
                     c.business_domain = $domain, c.framework_pattern = $pattern, \
                     c.migration_complexity = $complexity \
                 WITH c \
                 MATCH (f:File {id: $file_id}) \
                 MERGE (f)-[:HAS_CHUNK]->(c)",
            )
            .param("id", c.id.clone())
            .param("repo", c.repository.clone())
            .param("path", c.file_path.clone())
            .param("kind", c.kind.to_string())
            .param("language", c.language.to_string())
            .param("name", c.name.clone())
            .param("start_line", c.span.start_line as i64)
            .param("end_line", c.span.end_line as i64)
            .param("importance", c.importance as f64)
            .param("domain", c.business_domain.clone().unwrap_or_default())
            .param("pattern", c.framework_pattern.clone().unwrap_or_default())
            .param(
                "complexity",
                c.migration_complexity
                    .map(|x| x.to_string())
                    .unwrap_or_default(),
            )
            .param("file_id", file_id),
        );
    }
    out
}

/// Pattern nodes and their relationships. Files and chunks are written
/// before this runs, so every back-pointer lands on an existing node.
pub(crate) fn upsert_pattern_queries(repository: &str, set: &PatternSet) -> Vec<Query> {
    let mut out = Vec::new();
    let repo = repository.to_string();

    for action in &set.struts_actions {
        let key = format!("{repo}|{}", action.path);
        out.push(
            query(
                "MERGE (a:StrutsAction {key: $key}) \
                 SET a.repository_name = $repo, a.path = $path, a.action_class = $class, \
                     a.form_name = $form, a.file_path = $file, a.forward_count = $forwards, \
                     a.business_purpose = $purpose, a.migration_complexity = $complexity \
                 WITH a \
                 MATCH (f:File {id: $file_id}) \
                 MERGE (f)-[:CONTAINS_STRUTS_ACTION]->(a)",
            )
            .param("key", key.clone())
            .param("repo", repo.clone())
            .param("path", action.path.clone())
            .param("class", action.action_class.clone().unwrap_or_default())
            .param("form", action.form_name.clone().unwrap_or_default())
            .param("file", action.file_path.clone())
            .param("forwards", action.forwards.len() as i64)
            .param("purpose", action.business_purpose.clone().unwrap_or_default())
            .param("complexity", action.migration_complexity.to_string())
            .param("file_id", ids::file_id(&repo, &action.file_path)),
        );

        // Forward targets that resolve to a known JSP become edges; the rest
        // stay recorded in forward_count only.
        for fwd in &action.forwards {
            if let Some(jsp) = set
                .jsp_components
                .iter()
                .find(|j| j.file_path.ends_with(fwd.target.trim_start_matches('/')))
            {
                out.push(
                    query(
                        "MATCH (a:StrutsAction {key: $key}) \
                         MATCH (j:JspComponent {key: $jsp_key}) \
                         MERGE (a)-[:FORWARDS_TO {name: $fwd}]->(j)",
                    )
                    .param("key", key.clone())
                    .param("jsp_key", format!("{repo}|{}", jsp.file_path))
                    .param("fwd", fwd.name.clone()),
                );
            }
        }
    }

    for comp in &set.jsp_components {
        out.push(
            query(
                "MERGE (j:JspComponent {key: $key}) \
                 SET j.repository_name = $repo, j.file_path = $file, \
                     j.taglibs = $taglibs, j.struts_tags = $tags, \
                     j.has_scriptlets = $scriptlets, j.business_purpose = $purpose, \
                     j.migration_complexity = $complexity \
                 WITH j \
                 MATCH (f:File {id: $file_id}) \
                 MERGE (f)-[:CONTAINS]->(j)",
            )
            .param("key", format!("{repo}|{}", comp.file_path))
            .param("repo", repo.clone())
            .param("file", comp.file_path.clone())
            .param("taglibs", comp.taglibs.join(";"))
            .param("tags", comp.struts_tags.join(";"))
            .param("scriptlets", comp.has_scriptlets)
            .param("purpose", comp.business_purpose.clone().unwrap_or_default())
            .param("complexity", comp.migration_complexity.to_string())
            .param("file_id", ids::file_id(&repo, &comp.file_path)),
        );
    }

    for corba in &set.corba_interfaces {
        out.push(
            query(
                "MERGE (i:CorbaInterface {key: $key}) \
                 SET i.repository_name = $repo, i.name = $name, i.operations = $ops, \
                     i.file_path = $file, i.business_purpose = $purpose, \
                     i.migration_complexity = $complexity \
                 WITH i \
                 MATCH (f:File {id: $file_id}) \
                 MERGE (f)-[:CONTAINS]->(i)",
            )
            .param("key", format!("{repo}|{}", corba.name))
            .param("repo", repo.clone())
            .param("name", corba.name.clone())
            .param("ops", corba.operations.join(";"))
            .param("file", corba.file_path.clone())
            .param("purpose", corba.business_purpose.clone().unwrap_or_default())
            .param("complexity", corba.migration_complexity.to_string())
            .param("file_id", ids::file_id(&repo, &corba.file_path)),
        );
    }

    for call in &set.corba_client_calls {
        if let Some(interface) = &call.interface {
            out.push(
                query(
                    "MATCH (c:CodeChunk {id: $chunk_id}) \
                     MATCH (i:CorbaInterface {key: $key}) \
                     MERGE (c)-[:CALLS_SERVICE]->(i)",
                )
                .param("chunk_id", call.chunk_id.clone())
                .param("key", format!("{repo}|{interface}")),
            );
        }
    }

    for rule in &set.business_rules {
        out.push(
            query(
                "MERGE (b:BusinessRule {id: $id}) \
                 SET b.repository_name = $repo, b.description = $description, \
                     b.file_path = $file, b.line = $line, b.business_purpose = $purpose, \
                     b.migration_complexity = $complexity \
                 WITH b \
                 MATCH (c:CodeChunk {id: $chunk_id}) \
                 MERGE (c)-[:IMPLEMENTS_BUSINESS_RULE]->(b)",
            )
            .param("id", rule.id.clone())
            .param("repo", repo.clone())
            .param("description", rule.description.clone())
            .param("file", rule.file_path.clone())
            .param("line", rule.line as i64)
            .param("purpose", rule.business_purpose.clone().unwrap_or_default())
            .param("complexity", rule.migration_complexity.to_string())
            .param("chunk_id", rule.source_chunk_id.clone()),
        );
    }

    if let Some(maven) = &set.maven {
        let project_coords = maven.project.coordinates();
        out.push(artifact_query(&maven.project));
        for dep in &maven.dependencies {
            out.push(artifact_query(dep));
            // repo -> artifact and project-artifact -> artifact
            out.push(
                query(
                    "MATCH (r:Repository {name: $repo}) \
                     MATCH (a:MavenArtifact {coordinates: $coords}) \
                     MERGE (r)-[:DEPENDS_ON {scope: $scope}]->(a)",
                )
                .param("repo", repo.clone())
                .param("coords", dep.coordinates())
                .param("scope", dep.scope.clone().unwrap_or_default()),
            );
            out.push(
                query(
                    "MATCH (p:MavenArtifact {coordinates: $project}) \
                     MATCH (a:MavenArtifact {coordinates: $coords}) \
                     MERGE (p)-[:DEPENDS_ON {scope: $scope}]->(a)",
                )
                .param("project", project_coords.clone())
                .param("coords", dep.coordinates())
                .param("scope", dep.scope.clone().unwrap_or_default()),
            );
        }
    }

    out
}

fn artifact_query(artifact: &legacy_patterns::MavenArtifact) -> Query {
    query(
        "MERGE (a:MavenArtifact {coordinates: $coords}) \
         SET a.group_id = $group, a.artifact_id = $artifact, a.version = $version, \
             a.scope = $scope, a.optional = $optional",
    )
    .param("coords", artifact.coordinates())
    .param("group", artifact.group_id.clone())
    .param("artifact", artifact.artifact_id.clone())
    .param("version", artifact.version.clone())
    .param("scope", artifact.scope.clone().unwrap_or_default())
    .param("optional", artifact.optional)
}

/// Generic whitelisted link between two already-written nodes.
pub(crate) fn link_query(
    src_label: &str,
    src_key_prop: &str,
    src_key: &str,
    rel: RelKind,
    dst_label: &str,
    dst_key_prop: &str,
    dst_key: &str,
) -> Query {
    let q = format!(
        "MATCH (s:{src_label} {{{src_key_prop}: $src}}) \
         MATCH (d:{dst_label} {{{dst_key_prop}: $dst}}) \
         MERGE (s)-[:{}]->(d)",
        rel.as_cypher()
    );
    query(&q)
        .param("src", src_key.to_string())
        .param("dst", dst_key.to_string())
}

pub(crate) async fn delete_repository(graph: &Graph, name: &str) -> Result<(), GraphStoreError> {
    info!("graph: cascade delete of repository '{}'", name);
    // Everything stamped with the repository goes, including the Repository
    // node itself.
    graph
        .run(
            query("MATCH (n) WHERE n.repository_name = $name DETACH DELETE n")
                .param("name", name.to_string()),
        )
        .await?;
    graph
        .run(query("MATCH (r:Repository {name: $name}) DETACH DELETE r").param("name", name.to_string()))
        .await?;
    // Maven artifacts are global by coordinates; sweep the ones nothing
    // depends on anymore.
    graph
        .run(query(
            "MATCH (a:MavenArtifact) WHERE NOT (a)--() DELETE a",
        ))
        .await?;
    debug!("graph: delete of '{}' complete", name);
    Ok(())
}
