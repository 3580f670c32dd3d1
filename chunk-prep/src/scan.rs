//! Filesystem scanning and repository analysis.
//!
//! Produces the work list for the parser and the aggregate stats that end up
//! on the Repository graph node. Binaries, oversized files, and excluded
//! paths never reach later stages.

use crate::{
    config::ChunkConfig,
    ids::hash_content,
    model::language::detect_language,
    model::summary::{FileMeta, RepoSummary},
};
use anyhow::{Result, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::{fs, path::Path};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Walk the tree, filter, classify, and count.
///
/// A file is kept when it matches the include globs (or none are configured),
/// does not match the exclude globs, and its size is at most
/// `max_file_bytes`. A file of exactly the cap is included.
pub fn analyze_repo(root: &Path, cfg: &ChunkConfig) -> Result<RepoSummary> {
    if !root.is_dir() {
        bail!("scan: root is not a directory: {}", root.display());
    }
    let root = dunce::canonicalize(root)?;

    info!("scan: start -> {}", root.display());

    let include = build_globset(&cfg.include_globs);
    let exclude = build_globset(&cfg.exclude_globs);

    let mut summary = RepoSummary {
        root: root.clone(),
        ..RepoSummary::default()
    };

    let walker = WalkDir::new(&root)
        .follow_links(true)
        .into_iter()
        .filter_entry(keep_entry);

    for entry in walker.filter_map(std::result::Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel = relative_key(&root, path);

        if let Some(inc) = include.as_ref() {
            if !inc.is_match(&rel) {
                summary.skipped_ignored += 1;
                continue;
            }
        }
        if let Some(exc) = exclude.as_ref() {
            if exc.is_match(&rel) {
                summary.skipped_ignored += 1;
                debug!("scan: exclude (glob) {}", rel);
                continue;
            }
        }

        let meta = match fs::metadata(path) {
            Ok(m) => m,
            Err(err) => {
                warn!("scan: metadata failed for {}: {}", path.display(), err);
                continue;
            }
        };
        let size = meta.len();
        if size > cfg.max_file_bytes {
            summary.skipped_too_big += 1;
            debug!(
                "scan: skip (size {} > max {}) {}",
                size, cfg.max_file_bytes, rel
            );
            continue;
        }

        let language = detect_language(path);
        let (loc, content_hash) = match fs::read(path) {
            Ok(bytes) => {
                let hash = hash_content(&bytes);
                let loc = match std::str::from_utf8(&bytes) {
                    Ok(text) => text.lines().count(),
                    Err(_) => 0,
                };
                (loc, hash)
            }
            Err(err) => {
                warn!("scan: read failed for {}: {}", rel, err);
                continue;
            }
        };

        if let Some(lang) = language {
            let key = lang.to_string();
            *summary.files_by_language.entry(key.clone()).or_insert(0) += 1;
            *summary.loc_by_language.entry(key).or_insert(0) += loc;
        }

        summary.files.push(FileMeta {
            path: rel,
            abs_path: path.to_path_buf(),
            language,
            size,
            loc,
            content_hash,
        });
    }

    // Stable ordering: the parser work list and all downstream ids must not
    // depend on directory iteration order.
    summary.files.sort_by(|a, b| a.path.cmp(&b.path));

    info!(
        "scan: done, kept={} (ignored={}, too_big={})",
        summary.files.len(),
        summary.skipped_ignored,
        summary.skipped_too_big
    );
    Ok(summary)
}

/// Coarse directory filter to avoid descending into heavy/vendor folders.
fn keep_entry(entry: &DirEntry) -> bool {
    if entry.file_type().is_dir() {
        if let Some(name) = entry.file_name().to_str() {
            return !matches!(
                name,
                ".git" | "node_modules" | "build" | "target" | ".idea" | ".vscode" | ".svn"
            );
        }
    }
    true
}

/// Repo-relative key with forward slashes, portable across stores.
fn relative_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for p in patterns {
        match Glob::new(p) {
            Ok(g) => {
                builder.add(g);
            }
            Err(err) => warn!("scan: bad glob '{}': {}", p, err),
        }
    }
    builder.build().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn size_cap_is_inclusive() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "at_cap.java", "class A {}\n");
        write(tmp.path(), "over_cap.java", "class Bbb {}\n");

        let at_cap = fs::metadata(tmp.path().join("at_cap.java")).unwrap().len();
        let cfg = ChunkConfig {
            max_file_bytes: at_cap,
            exclude_globs: vec![],
            ..ChunkConfig::default()
        };

        let summary = analyze_repo(tmp.path(), &cfg).unwrap();
        let kept: Vec<_> = summary.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(kept, vec!["at_cap.java"]);
        assert_eq!(summary.skipped_too_big, 1);
    }

    #[test]
    fn exclude_globs_win_and_counts_accumulate() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "src/A.java", "class A {\n}\n");
        write(tmp.path(), "src/B.java", "class B {\n}\n");
        write(tmp.path(), "gen/C.java", "class C {}\n");

        let cfg = ChunkConfig {
            exclude_globs: vec![String::from("gen/**")],
            ..ChunkConfig::default()
        };
        let summary = analyze_repo(tmp.path(), &cfg).unwrap();

        assert_eq!(summary.files.len(), 2);
        assert_eq!(summary.files_by_language.get("java"), Some(&2));
        assert_eq!(summary.loc_by_language.get("java"), Some(&4));
        assert_eq!(summary.skipped_ignored, 1);
    }

    #[test]
    fn work_list_order_is_stable() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "b.py", "x = 1\n");
        write(tmp.path(), "a.py", "y = 2\n");

        let summary = analyze_repo(tmp.path(), &ChunkConfig::default()).unwrap();
        let paths: Vec<_> = summary.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "b.py"]);
    }
}
