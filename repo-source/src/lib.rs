//! Source acquisition: turn an ingest source into a local working tree.
//!
//! Remote sources are shallow-cloned with `git2` into a per-repository
//! directory under the configured workspace; local sources are validated and
//! used in place (read-only). Cloning is blocking work; callers on an async
//! runtime wrap [`acquire`] in `spawn_blocking`.

mod clone;
mod errors;

pub use errors::SourceError;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Credentials for remote sources. Token auth covers HTTPS; an SSH key path
/// covers git-over-SSH remotes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub ssh_key_path: Option<PathBuf>,
}

/// Where a repository comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    Remote {
        url: String,
        #[serde(default)]
        branch: Option<String>,
        #[serde(default)]
        credentials: Option<Credentials>,
    },
    Local {
        local_path: PathBuf,
    },
}

/// A usable local tree plus where it came from.
#[derive(Debug, Clone)]
pub struct WorkingTree {
    pub root: PathBuf,
    /// Original URL or path, recorded on the Repository node.
    pub origin: String,
    pub branch: Option<String>,
    /// True when we own the directory (cloned), false for local sources.
    pub cloned: bool,
}

/// Produce a working tree for `spec`.
///
/// Remote: shallow clone into `<workspace_dir>/<repo_name>`, replacing any
/// previous checkout (whole-repo re-ingest, no incremental fetch).
/// Local: validate that the path exists and is a directory.
///
/// # Errors
/// [`SourceError::Unavailable`] for unreachable URLs, auth failures, or a
/// missing local path.
pub fn acquire(
    spec: &SourceSpec,
    workspace_dir: &Path,
    repo_name: &str,
) -> Result<WorkingTree, SourceError> {
    match spec {
        SourceSpec::Local { local_path } => {
            let root = dunce::canonicalize(local_path).map_err(|_| {
                SourceError::Unavailable(format!(
                    "local path does not exist: {}",
                    local_path.display()
                ))
            })?;
            if !root.is_dir() {
                return Err(SourceError::Unavailable(format!(
                    "local path is not a directory: {}",
                    root.display()
                )));
            }
            info!("source: using local tree {}", root.display());
            Ok(WorkingTree {
                origin: local_path.to_string_lossy().to_string(),
                root,
                branch: None,
                cloned: false,
            })
        }
        SourceSpec::Remote {
            url,
            branch,
            credentials,
        } => {
            let target = workspace_dir.join(sanitize_dir_name(repo_name));
            if target.exists() {
                info!("source: removing previous checkout {}", target.display());
                fs::remove_dir_all(&target)?;
            }
            fs::create_dir_all(workspace_dir)?;

            clone::shallow_clone(url, branch.as_deref(), credentials.as_ref(), &target)?;
            Ok(WorkingTree {
                root: target,
                origin: url.clone(),
                branch: branch.clone(),
                cloned: true,
            })
        }
    }
}

/// Keep checkout directory names tame regardless of what the caller sends.
fn sanitize_dir_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_path_is_validated() {
        let tmp = tempfile::tempdir().unwrap();
        let tree = acquire(
            &SourceSpec::Local {
                local_path: tmp.path().to_path_buf(),
            },
            Path::new("/unused"),
            "demo",
        )
        .unwrap();
        assert!(!tree.cloned);
        assert!(tree.root.is_dir());
    }

    #[test]
    fn missing_local_path_is_unavailable() {
        let err = acquire(
            &SourceSpec::Local {
                local_path: PathBuf::from("/definitely/not/here"),
            },
            Path::new("/unused"),
            "demo",
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }

    #[test]
    fn file_as_local_path_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();
        let err = acquire(
            &SourceSpec::Local { local_path: file },
            Path::new("/unused"),
            "demo",
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }

    #[test]
    fn dir_names_are_sanitized() {
        assert_eq!(sanitize_dir_name("billing/core v2"), "billing_core_v2");
    }
}
