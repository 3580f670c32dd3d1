//! Per-file metadata and the repository summary produced by the analyzer.

use crate::model::language::LanguageKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One file that survived the scan filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    /// Repo-relative path with forward slashes (portable key).
    pub path: String,
    /// Absolute path on disk, used only within this process.
    pub abs_path: PathBuf,
    /// `None` for files we keep as graph nodes but never parse
    /// (e.g. `.idl`, `.properties`).
    pub language: Option<LanguageKind>,
    pub size: u64,
    /// Lines of code; 0 for files we could not read as UTF-8.
    pub loc: usize,
    /// FNV-1a hash of the file contents; drives change detection.
    pub content_hash: String,
}

/// Analyzer output. Drives the parser work list and the Repository node stats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoSummary {
    pub root: PathBuf,
    pub files: Vec<FileMeta>,
    pub files_by_language: BTreeMap<String, usize>,
    pub loc_by_language: BTreeMap<String, usize>,
    pub skipped_ignored: usize,
    pub skipped_too_big: usize,
}

impl RepoSummary {
    pub fn total_loc(&self) -> usize {
        self.loc_by_language.values().sum()
    }

    /// Files the structural parser will visit.
    pub fn parseable(&self) -> impl Iterator<Item = &FileMeta> {
        self.files.iter().filter(|f| f.language.is_some())
    }
}
