//! Chunking configuration.
//!
//! Loaded from environment variables with defaults; the ingest request may
//! override individual fields per repository. Validation runs before any task
//! is admitted.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;

/// Hard upper cap on a single chunk's byte size. Chunks beyond it are split
/// at line boundaries regardless of the configured line caps.
pub const HARD_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Glob patterns of files to include. Empty means "everything".
    pub include_globs: Vec<String>,
    /// Glob patterns of files to exclude.
    pub exclude_globs: Vec<String>,
    /// Files strictly larger than this never enter the pipeline.
    pub max_file_bytes: u64,
    /// Chunks shorter than this are merged into the previous chunk of the
    /// same kind.
    pub chunk_min_lines: usize,
    /// Chunks longer than this are split at line boundaries.
    pub chunk_max_lines: usize,
    /// Overlap between raw-text fallback windows.
    pub chunk_overlap_lines: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            include_globs: vec![],
            exclude_globs: vec![
                String::from("**/.git/**"),
                String::from("**/node_modules/**"),
                String::from("**/build/**"),
                String::from("**/target/**"),
                String::from("**/*.min.js"),
            ],
            max_file_bytes: 2 * 1024 * 1024, // 2 MB
            chunk_min_lines: 4,
            chunk_max_lines: 200,
            chunk_overlap_lines: 10,
        }
    }
}

impl ChunkConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// Supported vars (all optional): `INCLUDE_GLOBS`, `EXCLUDE_GLOBS`
    /// (comma-separated), `MAX_FILE_BYTES`, `CHUNK_MIN_LINES`,
    /// `CHUNK_MAX_LINES`, `CHUNK_OVERLAP_LINES`.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(v) = env_list("INCLUDE_GLOBS") {
            cfg.include_globs = v;
        }
        if let Some(v) = env_list("EXCLUDE_GLOBS") {
            cfg.exclude_globs = v;
        }
        if let Some(v) = env_parse::<u64>("MAX_FILE_BYTES") {
            cfg.max_file_bytes = v;
        }
        if let Some(v) = env_parse::<usize>("CHUNK_MIN_LINES") {
            cfg.chunk_min_lines = v;
        }
        if let Some(v) = env_parse::<usize>("CHUNK_MAX_LINES") {
            cfg.chunk_max_lines = v;
        }
        if let Some(v) = env_parse::<usize>("CHUNK_OVERLAP_LINES") {
            cfg.chunk_overlap_lines = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_file_bytes == 0 {
            return Err(anyhow!("max_file_bytes must be greater than 0"));
        }
        if self.chunk_max_lines == 0 {
            return Err(anyhow!("chunk_max_lines must be greater than 0"));
        }
        if self.chunk_min_lines >= self.chunk_max_lines {
            return Err(anyhow!(
                "chunk_min_lines ({}) must be below chunk_max_lines ({})",
                self.chunk_min_lines,
                self.chunk_max_lines
            ));
        }
        if self.chunk_overlap_lines >= self.chunk_max_lines {
            return Err(anyhow!(
                "chunk_overlap_lines ({}) must be below chunk_max_lines ({})",
                self.chunk_overlap_lines,
                self.chunk_max_lines
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = env::var(key).ok()?;
    let list = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect::<Vec<_>>();
    Some(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ChunkConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_line_caps() {
        let cfg = ChunkConfig {
            chunk_min_lines: 300,
            chunk_max_lines: 200,
            ..ChunkConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
