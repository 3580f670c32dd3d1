//! The ingest trigger contract.

use chunk_prep::ChunkConfig;
use legacy_patterns::PatternOptions;
use repo_source::SourceSpec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Per-request knobs; unset fields inherit the service defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOptions {
    #[serde(default = "default_true")]
    pub parse_maven: bool,
    #[serde(default = "default_true")]
    pub parse_jsp: bool,
    #[serde(default = "default_true")]
    pub parse_corba: bool,
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub max_file_bytes: Option<u64>,
    #[serde(default)]
    pub chunk_min_lines: Option<usize>,
    #[serde(default)]
    pub chunk_max_lines: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            parse_maven: true,
            parse_jsp: true,
            parse_corba: true,
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            max_file_bytes: None,
            chunk_min_lines: None,
            chunk_max_lines: None,
        }
    }
}

impl IngestOptions {
    /// Overlay request options onto the service chunking defaults.
    pub fn chunk_config(&self, base: &ChunkConfig) -> ChunkConfig {
        let mut cfg = base.clone();
        if !self.include_globs.is_empty() {
            cfg.include_globs = self.include_globs.clone();
        }
        if !self.exclude_globs.is_empty() {
            cfg.exclude_globs = self.exclude_globs.clone();
        }
        if let Some(v) = self.max_file_bytes {
            cfg.max_file_bytes = v;
        }
        if let Some(v) = self.chunk_min_lines {
            cfg.chunk_min_lines = v;
        }
        if let Some(v) = self.chunk_max_lines {
            cfg.chunk_max_lines = v;
        }
        cfg
    }

    pub fn pattern_options(&self) -> PatternOptions {
        PatternOptions {
            parse_maven: self.parse_maven,
            parse_jsp: self.parse_jsp,
            parse_corba: self.parse_corba,
        }
    }
}

/// One ingestion trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Unique repository name; doubles as the vector collection suffix.
    pub repository_name: String,
    pub source: SourceSpec,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub options: IngestOptions,
}

impl IngestRequest {
    pub fn validate(&self) -> Result<(), String> {
        let name = self.repository_name.trim();
        if name.is_empty() {
            return Err(String::from("repository_name must not be empty"));
        }
        if name.len() > 128 {
            return Err(String::from("repository_name too long (max 128)"));
        }
        if let (Some(min), Some(max)) = (self.options.chunk_min_lines, self.options.chunk_max_lines)
        {
            if min >= max {
                return Err(format!(
                    "chunk_min_lines ({min}) must be below chunk_max_lines ({max})"
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn request(name: &str) -> IngestRequest {
        IngestRequest {
            repository_name: name.to_string(),
            source: SourceSpec::Local {
                local_path: PathBuf::from("/tmp/repo"),
            },
            priority: Priority::default(),
            options: IngestOptions::default(),
        }
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(request("  ").validate().is_err());
        assert!(request("legacy-shop").validate().is_ok());
    }

    #[test]
    fn options_overlay_only_set_fields() {
        let base = ChunkConfig::default();
        let opts = IngestOptions {
            max_file_bytes: Some(1024),
            exclude_globs: vec![String::from("**/gen/**")],
            ..IngestOptions::default()
        };
        let cfg = opts.chunk_config(&base);
        assert_eq!(cfg.max_file_bytes, 1024);
        assert_eq!(cfg.exclude_globs, vec![String::from("**/gen/**")]);
        // untouched fields keep service defaults
        assert_eq!(cfg.chunk_max_lines, base.chunk_max_lines);
    }

    #[test]
    fn request_json_round_trip() {
        let json = r#"{
            "repository_name": "legacy-shop",
            "source": { "url": "https://git.example.com/shop.git", "branch": "main" },
            "priority": "high",
            "options": { "parse_corba": false }
        }"#;
        let req: IngestRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.repository_name, "legacy-shop");
        assert_eq!(req.priority, Priority::High);
        assert!(!req.options.parse_corba);
        assert!(req.options.parse_maven); // defaulted
    }
}
