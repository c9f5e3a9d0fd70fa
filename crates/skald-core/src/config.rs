use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine tunables. Every field has a default so config files can be sparse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tokens shorter than this never enter the search index.
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,
    /// Cap on tokens taken from a single event payload.
    #[serde(default = "default_max_tokens_per_event")]
    pub max_tokens_per_event: usize,
    /// Records longer than this are skipped with a decode warning.
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,
    /// File extension the scanner looks for.
    #[serde(default = "default_trace_extension")]
    pub trace_extension: String,
}

fn default_min_token_len() -> usize {
    2
}

fn default_max_tokens_per_event() -> usize {
    256
}

fn default_max_record_bytes() -> usize {
    1024 * 1024
}

fn default_trace_extension() -> String {
    "jsonl".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            min_token_len: default_min_token_len(),
            max_tokens_per_event: default_max_tokens_per_event(),
            max_record_bytes: default_max_record_bytes(),
            trace_extension: default_trace_extension(),
        }
    }
}

impl EngineConfig {
    /// Load from a YAML file; fields the file omits keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<EngineConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let cfg: EngineConfig =
            serde_yaml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_sane() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.min_token_len, 2);
        assert_eq!(cfg.max_tokens_per_event, 256);
        assert_eq!(cfg.max_record_bytes, 1024 * 1024);
        assert_eq!(cfg.trace_extension, "jsonl");
    }

    #[test]
    fn sparse_yaml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skald.yaml");
        fs::write(&path, "min_token_len: 3\n").unwrap();
        let cfg = EngineConfig::from_yaml_file(&path).unwrap();
        assert_eq!(cfg.min_token_len, 3);
        assert_eq!(cfg.trace_extension, "jsonl");
    }

    #[test]
    fn full_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skald.yaml");
        fs::write(
            &path,
            "min_token_len: 4\nmax_tokens_per_event: 64\nmax_record_bytes: 2048\ntrace_extension: trace\n",
        )
        .unwrap();
        let cfg = EngineConfig::from_yaml_file(&path).unwrap();
        assert_eq!(cfg.max_tokens_per_event, 64);
        assert_eq!(cfg.max_record_bytes, 2048);
        assert_eq!(cfg.trace_extension, "trace");
    }

    #[test]
    fn bad_yaml_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skald.yaml");
        fs::write(&path, "min_token_len: [not a number\n").unwrap();
        let err = EngineConfig::from_yaml_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("skald.yaml"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(EngineConfig::from_yaml_file(Path::new("/nonexistent/skald.yaml")).is_err());
    }
}
