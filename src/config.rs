//! Repair policy configuration
//!
//! Loaded from JSON (`--config FILE` or `<config dir>/repomend/config.json`),
//! every field optional.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// How a broken reference picks a valid commit to point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Branch tip with the latest committer timestamp; ties go to the smallest name
    #[default]
    NewestCommit,
    /// First valid branch from `preferred_branches`, then newest commit
    PreferredBranches,
    /// Never repoint; broken references are reported (or deleted)
    None,
}

/// What to do with a reference whose commit cannot be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MissingTipPolicy {
    /// Plan a recovered commit from whatever can be salvaged
    #[default]
    Synthesize,
    /// Leave it to the fallback policy
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "repomend".to_string(),
            email: "repomend@localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    pub fallback: FallbackPolicy,
    /// Short branch names, tried in order
    pub preferred_branches: Vec<String>,
    pub missing_tip: MissingTipPolicy,
    pub delete_unrepairable_refs: bool,
    pub deep_tree_scan: bool,
    /// Author and committer of synthesized commits
    pub identity: Identity,
    /// Pin the timestamp of synthesized commits (otherwise the wall clock)
    pub synthetic_timestamp: Option<i64>,
    /// Upper bound on scan/plan/rewrite cycles per run
    pub max_rounds: usize,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            fallback: FallbackPolicy::default(),
            preferred_branches: vec!["main".to_string(), "master".to_string(), "develop".to_string()],
            missing_tip: MissingTipPolicy::default(),
            delete_unrepairable_refs: false,
            deep_tree_scan: true,
            identity: Identity::default(),
            synthetic_timestamp: None,
            max_rounds: 3,
        }
    }
}

impl RepairConfig {
    pub fn from_json(path: &Path, text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(path, &text)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("repomend").join("config.json"))
    }

    /// An explicit path must exist; the default location is optional
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Full reference names of the preferred branches
    pub fn preferred_refs(&self) -> impl Iterator<Item = String> + '_ {
        self.preferred_branches
            .iter()
            .map(|name| format!("refs/heads/{}", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = RepairConfig::from_json(Path::new("x.json"), "{}").unwrap();
        assert_eq!(config, RepairConfig::default());
        assert_eq!(config.fallback, FallbackPolicy::NewestCommit);
        assert!(config.deep_tree_scan);
    }

    #[test]
    fn test_partial_json_overrides() {
        let text = r#"{
            "fallback": "preferred-branches",
            "preferred_branches": ["trunk"],
            "missing_tip": "fallback",
            "synthetic_timestamp": 1700000000,
            "identity": {"name": "Ops", "email": "ops@example.com"}
        }"#;
        let config = RepairConfig::from_json(Path::new("x.json"), text).unwrap();
        assert_eq!(config.fallback, FallbackPolicy::PreferredBranches);
        assert_eq!(config.preferred_refs().collect::<Vec<_>>(), vec!["refs/heads/trunk"]);
        assert_eq!(config.missing_tip, MissingTipPolicy::Fallback);
        assert_eq!(config.synthetic_timestamp, Some(1_700_000_000));
        assert_eq!(config.identity.name, "Ops");
        assert_eq!(config.max_rounds, 3);
    }

    #[test]
    fn test_bad_json_names_file() {
        let err = RepairConfig::from_json(Path::new("broken.json"), "{").unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(
            RepairConfig::load_or_default(Some(&path)),
            Err(ConfigError::Io { .. })
        ));
    }
}
