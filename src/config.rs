//! Review configuration.
//!
//! YAML config discovered next to the reviewed project or in the user's
//! config directory. Invalid configuration is fatal before any work runs.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai;

pub const DEFAULT_COMPLEXITY_THRESHOLD: u32 = 5;

/// Config file names searched in the working directory.
const DEFAULT_CONFIG_NAMES: &[&str] = &[".ai-review.yaml", "ai-review.yaml"];

fn default_exclude_dirs() -> Vec<String> {
    [
        ".git",
        "__pycache__",
        "node_modules",
        "venv",
        ".env",
        "target",
        "dist",
        "build",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_threshold() -> u32 {
    DEFAULT_COMPLEXITY_THRESHOLD
}

fn default_model() -> String {
    ai::DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    ai::DEFAULT_BASE_URL.to_string()
}

/// Model settings for `--ai`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Functions above this cyclomatic complexity get flagged.
    #[serde(default = "default_threshold")]
    pub complexity_threshold: u32,
    /// Directory names skipped during traversal.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    /// Glob patterns for files to skip.
    #[serde(default)]
    pub exclude_files: Vec<String>,
    #[serde(default)]
    pub ai: AiConfig,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            complexity_threshold: default_threshold(),
            exclude_dirs: default_exclude_dirs(),
            exclude_files: Vec::new(),
            ai: AiConfig::default(),
        }
    }
}

impl ReviewConfig {
    /// Load configuration: an explicit path, else the first well-known
    /// name in the working directory, else the user config directory,
    /// else defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::parse_file(path);
        }

        for name in DEFAULT_CONFIG_NAMES {
            let candidate = PathBuf::from(name);
            if candidate.exists() {
                debug!(config = %candidate.display(), "using project config");
                return Self::parse_file(&candidate);
            }
        }

        if let Some(user_config) = user_config_path() {
            if user_config.exists() {
                debug!(config = %user_config.display(), "using user config");
                return Self::parse_file(&user_config);
            }
        }

        Ok(Self::default())
    }

    pub fn parse_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path.display(), e))?;
        let config: ReviewConfig = serde_yaml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("parsing config {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would misbehave mid-run.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.complexity_threshold == 0 {
            anyhow::bail!("complexity_threshold must be at least 1");
        }
        for pattern in &self.exclude_files {
            Glob::new(pattern)
                .map_err(|e| anyhow::anyhow!("invalid exclude_files pattern {:?}: {}", pattern, e))?;
        }
        if self.ai.base_url.is_empty() {
            anyhow::bail!("ai.base_url must not be empty");
        }
        Ok(())
    }

    /// Compiled matcher over `exclude_files` patterns.
    pub fn exclude_matcher(&self) -> anyhow::Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_files {
            builder.add(Glob::new(pattern)?);
        }
        Ok(builder.build()?)
    }

    /// Whether a directory name is excluded from traversal.
    pub fn is_dir_excluded(&self, name: &str) -> bool {
        name.starts_with('.') || self.exclude_dirs.iter().any(|d| d == name)
    }
}

/// Per-user config file location.
fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "zen-systems", "ai-review")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReviewConfig::default();
        assert_eq!(config.complexity_threshold, 5);
        assert!(config.is_dir_excluded("node_modules"));
        assert!(config.is_dir_excluded(".git"));
        assert!(!config.is_dir_excluded("src"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
complexity_threshold: 8
exclude_files:
  - "*.min.js"
ai:
  model: gpt-4o-mini
"#;
        let config: ReviewConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.complexity_threshold, 8);
        assert_eq!(config.ai.model, "gpt-4o-mini");
        // Unspecified fields fall back to defaults.
        assert_eq!(config.ai.base_url, ai::DEFAULT_BASE_URL);
        assert!(config.exclude_dirs.contains(&"node_modules".to_string()));

        let matcher = config.exclude_matcher().unwrap();
        assert!(matcher.is_match("vendor.min.js"));
        assert!(!matcher.is_match("app.js"));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let config = ReviewConfig {
            complexity_threshold: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_glob_rejected() {
        let config = ReviewConfig {
            exclude_files: vec!["[unclosed".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(ReviewConfig::parse_file(Path::new("/nonexistent/config.yaml")).is_err());
    }
}
