//! Applying AI-suggested fixes to source files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ai::{Client, ReviewPayload};

/// What happened when fixes were applied to one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixOutcome {
    /// Titles of the suggestions that were applied.
    pub applied: Vec<String>,
    pub backup_path: String,
    pub bytes_written: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FixOutcome {
    pub fn failed(message: &str) -> Self {
        Self {
            applied: Vec::new(),
            backup_path: String::new(),
            bytes_written: 0,
            error: Some(message.to_string()),
        }
    }
}

/// Applies model-suggested fixes, backing the original file up first.
pub struct FixApplier<'a> {
    client: &'a Client,
}

impl<'a> FixApplier<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Ask the model for a corrected version of the file and write it,
    /// keeping the original at `<file>.<ext>.bak`.
    pub async fn apply(&self, path: &Path, review: &ReviewPayload) -> anyhow::Result<FixOutcome> {
        let ReviewPayload::Structured(review) = review else {
            anyhow::bail!("cannot apply fixes from an unstructured review");
        };
        if review.suggestions.is_empty() {
            anyhow::bail!("review has no suggestions to apply");
        }

        let original = fs::read_to_string(path)?;
        let corrected = self.client.corrected_file(&original, review).await?;
        let corrected = strip_code_fences(&corrected);
        if corrected.trim().is_empty() {
            anyhow::bail!("model returned an empty fix");
        }

        let backup = backup_path(path);
        fs::copy(path, &backup)?;
        fs::write(path, corrected.as_bytes())?;
        info!(
            file = %path.display(),
            backup = %backup.display(),
            "applied AI-suggested fixes"
        );

        Ok(FixOutcome {
            applied: review
                .suggestions
                .iter()
                .map(|s| {
                    if s.title.is_empty() {
                        "suggestion".to_string()
                    } else {
                        s.title.clone()
                    }
                })
                .collect(),
            backup_path: backup.display().to_string(),
            bytes_written: corrected.len(),
            error: None,
        })
    }
}

fn backup_path(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_extension(format!("{}.bak", ext)),
        None => path.with_extension("bak"),
    }
}

/// Strip a surrounding markdown code fence if the model added one anyway.
pub(crate) fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    lines.remove(0);
    if let Some(last) = lines.last() {
        if last.trim_start().starts_with("```") {
            lines.pop();
        }
    }
    lines.join("\n")
}
