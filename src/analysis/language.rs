//! File classification by extension.

use std::fmt;
use std::path::Path;

/// Language identity derived from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLanguage {
    Python,
    JavaScript,
    TypeScript,
    Unknown,
}

impl SourceLanguage {
    /// Classify a path by its extension (case-insensitive).
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(ext)
    }

    /// Classify a bare extension, with or without a leading dot.
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "py" => SourceLanguage::Python,
            "js" | "jsx" | "mjs" => SourceLanguage::JavaScript,
            "ts" | "tsx" => SourceLanguage::TypeScript,
            _ => SourceLanguage::Unknown,
        }
    }

    /// Display name used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceLanguage::Python => "Python",
            SourceLanguage::JavaScript => "JavaScript",
            SourceLanguage::TypeScript => "TypeScript",
            SourceLanguage::Unknown => "Unknown",
        }
    }

    /// Whether this is a curly-brace-family language.
    pub fn is_curly(&self) -> bool {
        matches!(self, SourceLanguage::JavaScript | SourceLanguage::TypeScript)
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
