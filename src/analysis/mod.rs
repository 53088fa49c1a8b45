//! Source-code analysis: file classification, the language analyzer
//! contract, and the built-in analyzers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌────────────────┐
//! │ Source Files │────▶│ LanguageAnalyzer  │────▶│ AnalysisResult │
//! └──────────────┘     │ (Python, JS, TS)  │     │ (functions,    │
//!                      └───────────────────┘     │  classes, loc) │
//!                                                └────────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a module in `src/analysis/languages/`
//! 2. Implement the `LanguageAnalyzer` trait
//! 3. Register a plugin descriptor in `plugins::builtin`

mod language;
mod languages;
mod result;
mod traits;

use std::path::Path;

use tracing::warn;

use crate::plugins::PluginRegistry;

pub use language::SourceLanguage;
pub use languages::{JavaScriptAnalyzer, PythonAnalyzer, TypeScriptAnalyzer};
pub use result::{AnalysisResult, ClassInfo, FunctionInfo};
pub use traits::LanguageAnalyzer;

/// Analyze one file with the registry's analyzer for its extension.
///
/// Unsupported and unreadable files degrade to an error-tagged result so
/// a multi-file review keeps going.
pub fn analyze_path(registry: &PluginRegistry, path: &Path) -> AnalysisResult {
    match registry.analyzer_for_path(path) {
        Some(mut analyzer) => analyzer.analyze(),
        None => {
            warn!(file = %path.display(), "no analyzer registered for file");
            let lines_of_code = std::fs::read_to_string(path)
                .map(|s| s.lines().count())
                .unwrap_or(0);
            AnalysisResult {
                path: path.display().to_string(),
                language: "Unsupported".to_string(),
                functions: Vec::new(),
                classes: Vec::new(),
                lines_of_code,
                error: Some("unsupported file type".to_string()),
            }
        }
    }
}
