//! Core contract for language analyzers.

use std::fs;
use std::path::Path;

use super::{AnalysisResult, ClassInfo, FunctionInfo};

/// Language-specific analyzer over a single source file.
///
/// Adding a language means implementing exactly four behaviors: `load`,
/// `extract_functions`, `extract_classes`, and `calculate_complexity`.
/// The extraction methods have no default bodies on purpose; a variant
/// that cannot provide them does not satisfy the contract.
///
/// Complexity scores are not comparable algorithm-by-algorithm across
/// languages, but every implementation must be monotonic with branch and
/// boolean-operator count so that threshold comparisons stay meaningful.
pub trait LanguageAnalyzer {
    /// Display name of the language ("Python", "JavaScript", ...).
    fn language(&self) -> &'static str;

    /// Path of the file under analysis.
    fn path(&self) -> &Path;

    /// Source text; empty until `load` has succeeded.
    fn source(&self) -> &str;

    /// Read the file into memory. The file handle is released before this
    /// returns, on success and failure alike.
    fn load(&mut self) -> anyhow::Result<()>;

    /// Ordered function/method inventory.
    fn extract_functions(&self) -> Vec<FunctionInfo>;

    /// Ordered class inventory.
    fn extract_classes(&self) -> Vec<ClassInfo>;

    /// Complexity score for one code element (a function or class body).
    /// Always >= 1.
    fn calculate_complexity(&self, element: &str) -> u32;

    /// Full analysis: load, then extract. A load failure short-circuits to
    /// an error-tagged result instead of returning partial data.
    fn analyze(&mut self) -> AnalysisResult {
        if let Err(e) = self.load() {
            return AnalysisResult::with_error(self.path(), self.language(), e.to_string());
        }

        AnalysisResult {
            path: self.path().display().to_string(),
            language: self.language().to_string(),
            functions: self.extract_functions(),
            classes: self.extract_classes(),
            lines_of_code: self.source().lines().count(),
            error: None,
        }
    }
}

/// Shared load path for file-backed analyzers.
pub(crate) fn read_source(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading {}: {}", path.display(), e))
}
