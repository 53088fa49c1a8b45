//! Structure and complexity facts extracted from source files.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// A function or method extracted from source code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    /// Start line (1-indexed).
    pub line: usize,
    /// End line (1-indexed, inclusive).
    pub end_line: usize,
    #[serde(default)]
    pub args: Vec<String>,
    /// Cyclomatic complexity score, always >= 1.
    pub complexity: u32,
}

/// A class (or interface) extracted from source code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    /// Start line (1-indexed).
    pub line: usize,
    #[serde(default)]
    pub methods: Vec<String>,
    pub complexity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// "class" or "interface".
    #[serde(default = "default_class_kind")]
    pub kind: String,
}

fn default_class_kind() -> String {
    "class".to_string()
}

/// All facts extracted from a single file. Produced once per file per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub path: String,
    pub language: String,
    pub functions: Vec<FunctionInfo>,
    pub classes: Vec<ClassInfo>,
    pub lines_of_code: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// An error-tagged result carrying no structural data.
    pub fn with_error(path: &Path, language: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.display().to_string(),
            language: language.to_string(),
            functions: Vec::new(),
            classes: Vec::new(),
            lines_of_code: 0,
            error: Some(message.into()),
        }
    }

    /// Whether analysis failed for this file.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Functions whose complexity exceeds the given threshold.
    pub fn complex_functions(&self, threshold: u32) -> impl Iterator<Item = &FunctionInfo> {
        self.functions.iter().filter(move |f| f.complexity > threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn func(name: &str, complexity: u32) -> FunctionInfo {
        FunctionInfo {
            name: name.to_string(),
            line: 1,
            end_line: 5,
            args: Vec::new(),
            complexity,
        }
    }

    #[test]
    fn test_complex_functions_threshold() {
        let result = AnalysisResult {
            path: "a.py".to_string(),
            language: "Python".to_string(),
            functions: vec![func("simple", 2), func("gnarly", 9), func("edge", 5)],
            classes: Vec::new(),
            lines_of_code: 40,
            error: None,
        };

        let complex: Vec<&str> = result
            .complex_functions(5)
            .map(|f| f.name.as_str())
            .collect();
        // Strictly greater than the threshold.
        assert_eq!(complex, vec!["gnarly"]);
    }

    #[test]
    fn test_with_error() {
        let result =
            AnalysisResult::with_error(&PathBuf::from("gone.py"), "Python", "failed to load file");
        assert!(result.is_error());
        assert!(result.functions.is_empty());
        assert_eq!(result.lines_of_code, 0);
    }
}
