//! Python analyzer: indentation-based extraction of functions and classes.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analysis::traits::read_source;
use crate::analysis::{ClassInfo, FunctionInfo, LanguageAnalyzer};

static DEF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(([^)]*)").unwrap());

static CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)class\s+([A-Za-z_]\w*)\s*(?:\(([^)]*)\))?\s*:").unwrap());

/// Decision points counted toward cyclomatic complexity. `elif` does not
/// double-count: the word boundary before `if` fails inside `elif`.
static BRANCH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(if|elif|for|while|except|and|or)\b").unwrap());

pub struct PythonAnalyzer {
    path: PathBuf,
    source: String,
}

impl PythonAnalyzer {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            source: String::new(),
        }
    }

    #[cfg(test)]
    fn from_source(source: &str) -> Self {
        Self {
            path: PathBuf::from("test.py"),
            source: source.to_string(),
        }
    }
}

impl LanguageAnalyzer for PythonAnalyzer {
    fn language(&self) -> &'static str {
        "Python"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn load(&mut self) -> anyhow::Result<()> {
        self.source = read_source(&self.path)?;
        Ok(())
    }

    fn extract_functions(&self) -> Vec<FunctionInfo> {
        let lines: Vec<&str> = self.source.lines().collect();
        let mut functions = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            let Some(caps) = DEF_RE.captures(line) else {
                continue;
            };
            let indent = caps[1].len();
            let name = caps[2].to_string();
            let args = split_args(&caps[3]);
            let end = block_end(&lines, idx, indent);
            let body = lines[idx..=end].join("\n");

            functions.push(FunctionInfo {
                name,
                line: idx + 1,
                end_line: end + 1,
                args,
                complexity: self.calculate_complexity(&body),
            });
        }

        functions
    }

    fn extract_classes(&self) -> Vec<ClassInfo> {
        let lines: Vec<&str> = self.source.lines().collect();
        let mut classes = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            let Some(caps) = CLASS_RE.captures(line) else {
                continue;
            };
            let indent = caps[1].len();
            let name = caps[2].to_string();
            let parent = caps
                .get(3)
                .map(|m| m.as_str().trim().to_string())
                .filter(|p| !p.is_empty());
            let end = block_end(&lines, idx, indent);

            let mut methods = Vec::new();
            for body_line in &lines[idx + 1..=end] {
                if let Some(m) = DEF_RE.captures(body_line) {
                    if m[1].len() > indent {
                        methods.push(m[2].to_string());
                    }
                }
            }

            let body = lines[idx..=end].join("\n");
            classes.push(ClassInfo {
                name,
                line: idx + 1,
                methods,
                complexity: self.calculate_complexity(&body),
                parent,
                kind: "class".to_string(),
            });
        }

        classes
    }

    fn calculate_complexity(&self, element: &str) -> u32 {
        1 + BRANCH_RE.find_iter(element).count() as u32
    }
}

/// Index of the last line belonging to the block opened at `start`.
/// A non-blank line at the same or shallower indent ends the block.
fn block_end(lines: &[&str], start: usize, indent: usize) -> usize {
    let mut last = start;
    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        if line.trim().is_empty() {
            continue;
        }
        let line_indent = line.len() - line.trim_start().len();
        if line_indent <= indent {
            break;
        }
        last = i;
    }
    last
}

fn split_args(args: &str) -> Vec<String> {
    args.split(',')
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(|a| {
            // Strip annotations and defaults: "x: int = 3" -> "x"
            a.split([':', '='])
                .next()
                .unwrap_or(a)
                .trim()
                .trim_start_matches('*')
                .to_string()
        })
        .filter(|a| !a.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
import os


def simple(a, b):
    return a + b


def branchy(value):
    if value > 10:
        for i in range(value):
            if i % 2 == 0:
                print(i)
    return value


class Greeter:
    def __init__(self, name):
        self.name = name

    def greet(self):
        if self.name:
            return "hi " + self.name
        return "hi"
"#;

    #[test]
    fn test_extract_functions() {
        let analyzer = PythonAnalyzer::from_source(SAMPLE);
        let functions = analyzer.extract_functions();
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        // Methods count as functions too, like the AST walk this replaces.
        assert_eq!(names, vec!["simple", "branchy", "__init__", "greet"]);

        let simple = &functions[0];
        assert_eq!(simple.args, vec!["a", "b"]);
        assert_eq!(simple.complexity, 1);

        let branchy = &functions[1];
        // 1 base + two ifs + one for
        assert_eq!(branchy.complexity, 4);
        assert!(branchy.end_line > branchy.line);
    }

    #[test]
    fn test_extract_classes() {
        let analyzer = PythonAnalyzer::from_source(SAMPLE);
        let classes = analyzer.extract_classes();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "Greeter");
        assert_eq!(classes[0].methods, vec!["__init__", "greet"]);
        assert!(classes[0].parent.is_none());
    }

    #[test]
    fn test_nested_conditionals_score_at_least_four() {
        let source = r#"
def decide(a, b, c):
    if a:
        if b:
            if c:
                return 1
    return 0
"#;
        let analyzer = PythonAnalyzer::from_source(source);
        let functions = analyzer.extract_functions();
        assert_eq!(functions.len(), 1);
        assert!(functions[0].complexity >= 4);
        assert!(analyzer.extract_classes().is_empty());
    }

    #[test]
    fn test_complexity_is_monotonic() {
        let analyzer = PythonAnalyzer::from_source("");
        let base = "def f(x):\n    return x";
        let one_branch = "def f(x):\n    if x:\n        return x\n    return 0";
        let two_branches = "def f(x):\n    if x and x > 1:\n        return x\n    return 0";
        let a = analyzer.calculate_complexity(base);
        let b = analyzer.calculate_complexity(one_branch);
        let c = analyzer.calculate_complexity(two_branches);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_elif_not_double_counted() {
        let analyzer = PythonAnalyzer::from_source("");
        // 1 base + if + elif = 3
        let element = "def f(x):\n    if x == 1:\n        pass\n    elif x == 2:\n        pass";
        assert_eq!(analyzer.calculate_complexity(element), 3);
    }

    #[test]
    fn test_load_failure_yields_error_result() {
        let mut analyzer = PythonAnalyzer::new(Path::new("/nonexistent/nope.py"));
        let result = analyzer.analyze();
        assert!(result.is_error());
        assert!(result.functions.is_empty());
    }
}
