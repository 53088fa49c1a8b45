//! JavaScript analyzer: regex extraction over brace-delimited bodies.
//!
//! The shared extraction helpers here also back the TypeScript analyzer,
//! which layers typed-signature and interface handling on top.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analysis::traits::read_source;
use crate::analysis::{ClassInfo, FunctionInfo, LanguageAnalyzer};

static FUNC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfunction\s+([A-Za-z_$][\w$]*)\s*\(([^)]*)\)").unwrap());

static ARROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:\(([^)]*)\)|([A-Za-z_$][\w$]*))\s*=>")
        .unwrap()
});

static METHOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z_$][\w$]*)\s*\(([^)]*)\)\s*\{").unwrap());

static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    // The trailing [^{;]* swallows `implements ...` and other heritage
    // clauses between the name and the body brace.
    Regex::new(r"\bclass\s+([A-Za-z_$][\w$]*)(?:\s+extends\s+([A-Za-z_$][\w$.]*))?[^{;]*\{")
        .unwrap()
});

/// Decision points and boolean operators counted toward complexity.
static BRANCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(if|for|while|switch|case|try|catch)\b|&&|\|\||\?").unwrap()
});

/// Keywords that the method pattern would otherwise pick up as names.
const NON_METHOD_NAMES: &[&str] = &[
    "if", "for", "while", "switch", "catch", "function", "return", "constructor", "do", "else",
    "new", "typeof", "await",
];

pub struct JavaScriptAnalyzer {
    path: PathBuf,
    source: String,
}

impl JavaScriptAnalyzer {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            source: String::new(),
        }
    }

    #[cfg(test)]
    fn from_source(source: &str) -> Self {
        Self {
            path: PathBuf::from("test.js"),
            source: source.to_string(),
        }
    }
}

impl LanguageAnalyzer for JavaScriptAnalyzer {
    fn language(&self) -> &'static str {
        "JavaScript"
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
        extract_curly_functions(&self.source)
    }

    fn extract_classes(&self) -> Vec<ClassInfo> {
        extract_curly_classes(&self.source)
    }

    fn calculate_complexity(&self, element: &str) -> u32 {
        curly_complexity(element)
    }
}

/// Complexity for brace-family languages: 1 + decision points.
pub(crate) fn curly_complexity(element: &str) -> u32 {
    1 + BRANCH_RE.find_iter(element).count() as u32
}

/// Extract function declarations, named arrow functions, and methods.
pub(crate) fn extract_curly_functions(source: &str) -> Vec<FunctionInfo> {
    let mut functions: Vec<FunctionInfo> = Vec::new();
    let mut seen: HashSet<(String, usize)> = HashSet::new();

    for caps in FUNC_RE.captures_iter(source) {
        let whole = caps.get(0).unwrap();
        push_function(
            source,
            &mut functions,
            &mut seen,
            &caps[1],
            caps.get(2).map(|m| m.as_str()).unwrap_or(""),
            whole.start(),
            whole.end(),
        );
    }

    for caps in ARROW_RE.captures_iter(source) {
        let whole = caps.get(0).unwrap();
        let args = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or("");
        push_function(
            source,
            &mut functions,
            &mut seen,
            &caps[1],
            args,
            whole.start(),
            whole.end(),
        );
    }

    for caps in METHOD_RE.captures_iter(source) {
        let name = &caps[1];
        if NON_METHOD_NAMES.contains(&name) {
            continue;
        }
        let whole = caps.get(0).unwrap();
        // `{` belongs to the body; back up so body_after finds it.
        push_function(
            source,
            &mut functions,
            &mut seen,
            name,
            &caps[2],
            whole.start(),
            whole.end() - 1,
        );
    }

    functions.sort_by_key(|f| f.line);
    functions
}

fn push_function(
    source: &str,
    functions: &mut Vec<FunctionInfo>,
    seen: &mut HashSet<(String, usize)>,
    name: &str,
    args: &str,
    match_start: usize,
    match_end: usize,
) {
    let line = line_of(source, match_start);
    if !seen.insert((name.to_string(), line)) {
        return;
    }

    let (complexity, end_line) = match body_after(source, match_end) {
        Some((open, close)) => (curly_complexity(&source[open..=close]), line_of(source, close)),
        None => (1, line),
    };

    functions.push(FunctionInfo {
        name: name.to_string(),
        line,
        end_line,
        args: split_args(args),
        complexity,
    });
}

/// Extract class declarations with their method inventories.
pub(crate) fn extract_curly_classes(source: &str) -> Vec<ClassInfo> {
    let mut classes = Vec::new();

    for caps in CLASS_RE.captures_iter(source) {
        let whole = caps.get(0).unwrap();
        let name = caps[1].to_string();
        let parent = caps.get(2).map(|m| m.as_str().to_string());
        let line = line_of(source, whole.start());

        let (methods, complexity) = match body_after(source, whole.end() - 1) {
            Some((open, close)) => {
                let body = &source[open..=close];
                let methods: Vec<String> = METHOD_RE
                    .captures_iter(body)
                    .map(|m| m[1].to_string())
                    .filter(|n| !NON_METHOD_NAMES.contains(&n.as_str()))
                    .collect();
                (methods, curly_complexity(body))
            }
            None => (Vec::new(), 1),
        };

        classes.push(ClassInfo {
            name,
            line,
            methods,
            complexity,
            parent,
            kind: "class".to_string(),
        });
    }

    classes
}

/// Find the `{` at or after `from` and its matching `}`.
/// Returns byte positions of both braces.
pub(crate) fn body_after(source: &str, from: usize) -> Option<(usize, usize)> {
    let open = source[from..].find('{')? + from;
    let close = find_matching_brace(source.as_bytes(), open)?;
    Some((open, close))
}

/// Position of the `}` matching the `{` at `open`. Byte scan; string
/// literals containing braces will skew the result, same as the line-based
/// counting this whole module accepts.
fn find_matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    if bytes.get(open) != Some(&b'{') {
        return None;
    }
    let mut depth = 1usize;
    let mut pos = open + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            _ => {}
        }
        pos += 1;
    }
    None
}

/// 1-indexed line number of a byte position.
pub(crate) fn line_of(source: &str, pos: usize) -> usize {
    source.as_bytes()[..pos].iter().filter(|&&b| b == b'\n').count() + 1
}

pub(crate) fn split_args(args: &str) -> Vec<String> {
    args.split(',')
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(|a| {
            a.split([':', '='])
                .next()
                .unwrap_or(a)
                .trim()
                .trim_start_matches("...")
                .to_string()
        })
        .filter(|a| !a.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
function add(a, b) {
    return a + b;
}

const pick = (list, wanted) => {
    for (const item of list) {
        if (item === wanted) {
            return item;
        }
    }
    return null;
};

class Cart {
    constructor(items) {
        this.items = items;
    }

    total() {
        let sum = 0;
        for (const item of this.items) {
            sum += item.price;
        }
        return sum;
    }
}
"#;

    #[test]
    fn test_extract_functions() {
        let analyzer = JavaScriptAnalyzer::from_source(SAMPLE);
        let functions = analyzer.extract_functions();
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"add"));
        assert!(names.contains(&"pick"));
        assert!(names.contains(&"total"));
        assert!(!names.contains(&"constructor"));
        assert!(!names.contains(&"if"));
        assert!(!names.contains(&"for"));

        let add = functions.iter().find(|f| f.name == "add").unwrap();
        assert_eq!(add.args, vec!["a", "b"]);
        assert_eq!(add.complexity, 1);
        assert_eq!(add.line, 2);
        assert_eq!(add.end_line, 4);

        let pick = functions.iter().find(|f| f.name == "pick").unwrap();
        // 1 base + for + if
        assert_eq!(pick.complexity, 3);
    }

    #[test]
    fn test_extract_classes() {
        let analyzer = JavaScriptAnalyzer::from_source(SAMPLE);
        let classes = analyzer.extract_classes();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "Cart");
        assert_eq!(classes[0].methods, vec!["total"]);
        assert!(classes[0].parent.is_none());
    }

    #[test]
    fn test_class_with_parent() {
        let analyzer =
            JavaScriptAnalyzer::from_source("class Admin extends User {\n  ban() { }\n}\n");
        let classes = analyzer.extract_classes();
        assert_eq!(classes[0].parent.as_deref(), Some("User"));
        assert_eq!(classes[0].methods, vec!["ban"]);
    }

    #[test]
    fn test_no_duplicate_for_declared_function() {
        // The method pattern also matches `add(a, b) {`; the dedup by
        // (name, line) must collapse it with the declaration match.
        let analyzer = JavaScriptAnalyzer::from_source("function add(a, b) {\n  return a + b;\n}\n");
        let functions = analyzer.extract_functions();
        assert_eq!(functions.len(), 1);
    }

    #[test]
    fn test_complexity_is_monotonic() {
        let a = curly_complexity("{ return 1; }");
        let b = curly_complexity("{ if (x) { return 1; } return 0; }");
        let c = curly_complexity("{ if (x && y) { return 1; } return 0; }");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_find_matching_brace() {
        let text = "{ a { b } c }";
        assert_eq!(find_matching_brace(text.as_bytes(), 0), Some(12));
        assert_eq!(find_matching_brace(text.as_bytes(), 4), Some(8));
        assert_eq!(find_matching_brace(b"{ unclosed", 0), None);
    }
}
