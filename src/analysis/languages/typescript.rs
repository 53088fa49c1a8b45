//! TypeScript analyzer: the JavaScript extraction plus typed signatures
//! and interfaces.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analysis::traits::read_source;
use crate::analysis::{ClassInfo, FunctionInfo, LanguageAnalyzer};

use super::javascript::{
    body_after, curly_complexity, extract_curly_classes, extract_curly_functions, line_of,
    split_args,
};

/// Functions with generic parameters or return-type annotations that the
/// plain JavaScript pattern misses, e.g. `function get<T>(id: string): T`.
static TS_FUNC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bfunction\s+([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*\(([^)]*)\)\s*:\s*[^{;]+")
        .unwrap()
});

static INTERFACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\binterface\s+([A-Za-z_$][\w$]*)(?:\s+extends\s+([^{]+))?\s*\{").unwrap()
});

/// Member signatures inside an interface body: `save(item: T): void;`.
static INTERFACE_MEMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z_$][\w$]*)\s*\([^)]*\)\s*:\s*[^;]+;").unwrap());

pub struct TypeScriptAnalyzer {
    path: PathBuf,
    source: String,
}

impl TypeScriptAnalyzer {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            source: String::new(),
        }
    }

    #[cfg(test)]
    fn from_source(source: &str) -> Self {
        Self {
            path: PathBuf::from("test.ts"),
            source: source.to_string(),
        }
    }
}

impl LanguageAnalyzer for TypeScriptAnalyzer {
    fn language(&self) -> &'static str {
        "TypeScript"
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
        let mut functions = extract_curly_functions(&self.source);

        for caps in TS_FUNC_RE.captures_iter(&self.source) {
            let name = caps[1].to_string();
            if functions.iter().any(|f| f.name == name) {
                continue;
            }
            let whole = caps.get(0).unwrap();
            let line = line_of(&self.source, whole.start());
            let (complexity, end_line) = match body_after(&self.source, whole.end()) {
                Some((open, close)) => (
                    curly_complexity(&self.source[open..=close]),
                    line_of(&self.source, close),
                ),
                None => (1, line),
            };
            functions.push(FunctionInfo {
                name,
                line,
                end_line,
                args: split_args(&caps[2]),
                complexity,
            });
        }

        functions.sort_by_key(|f| f.line);
        functions
    }

    fn extract_classes(&self) -> Vec<ClassInfo> {
        let mut classes = extract_curly_classes(&self.source);

        for caps in INTERFACE_RE.captures_iter(&self.source) {
            let whole = caps.get(0).unwrap();
            let name = caps[1].to_string();
            let parent = caps.get(2).map(|m| m.as_str().trim().to_string());
            let line = line_of(&self.source, whole.start());

            let methods = match body_after(&self.source, whole.end() - 1) {
                Some((open, close)) => INTERFACE_MEMBER_RE
                    .captures_iter(&self.source[open..=close])
                    .map(|m| m[1].to_string())
                    .collect(),
                None => Vec::new(),
            };

            classes.push(ClassInfo {
                name,
                line,
                methods,
                // Interfaces carry no implementation.
                complexity: 1,
                parent,
                kind: "interface".to_string(),
            });
        }

        classes.sort_by_key(|c| c.line);
        classes
    }

    fn calculate_complexity(&self, element: &str) -> u32 {
        curly_complexity(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
interface Store {
    save(item: string): void;
    load(id: string): string;
}

function lookup(id: string): string | null {
    if (id.length > 0) {
        return id;
    }
    return null;
}

class MemoryStore implements Store {
    save(item: string) {
        this.items.push(item);
    }
}
"#;

    #[test]
    fn test_typed_function_extracted_once() {
        let analyzer = TypeScriptAnalyzer::from_source(SAMPLE);
        let functions = analyzer.extract_functions();
        let lookups: Vec<_> = functions.iter().filter(|f| f.name == "lookup").collect();
        assert_eq!(lookups.len(), 1);
        // 1 base + if + the `|` pair in the return type never counts,
        // but the ternary-style `?` would; none here.
        assert_eq!(lookups[0].complexity, 2);
        assert_eq!(lookups[0].args, vec!["id"]);
    }

    #[test]
    fn test_interfaces_reported_as_classes() {
        let analyzer = TypeScriptAnalyzer::from_source(SAMPLE);
        let classes = analyzer.extract_classes();
        let names: Vec<&str> = classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Store", "MemoryStore"]);

        let store = &classes[0];
        assert_eq!(store.kind, "interface");
        assert_eq!(store.methods, vec!["save", "load"]);
        assert_eq!(store.complexity, 1);

        assert_eq!(classes[1].kind, "class");
    }

    #[test]
    fn test_generic_function() {
        let source = "function first<T>(items: T[]): T {\n    return items[0];\n}\n";
        let analyzer = TypeScriptAnalyzer::from_source(source);
        let functions = analyzer.extract_functions();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "first");
    }
}
