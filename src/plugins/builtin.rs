//! Compiled-in plugin catalog.

use serde_json::{json, Value};

use crate::analysis::{JavaScriptAnalyzer, PythonAnalyzer, TypeScriptAnalyzer};
use crate::suggestion::{Severity, Suggestion};

use super::{
    AnalyzerRegistration, BuiltPlugin, Hook, PluginDescriptor, ReviewPlugin, SuggestContext,
};

/// All plugins shipped with the binary, in dispatch order.
pub fn builtin_catalog() -> Vec<PluginDescriptor> {
    vec![
        PluginDescriptor {
            name: "python",
            build: build_python,
        },
        PluginDescriptor {
            name: "javascript",
            build: build_javascript,
        },
        PluginDescriptor {
            name: "typescript",
            build: build_typescript,
        },
        PluginDescriptor {
            name: "complexity",
            build: build_complexity,
        },
    ]
}

fn build_python() -> anyhow::Result<BuiltPlugin> {
    Ok(BuiltPlugin {
        hooks: None,
        analyzer: Some(AnalyzerRegistration {
            extensions: &["py"],
            factory: |path| Box::new(PythonAnalyzer::new(path)),
        }),
    })
}

fn build_javascript() -> anyhow::Result<BuiltPlugin> {
    Ok(BuiltPlugin {
        hooks: None,
        analyzer: Some(AnalyzerRegistration {
            extensions: &["js", "jsx", "mjs"],
            factory: |path| Box::new(JavaScriptAnalyzer::new(path)),
        }),
    })
}

fn build_typescript() -> anyhow::Result<BuiltPlugin> {
    Ok(BuiltPlugin {
        hooks: None,
        analyzer: Some(AnalyzerRegistration {
            extensions: &["ts", "tsx"],
            factory: |path| Box::new(TypeScriptAnalyzer::new(path)),
        }),
    })
}

fn build_complexity() -> anyhow::Result<BuiltPlugin> {
    Ok(BuiltPlugin {
        hooks: Some(Box::new(ComplexityPlugin)),
        analyzer: None,
    })
}

/// Flags functions above the complexity threshold during `on_suggest`, so
/// plain runs produce complexity suggestions without the AI reviewer.
struct ComplexityPlugin;

impl ReviewPlugin for ComplexityPlugin {
    fn name(&self) -> &'static str {
        "complexity"
    }

    fn hooks(&self) -> &'static [Hook] {
        &[Hook::Suggest]
    }

    fn on_suggest(
        &self,
        ctx: &SuggestContext<'_>,
        suggestions: &mut Vec<Suggestion>,
    ) -> anyhow::Result<Value> {
        let threshold = ctx.complexity_threshold;
        let mut flagged = 0usize;

        for function in ctx.analysis.complex_functions(threshold) {
            let severity = if function.complexity > threshold.saturating_mul(2) {
                Severity::High
            } else {
                Severity::Medium
            };
            suggestions.push(Suggestion::ComplexFunction {
                function: function.name.clone(),
                line: function.line,
                complexity: function.complexity,
                severity,
                detail: format!(
                    "cyclomatic complexity {} exceeds threshold {}",
                    function.complexity, threshold
                ),
            });
            flagged += 1;
        }

        Ok(json!({ "flagged": flagged }))
    }
}
