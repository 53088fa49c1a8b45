//! Plugin registry and hook dispatch.
//!
//! Plugins contribute either lifecycle hooks, a language analyzer, or
//! both. Capabilities are declared and checked when a plugin is loaded,
//! not discovered per call, and the registry itself is an explicit object
//! owned by the driver; there is no process-wide registry state.

mod builtin;

pub use builtin::builtin_catalog;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::analysis::{AnalysisResult, LanguageAnalyzer};
use crate::suggestion::Suggestion;

/// Catalog names with this prefix are internal helpers, never loadable.
pub const RESERVED_PREFIX: &str = "__";

/// Pipeline stages a plugin may observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Analyze,
    Suggest,
    Apply,
}

impl Hook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hook::Analyze => "on_analyze",
            Hook::Suggest => "on_suggest",
            Hook::Apply => "on_apply",
        }
    }
}

/// Context handed to `on_suggest` hooks.
pub struct SuggestContext<'a> {
    pub file: &'a Path,
    pub analysis: &'a AnalysisResult,
    pub complexity_threshold: u32,
}

/// Lifecycle hooks a plugin can implement.
///
/// `hooks()` declares the stages the plugin handles; the registry only
/// dispatches declared hooks. Every hook returns a loosely-typed value
/// which the dispatcher collects for callers.
pub trait ReviewPlugin {
    fn name(&self) -> &'static str;

    /// Declared hook capabilities, checked at registration.
    fn hooks(&self) -> &'static [Hook];

    fn on_analyze(
        &self,
        _file: &Path,
        _analysis: &mut AnalysisResult,
    ) -> anyhow::Result<Value> {
        Ok(Value::Null)
    }

    fn on_suggest(
        &self,
        _ctx: &SuggestContext<'_>,
        _suggestions: &mut Vec<Suggestion>,
    ) -> anyhow::Result<Value> {
        Ok(Value::Null)
    }

    fn on_apply(
        &self,
        _file: &Path,
        _suggestion: &Suggestion,
        _outcome: &mut Value,
    ) -> anyhow::Result<Value> {
        Ok(Value::Null)
    }
}

/// Analyzer construction function registered for a set of extensions.
pub type AnalyzerFactory = fn(&Path) -> Box<dyn LanguageAnalyzer>;

/// Analyzer capability declared by a plugin.
pub struct AnalyzerRegistration {
    pub extensions: &'static [&'static str],
    pub factory: AnalyzerFactory,
}

/// Capabilities produced when a plugin is built. A plugin providing
/// neither is rejected at load time.
pub struct BuiltPlugin {
    pub hooks: Option<Box<dyn ReviewPlugin>>,
    pub analyzer: Option<AnalyzerRegistration>,
}

/// A loadable entry in the plugin catalog.
#[derive(Clone, Copy)]
pub struct PluginDescriptor {
    pub name: &'static str,
    pub build: fn() -> anyhow::Result<BuiltPlugin>,
}

struct LoadedPlugin {
    name: String,
    hooks: Option<Box<dyn ReviewPlugin>>,
}

/// Outcome of dispatching one hook across the loaded plugin set.
#[derive(Debug, Default)]
pub struct HookOutcome {
    /// Results from hooks that succeeded, in load order.
    pub results: Vec<Value>,
    /// Hooks that failed; dispatch continued past each of them.
    pub failures: Vec<HookFailure>,
}

#[derive(Debug, Clone)]
pub struct HookFailure {
    pub plugin: String,
    pub error: String,
}

/// Maps plugin names to instances and file extensions to analyzer
/// factories. Hooks run in load order, which follows catalog order under
/// `load_all`, so review output stays deterministic.
pub struct PluginRegistry {
    catalog: Vec<PluginDescriptor>,
    plugins: Vec<LoadedPlugin>,
    loaded: HashSet<String>,
    analyzers: HashMap<String, AnalyzerFactory>,
}

impl PluginRegistry {
    pub fn new(catalog: Vec<PluginDescriptor>) -> Self {
        Self {
            catalog,
            plugins: Vec::new(),
            loaded: HashSet::new(),
            analyzers: HashMap::new(),
        }
    }

    /// Registry over the compiled-in plugin catalog.
    pub fn with_builtins() -> Self {
        Self::new(builtin_catalog())
    }

    /// Names available for loading, in catalog order, reserved helpers
    /// skipped. Idempotent; does not touch registry state.
    pub fn discover(&self) -> Vec<String> {
        self.catalog
            .iter()
            .filter(|d| !d.name.starts_with(RESERVED_PREFIX))
            .map(|d| d.name.to_string())
            .collect()
    }

    /// Load one plugin by name.
    ///
    /// Never panics and never propagates an error: unknown names, builder
    /// failures, and capability-less plugins are logged and reported as
    /// `false`. Loading an already-loaded name is a no-op returning `true`
    /// without duplicating any registration.
    pub fn load(&mut self, name: &str) -> bool {
        if self.loaded.contains(name) {
            debug!(plugin = name, "already loaded");
            return true;
        }
        if name.starts_with(RESERVED_PREFIX) {
            warn!(plugin = name, "reserved name cannot be loaded");
            return false;
        }
        let Some(descriptor) = self.catalog.iter().find(|d| d.name == name).copied() else {
            warn!(plugin = name, "plugin not found in catalog");
            return false;
        };

        let built = match (descriptor.build)() {
            Ok(built) => built,
            Err(e) => {
                warn!(plugin = name, error = %e, "failed to build plugin");
                return false;
            }
        };

        if built.hooks.is_none() && built.analyzer.is_none() {
            warn!(plugin = name, "plugin declares no capabilities");
            return false;
        }

        if let Some(registration) = &built.analyzer {
            for ext in registration.extensions {
                let key = normalize_extension(ext);
                if self
                    .analyzers
                    .insert(key.clone(), registration.factory)
                    .is_some()
                {
                    warn!(
                        extension = %key,
                        plugin = name,
                        "extension already registered; last registration wins"
                    );
                }
            }
            debug!(
                plugin = name,
                extensions = ?registration.extensions,
                "registered language analyzer"
            );
        }

        self.plugins.push(LoadedPlugin {
            name: name.to_string(),
            hooks: built.hooks,
        });
        self.loaded.insert(name.to_string());
        true
    }

    /// Discover then load every plugin. One plugin's failure never blocks
    /// the rest.
    pub fn load_all(&mut self) -> HashMap<String, bool> {
        let mut results = HashMap::new();
        for name in self.discover() {
            let ok = self.load(&name);
            results.insert(name, ok);
        }
        results
    }

    /// Case-insensitive analyzer lookup; tolerates a leading dot.
    pub fn analyzer_for_extension(&self, ext: &str) -> Option<AnalyzerFactory> {
        self.analyzers.get(&normalize_extension(ext)).copied()
    }

    /// Construct an analyzer for a path, if its extension is mapped.
    pub fn analyzer_for_path(&self, path: &Path) -> Option<Box<dyn LanguageAnalyzer>> {
        let ext = path.extension()?.to_str()?;
        self.analyzer_for_extension(ext).map(|factory| factory(path))
    }

    /// All mapped extensions, sorted.
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self.analyzers.keys().cloned().collect();
        extensions.sort();
        extensions
    }

    /// Loaded plugin names in load order.
    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }

    /// Plugins that declared the given hook, in load order.
    pub fn plugins_with_hook(&self, hook: Hook) -> impl Iterator<Item = &dyn ReviewPlugin> {
        self.plugins
            .iter()
            .filter_map(|p| p.hooks.as_deref())
            .filter(move |p| p.hooks().contains(&hook))
    }

    /// Invoke `hook` on every plugin that declared it, in load order.
    ///
    /// A failing hook is logged and recorded in the outcome; dispatch
    /// continues to the remaining plugins.
    pub fn call_hook<F>(&self, hook: Hook, mut invoke: F) -> HookOutcome
    where
        F: FnMut(&dyn ReviewPlugin) -> anyhow::Result<Value>,
    {
        let mut outcome = HookOutcome::default();
        for plugin in self.plugins_with_hook(hook) {
            match invoke(plugin) {
                Ok(value) => outcome.results.push(value),
                Err(e) => {
                    warn!(
                        plugin = plugin.name(),
                        hook = hook.as_str(),
                        error = %e,
                        "hook failed"
                    );
                    outcome.failures.push(HookFailure {
                        plugin: plugin.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        outcome
    }

    /// Alias of `call_hook`, kept for caller compatibility.
    pub fn run_hooks<F>(&self, hook: Hook, invoke: F) -> HookOutcome
    where
        F: FnMut(&dyn ReviewPlugin) -> anyhow::Result<Value>,
    {
        self.call_hook(hook, invoke)
    }

    pub fn dispatch_analyze(&self, file: &Path, analysis: &mut AnalysisResult) -> HookOutcome {
        self.call_hook(Hook::Analyze, |p| p.on_analyze(file, analysis))
    }

    pub fn dispatch_suggest(
        &self,
        ctx: &SuggestContext<'_>,
        suggestions: &mut Vec<Suggestion>,
    ) -> HookOutcome {
        self.call_hook(Hook::Suggest, |p| p.on_suggest(ctx, suggestions))
    }

    pub fn dispatch_apply(
        &self,
        file: &Path,
        suggestion: &Suggestion,
        outcome: &mut Value,
    ) -> HookOutcome {
        self.call_hook(Hook::Apply, |p| p.on_apply(file, suggestion, outcome))
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggestion::Severity;
    use serde_json::json;
    use std::path::PathBuf;

    struct OkPlugin;

    impl ReviewPlugin for OkPlugin {
        fn name(&self) -> &'static str {
            "ok"
        }
        fn hooks(&self) -> &'static [Hook] {
            &[Hook::Analyze, Hook::Suggest]
        }
        fn on_analyze(&self, _f: &Path, _a: &mut AnalysisResult) -> anyhow::Result<Value> {
            Ok(json!("ok"))
        }
    }

    struct FailingPlugin;

    impl ReviewPlugin for FailingPlugin {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn hooks(&self) -> &'static [Hook] {
            &[Hook::Analyze]
        }
        fn on_analyze(&self, _f: &Path, _a: &mut AnalysisResult) -> anyhow::Result<Value> {
            anyhow::bail!("boom")
        }
    }

    fn build_ok() -> anyhow::Result<BuiltPlugin> {
        Ok(BuiltPlugin {
            hooks: Some(Box::new(OkPlugin)),
            analyzer: None,
        })
    }

    fn build_failing() -> anyhow::Result<BuiltPlugin> {
        Ok(BuiltPlugin {
            hooks: Some(Box::new(FailingPlugin)),
            analyzer: None,
        })
    }

    fn build_broken() -> anyhow::Result<BuiltPlugin> {
        anyhow::bail!("constructor exploded")
    }

    fn build_empty() -> anyhow::Result<BuiltPlugin> {
        Ok(BuiltPlugin {
            hooks: None,
            analyzer: None,
        })
    }

    fn sample_analysis() -> AnalysisResult {
        AnalysisResult {
            path: "a.py".to_string(),
            language: "Python".to_string(),
            functions: Vec::new(),
            classes: Vec::new(),
            lines_of_code: 0,
            error: None,
        }
    }

    #[test]
    fn test_empty_catalog() {
        let mut registry = PluginRegistry::new(Vec::new());
        assert!(registry.discover().is_empty());
        assert!(registry.load_all().is_empty());
        assert!(registry.supported_extensions().is_empty());
        assert!(registry.analyzer_for_extension("py").is_none());
    }

    #[test]
    fn test_unknown_extension_returns_none() {
        let registry = PluginRegistry::with_builtins();
        assert!(registry.analyzer_for_extension("zig").is_none());
        assert!(registry.analyzer_for_extension("").is_none());
    }

    #[test]
    fn test_load_is_idempotent() {
        let mut registry = PluginRegistry::new(vec![PluginDescriptor {
            name: "ok",
            build: build_ok,
        }]);
        assert!(registry.load("ok"));
        assert!(registry.load("ok"));

        let mut analysis = sample_analysis();
        let outcome = registry.dispatch_analyze(&PathBuf::from("a.py"), &mut analysis);
        // The hook fired exactly once despite the double load.
        assert_eq!(outcome.results, vec![json!("ok")]);
    }

    #[test]
    fn test_failing_hook_is_isolated() {
        let mut registry = PluginRegistry::new(vec![
            PluginDescriptor {
                name: "failing",
                build: build_failing,
            },
            PluginDescriptor {
                name: "ok",
                build: build_ok,
            },
        ]);
        let results = registry.load_all();
        assert_eq!(results.len(), 2);
        assert!(results.values().all(|&ok| ok));

        let mut analysis = sample_analysis();
        let outcome = registry.dispatch_analyze(&PathBuf::from("a.py"), &mut analysis);
        assert_eq!(outcome.results, vec![json!("ok")]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].plugin, "failing");
        assert!(outcome.failures[0].error.contains("boom"));
    }

    #[test]
    fn test_broken_builder_does_not_block_others() {
        let mut registry = PluginRegistry::new(vec![
            PluginDescriptor {
                name: "broken",
                build: build_broken,
            },
            PluginDescriptor {
                name: "ok",
                build: build_ok,
            },
        ]);
        let results = registry.load_all();
        assert_eq!(results.get("broken"), Some(&false));
        assert_eq!(results.get("ok"), Some(&true));
        assert_eq!(registry.plugin_names(), vec!["ok"]);
    }

    #[test]
    fn test_capability_less_plugin_rejected() {
        let mut registry = PluginRegistry::new(vec![PluginDescriptor {
            name: "empty",
            build: build_empty,
        }]);
        assert!(!registry.load("empty"));
        assert!(registry.plugin_names().is_empty());
    }

    #[test]
    fn test_reserved_prefix_skipped() {
        let mut registry = PluginRegistry::new(vec![
            PluginDescriptor {
                name: "__helper",
                build: build_ok,
            },
            PluginDescriptor {
                name: "ok",
                build: build_ok,
            },
        ]);
        assert_eq!(registry.discover(), vec!["ok"]);
        assert!(!registry.load("__helper"));
        let results = registry.load_all();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_run_hooks_is_alias_of_call_hook() {
        let mut registry = PluginRegistry::new(vec![PluginDescriptor {
            name: "ok",
            build: build_ok,
        }]);
        registry.load_all();

        let mut analysis = sample_analysis();
        let path = PathBuf::from("a.py");
        let via_call =
            registry.call_hook(Hook::Analyze, |p| p.on_analyze(&path, &mut analysis));
        let mut analysis2 = sample_analysis();
        let via_run =
            registry.run_hooks(Hook::Analyze, |p| p.on_analyze(&path, &mut analysis2));
        assert_eq!(via_call.results, via_run.results);
    }

    #[test]
    fn test_undeclared_hook_not_dispatched() {
        let mut registry = PluginRegistry::new(vec![PluginDescriptor {
            name: "failing",
            build: build_failing,
        }]);
        registry.load_all();

        // FailingPlugin declares only Analyze; Suggest dispatch skips it.
        let analysis = sample_analysis();
        let ctx = SuggestContext {
            file: &PathBuf::from("a.py"),
            analysis: &analysis,
            complexity_threshold: 5,
        };
        let outcome = registry.dispatch_suggest(&ctx, &mut Vec::new());
        assert!(outcome.results.is_empty());
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let mut registry = PluginRegistry::with_builtins();
        let results = registry.load_all();
        assert!(results.values().all(|&ok| ok));

        let extensions = registry.supported_extensions();
        assert!(extensions.contains(&"py".to_string()));
        assert!(extensions.contains(&"js".to_string()));
        assert!(extensions.contains(&"ts".to_string()));

        // Case-insensitive, dot-tolerant lookup.
        assert!(registry.analyzer_for_extension(".PY").is_some());
        let analyzer = registry
            .analyzer_for_path(&PathBuf::from("x.py"))
            .expect("python analyzer");
        assert_eq!(analyzer.language(), "Python");
    }

    #[test]
    fn test_extension_collision_last_wins() {
        fn build_py_a() -> anyhow::Result<BuiltPlugin> {
            Ok(BuiltPlugin {
                hooks: None,
                analyzer: Some(AnalyzerRegistration {
                    extensions: &["py"],
                    factory: |p| Box::new(crate::analysis::PythonAnalyzer::new(p)),
                }),
            })
        }
        fn build_py_b() -> anyhow::Result<BuiltPlugin> {
            Ok(BuiltPlugin {
                hooks: None,
                analyzer: Some(AnalyzerRegistration {
                    extensions: &["PY"],
                    factory: |p| Box::new(crate::analysis::JavaScriptAnalyzer::new(p)),
                }),
            })
        }

        let mut registry = PluginRegistry::new(vec![
            PluginDescriptor {
                name: "first",
                build: build_py_a,
            },
            PluginDescriptor {
                name: "second",
                build: build_py_b,
            },
        ]);
        registry.load_all();

        let analyzer = registry
            .analyzer_for_path(&PathBuf::from("x.py"))
            .expect("analyzer");
        assert_eq!(analyzer.language(), "JavaScript");
        assert_eq!(registry.supported_extensions().len(), 1);
    }

    #[test]
    fn test_complexity_plugin_flags_functions() {
        use crate::analysis::FunctionInfo;

        let mut registry = PluginRegistry::with_builtins();
        registry.load_all();

        let analysis = AnalysisResult {
            path: "a.py".to_string(),
            language: "Python".to_string(),
            functions: vec![
                FunctionInfo {
                    name: "plain".to_string(),
                    line: 1,
                    end_line: 3,
                    args: Vec::new(),
                    complexity: 2,
                },
                FunctionInfo {
                    name: "tangled".to_string(),
                    line: 5,
                    end_line: 40,
                    args: Vec::new(),
                    complexity: 9,
                },
            ],
            classes: Vec::new(),
            lines_of_code: 40,
            error: None,
        };

        let path = PathBuf::from("a.py");
        let ctx = SuggestContext {
            file: &path,
            analysis: &analysis,
            complexity_threshold: 5,
        };
        let mut suggestions = Vec::new();
        let outcome = registry.dispatch_suggest(&ctx, &mut suggestions);
        assert!(outcome.failures.is_empty());

        assert_eq!(suggestions.len(), 1);
        match &suggestions[0] {
            crate::suggestion::Suggestion::ComplexFunction {
                function,
                complexity,
                severity,
                ..
            } => {
                assert_eq!(function, "tangled");
                assert_eq!(*complexity, 9);
                assert_eq!(*severity, Severity::Medium);
            }
            other => panic!("expected complex_function, got {:?}", other),
        }
    }
}
