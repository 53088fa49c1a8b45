//! ai-review - AI-assisted code review tool.
//!
//! Reviews source files and produces a unified report combining several
//! mostly-independent capabilities:
//!
//! - `analysis`: language analyzers extracting functions, classes, and
//!   cyclomatic complexity
//! - `plugins`: plugin registry and lifecycle hook dispatch
//! - `scan`: regex-based security scanning and external dependency
//!   vulnerability tools
//! - `ai`: LLM-powered review suggestions over an OpenAI-compatible API
//! - `apply`: applying AI-suggested fixes with backups
//! - `report`: unified report generation (pretty, JSON, markdown)
//!
//! # Adding a New Language
//!
//! See `src/analysis/languages/` for examples. Implement the
//! `LanguageAnalyzer` trait and register a descriptor in
//! `plugins::builtin`.

pub mod ai;
pub mod analysis;
pub mod apply;
pub mod cli;
pub mod config;
pub mod plugins;
pub mod report;
pub mod scan;
pub mod suggestion;

pub use analysis::{
    AnalysisResult, ClassInfo, FunctionInfo, JavaScriptAnalyzer, LanguageAnalyzer,
    PythonAnalyzer, SourceLanguage, TypeScriptAnalyzer,
};
pub use config::ReviewConfig;
pub use plugins::{Hook, HookOutcome, PluginRegistry, ReviewPlugin, SuggestContext};
pub use report::{FileReview, UnifiedReport};
pub use suggestion::{Severity, Suggestion};
